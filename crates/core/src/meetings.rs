//! Meeting orchestration: picks an identifier and topic, then announces the
//! meeting in the channel.
//!
//! Identifier selection, in order:
//! 1. an explicit meeting id is used as-is;
//! 2. an explicit topic is sanitized and suffixed with random letters;
//! 3. otherwise the caller's naming scheme decides.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::{PluginSettings, SettingsHandle};
use crate::domain::directory::{Channel, User};
use crate::domain::meeting::{
    MeetingAnnouncement, MeetingChoiceContext, MeetingRequest, StartOutcome,
};
use crate::domain::post::{AttachmentBuilder, Post, PostAction, PostBuilder, MEETING_POST_TYPE};
use crate::domain::user_config::{NamingScheme, UserConfig};
use crate::errors::MeetingError;
use crate::host::{EventBroadcast, HostError, PluginApi, PublishedEvent, CONFIG_CHANGE_EVENT};
use crate::i18n::{Localizer, MessageId};
use crate::naming;

/// How a start request reached us.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartIntent {
    /// Slash command or direct API call.
    Fresh(MeetingRequest),
    /// A button on an ask prompt was clicked.
    Choice { prompt_post_id: String, context: MeetingChoiceContext },
}

pub struct MeetingService {
    host: Arc<dyn PluginApi>,
    settings: Arc<SettingsHandle>,
    meetings_api_url: String,
    bot_user_id: String,
    action_token: SecretString,
}

impl MeetingService {
    pub fn new(
        host: Arc<dyn PluginApi>,
        settings: Arc<SettingsHandle>,
        meetings_api_url: impl Into<String>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            host,
            settings,
            meetings_api_url: meetings_api_url.into(),
            bot_user_id: bot_user_id.into(),
            action_token: SecretString::from(String::new()),
        }
    }

    /// Signs ask-prompt buttons so their callbacks can be trusted without the
    /// identity header.
    pub fn with_action_token(mut self, action_token: SecretString) -> Self {
        self.action_token = action_token;
        self
    }

    pub fn meetings_api_url(&self) -> &str {
        &self.meetings_api_url
    }

    /// Constant-time check of a token echoed back by a button callback. An
    /// unsigned service accepts nothing.
    pub fn accepts_action_token(&self, presented: &str) -> bool {
        let expected = self.action_token.expose_secret().as_bytes();
        !expected.is_empty() && bool::from(expected.ct_eq(presented.as_bytes()))
    }

    pub fn settings(&self) -> Arc<PluginSettings> {
        self.settings.snapshot()
    }

    /// Resolves the caller and the target channel, enforcing membership.
    pub async fn resolve_caller(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<(User, Channel), MeetingError> {
        let user = self.host.get_user(user_id).await.map_err(MeetingError::UserLookup)?;

        self.host.get_channel_member(channel_id, user_id).await.map_err(|_| {
            MeetingError::NotChannelMember {
                channel_id: channel_id.to_owned(),
                user_id: user_id.to_owned(),
            }
        })?;

        let channel =
            self.host.get_channel(channel_id).await.map_err(MeetingError::ChannelLookup)?;
        Ok((user, channel))
    }

    /// Full start flow shared by the HTTP endpoint and the slash command.
    pub async fn start(
        &self,
        user_id: &str,
        channel_id: &str,
        intent: StartIntent,
    ) -> Result<StartOutcome, MeetingError> {
        let (user, channel) = self.resolve_caller(user_id, channel_id).await?;

        match intent {
            StartIntent::Choice { prompt_post_id, context } => {
                let meeting_id =
                    self.announce(&user, &channel, MeetingRequest::from(context), None).await?;
                match self.host.delete_ephemeral_post(&user.id, &prompt_post_id).await {
                    Ok(()) => {}
                    Err(HostError::Unsupported(reason)) => debug!(
                        event_name = "plugin.meeting.prompt_left_to_caller",
                        user_id = %user.id,
                        post_id = %prompt_post_id,
                        reason,
                        "host cannot delete ask prompt; the callback response replaces it"
                    ),
                    Err(error) => warn!(
                        event_name = "plugin.meeting.prompt_cleanup_failed",
                        user_id = %user.id,
                        post_id = %prompt_post_id,
                        error = %error,
                        "could not delete ask prompt"
                    ),
                }
                Ok(StartOutcome::Started { meeting_id })
            }
            StartIntent::Fresh(request) => {
                let scheme = self.user_config(&user.id).await?.naming_scheme;
                if scheme == NamingScheme::Ask {
                    self.ask_meeting_type(&user, &channel, request.thread_root()).await?;
                    return Ok(StartOutcome::Prompted);
                }

                let meeting_id = self.announce(&user, &channel, request, Some(scheme)).await?;
                Ok(StartOutcome::Started { meeting_id })
            }
        }
    }

    /// Picks the identifier and topic, then posts the announcement.
    pub async fn start_meeting(
        &self,
        user: &User,
        channel: &Channel,
        request: MeetingRequest,
    ) -> Result<String, MeetingError> {
        self.announce(user, channel, request, None).await
    }

    async fn announce(
        &self,
        user: &User,
        channel: &Channel,
        request: MeetingRequest,
        scheme: Option<NamingScheme>,
    ) -> Result<String, MeetingError> {
        let settings = self.settings.snapshot();
        let announcement = self.plan(user, channel, &request, scheme, &settings).await?;
        let post = announcement_post(user, channel, &request, &announcement, &settings);

        self.host.create_post(post).await.map_err(MeetingError::CreatePost)?;

        info!(
            event_name = "plugin.meeting.started",
            user_id = %user.id,
            channel_id = %channel.id,
            meeting_id = %announcement.meeting_id,
            personal = announcement.personal,
            "meeting announced"
        );
        Ok(announcement.meeting_id)
    }

    async fn plan(
        &self,
        user: &User,
        channel: &Channel,
        request: &MeetingRequest,
        scheme: Option<NamingScheme>,
        settings: &PluginSettings,
    ) -> Result<MeetingAnnouncement, MeetingError> {
        let localizer = user_localizer(user, settings);
        let mut topic = request.explicit_topic().unwrap_or_default().to_owned();
        let mut personal = false;

        let meeting_id = if let Some(meeting_id) = request.explicit_meeting_id() {
            personal = request.personal;
            meeting_id.to_owned()
        } else if let Some(explicit_topic) = request.explicit_topic() {
            naming::topic_meeting_name(explicit_topic)
        } else {
            let scheme = match scheme {
                Some(scheme) => scheme,
                None => self.user_config(&user.id).await?.naming_scheme,
            };

            match scheme {
                NamingScheme::Uuid => naming::uuid_name(),
                NamingScheme::Mattermost if channel.channel_type.is_peer_to_peer() => {
                    let name = user.display_name();
                    topic = localizer
                        .render(MessageId::PersonalMeetingTopic, &[("name", name.as_str())]);
                    personal = true;
                    naming::personal_name(&user.username)
                }
                NamingScheme::Mattermost => {
                    let team = self
                        .host
                        .get_team(&channel.team_id)
                        .await
                        .map_err(MeetingError::TeamLookup)?;
                    topic = localizer.render(
                        MessageId::ChannelMeetingTopic,
                        &[("channel_name", channel.display_name.as_str())],
                    );
                    naming::team_channel_name(&team.name, &channel.name)
                }
                // `ask` is answered by a prompt before we get here; if it does
                // arrive, it gets the default.
                NamingScheme::Words | NamingScheme::Ask => naming::words_name(),
            }
        };

        Ok(MeetingAnnouncement {
            join_url: settings.meeting_url(&meeting_id),
            meeting_id,
            topic,
            personal,
            default_topic: Localizer::for_tag(&settings.server_locale)
                .text(MessageId::DefaultMeetingTopic),
        })
    }

    /// Offers the caller a choice of meeting names in a message only they see.
    pub async fn ask_meeting_type(
        &self,
        user: &User,
        channel: &Channel,
        root_id: Option<&str>,
    ) -> Result<(), MeetingError> {
        let settings = self.settings.snapshot();
        let localizer = user_localizer(user, &settings);
        let root = root_id.unwrap_or_default().to_owned();
        let action_token = self.action_token.expose_secret();
        let choice = |meeting_id: String, meeting_topic: String, personal: bool| {
            MeetingChoiceContext {
                meeting_id,
                meeting_topic,
                personal,
                root_id: root.clone(),
                action_token: action_token.to_owned(),
            }
        };

        let display_name = user.display_name();
        let random_name = naming::words_name();
        let mut prompt = AttachmentBuilder::new(localizer.text(MessageId::AskTitle))
            .text(localizer.text(MessageId::AskSelectMeetingType))
            .action(PostAction::new(
                localizer.text(MessageId::AskRandomWords),
                &self.meetings_api_url,
                choice(random_name.clone(), random_name, true),
            ))
            .action(PostAction::new(
                localizer.text(MessageId::AskPersonalMeeting),
                &self.meetings_api_url,
                choice(
                    naming::personal_name(&user.username),
                    localizer.render(MessageId::AskPersonalTopic, &[("name", display_name.as_str())]),
                    true,
                ),
            ));

        if !channel.channel_type.is_peer_to_peer() {
            let team_name = match self.host.get_team(&channel.team_id).await {
                Ok(team) => team.name,
                Err(error) => {
                    warn!(
                        event_name = "plugin.meeting.ask_team_lookup_failed",
                        channel_id = %channel.id,
                        team_id = %channel.team_id,
                        error = %error,
                        "offering channel meeting without team prefix"
                    );
                    String::new()
                }
            };
            prompt = prompt.action(PostAction::new(
                localizer.text(MessageId::AskChannelMeeting),
                &self.meetings_api_url,
                choice(
                    naming::team_channel_name(&team_name, &channel.name),
                    localizer.render(
                        MessageId::ChannelMeetingTopic,
                        &[("channel_name", channel.display_name.as_str())],
                    ),
                    false,
                ),
            ));
        }

        prompt = prompt.action(PostAction::new(
            localizer.text(MessageId::AskUuidMeeting),
            &self.meetings_api_url,
            choice(naming::uuid_name(), localizer.text(MessageId::DefaultMeetingTopic), false),
        ));

        let post = PostBuilder::new(&self.bot_user_id, &channel.id)
            .root_id(root_id)
            .attachment(prompt.build())
            .build();
        self.host.send_ephemeral_post(&user.id, post).await.map_err(MeetingError::EphemeralPost)?;

        info!(
            event_name = "plugin.meeting.ask_prompt_sent",
            user_id = %user.id,
            channel_id = %channel.id,
            "ask prompt sent"
        );
        Ok(())
    }

    /// Localizer for the user's locale; the server locale when the user cannot be found.
    pub async fn localizer_for(&self, user_id: &str) -> Localizer {
        let settings = self.settings.snapshot();
        match self.host.get_user(user_id).await {
            Ok(user) => user_localizer(&user, &settings),
            Err(_) => Localizer::for_tag(&settings.server_locale),
        }
    }

    /// Stored preference, or the plugin default when the user never chose one.
    pub async fn user_config(&self, user_id: &str) -> Result<UserConfig, MeetingError> {
        let default_scheme = self.settings.snapshot().naming_scheme;
        let stored = self
            .host
            .kv_get(&UserConfig::storage_key(user_id))
            .await
            .map_err(MeetingError::Storage)?;

        match stored {
            Some(raw) => Ok(UserConfig::decode(&raw, default_scheme)?),
            None => Ok(UserConfig::new(default_scheme)),
        }
    }

    /// Overwrites the preference and notifies the user's clients.
    pub async fn set_user_config(
        &self,
        user_id: &str,
        config: &UserConfig,
    ) -> Result<(), MeetingError> {
        let encoded = config.encode()?;
        self.host
            .kv_set(&UserConfig::storage_key(user_id), encoded)
            .await
            .map_err(MeetingError::Storage)?;

        let event = PublishedEvent {
            event: CONFIG_CHANGE_EVENT.to_owned(),
            payload: json!({}),
            broadcast: EventBroadcast::user(user_id),
        };
        if let Err(error) = self.host.publish_event(event).await {
            warn!(
                event_name = "plugin.config.publish_failed",
                user_id = %user_id,
                error = %error,
                "config stored but change notification failed"
            );
        }

        info!(
            event_name = "plugin.config.updated",
            user_id = %user_id,
            naming_scheme = %config.naming_scheme,
            "user naming scheme updated"
        );
        Ok(())
    }
}

fn user_localizer(user: &User, settings: &PluginSettings) -> Localizer {
    if user.locale.trim().is_empty() {
        Localizer::for_tag(&settings.server_locale)
    } else {
        Localizer::for_tag(&user.locale)
    }
}

fn announcement_post(
    user: &User,
    channel: &Channel,
    request: &MeetingRequest,
    announcement: &MeetingAnnouncement,
    settings: &PluginSettings,
) -> Post {
    let localizer = user_localizer(user, settings);
    let meeting_type = if announcement.personal {
        localizer.text(MessageId::PersonalMeetingIdLabel)
    } else {
        localizer.text(MessageId::MeetingIdLabel)
    };
    let link_data = [
        ("meeting_type", meeting_type.as_str()),
        ("meeting_id", announcement.meeting_id.as_str()),
        ("meeting_url", announcement.join_url.as_str()),
    ];

    let attachment = AttachmentBuilder::new(announcement.title())
        .fallback(localizer.render(MessageId::FallbackText, &link_data))
        .text(localizer.render(MessageId::AttachmentText, &link_data))
        .build();

    PostBuilder::new(&user.id, &channel.id)
        .root_id(request.thread_root())
        .post_type(MEETING_POST_TYPE)
        .attachment(attachment)
        .prop("meeting_id", announcement.meeting_id.as_str())
        .prop("meeting_link", announcement.join_url.as_str())
        .prop("meeting_personal", announcement.personal)
        .prop("meeting_topic", announcement.stored_topic())
        .prop("default_meeting_topic", announcement.default_topic.as_str())
        .build()
}
