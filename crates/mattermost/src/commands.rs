use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use gmeet_core::domain::meeting::MeetingRequest;
use gmeet_core::domain::user_config::{NamingScheme, UserConfig};
use gmeet_core::i18n::{Localizer, MessageId};
use gmeet_core::meetings::{MeetingService, StartIntent};

pub const GMEET_COMMAND: &str = "/gmeet";

/// Form fields the chat server posts for a slash command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub token: String,
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub root_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: GmeetCommand,
    pub channel_id: String,
    pub user_id: String,
    pub root_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GmeetCommand {
    Start { topic: Option<String> },
    Settings { scheme: Option<String> },
    Help,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: String,
    pub text: String,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { response_type: "ephemeral".to_owned(), text: text.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_gmeet_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != GMEET_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let root_id = Some(payload.root_id).filter(|root_id| !root_id.is_empty());
    Ok(CommandEnvelope {
        command: parse_gmeet_command(&payload.text),
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        root_id,
    })
}

/// Anything that is not a known verb is taken as a meeting topic.
pub fn parse_gmeet_command(input: &str) -> GmeetCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return GmeetCommand::Start { topic: None };
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };
    let rest = (!rest.is_empty()).then(|| rest.to_owned());

    match verb.to_ascii_lowercase().as_str() {
        "start" => GmeetCommand::Start { topic: rest },
        "settings" => GmeetCommand::Settings {
            scheme: rest.and_then(|rest| rest.split_whitespace().next().map(str::to_owned)),
        },
        "help" => GmeetCommand::Help,
        _ => GmeetCommand::Start { topic: Some(trimmed.to_owned()) },
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: GmeetCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        match envelope.command.clone() {
            GmeetCommand::Start { topic } => self.service.start_meeting(topic, &envelope).await,
            GmeetCommand::Settings { scheme: None } => self.service.show_settings(&envelope).await,
            GmeetCommand::Settings { scheme: Some(raw) } => match NamingScheme::from_str(&raw) {
                Ok(scheme) => self.service.update_settings(scheme, &envelope).await,
                Err(_) => {
                    let localizer = self.service.localizer(&envelope).await;
                    let text = localizer
                        .render(MessageId::CommandSettingsInvalid, &[("scheme", raw.as_str())]);
                    Ok(CommandResponse::ephemeral(text))
                }
            },
            GmeetCommand::Help => {
                let localizer = self.service.localizer(&envelope).await;
                Ok(CommandResponse::ephemeral(localizer.text(MessageId::CommandHelp)))
            }
        }
    }
}

#[async_trait]
pub trait GmeetCommandService: Send + Sync {
    async fn start_meeting(
        &self,
        topic: Option<String>,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn show_settings(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn update_settings(
        &self,
        scheme: NamingScheme,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn localizer(&self, _envelope: &CommandEnvelope) -> Localizer {
        Localizer::default()
    }
}

/// Runs slash commands against the meeting service.
pub struct MeetingCommandService {
    meetings: Arc<MeetingService>,
}

impl MeetingCommandService {
    pub fn new(meetings: Arc<MeetingService>) -> Self {
        Self { meetings }
    }
}

#[async_trait]
impl GmeetCommandService for MeetingCommandService {
    async fn start_meeting(
        &self,
        topic: Option<String>,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        let request =
            MeetingRequest { topic, root_id: envelope.root_id.clone(), ..Default::default() };
        match self
            .meetings
            .start(&envelope.user_id, &envelope.channel_id, StartIntent::Fresh(request))
            .await
        {
            // The announcement or the prompt is the visible result.
            Ok(_) => Ok(CommandResponse::ephemeral("")),
            Err(error) => {
                warn!(
                    event_name = "plugin.command.start_failed",
                    user_id = %envelope.user_id,
                    channel_id = %envelope.channel_id,
                    error = %error,
                    "slash command could not start meeting"
                );
                let localizer = self.localizer(envelope).await;
                Ok(CommandResponse::ephemeral(localizer.text(MessageId::CommandStartFailed)))
            }
        }
    }

    async fn show_settings(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        let config = self
            .meetings
            .user_config(&envelope.user_id)
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;
        let localizer = self.localizer(envelope).await;
        Ok(CommandResponse::ephemeral(localizer.render(
            MessageId::CommandSettingsCurrent,
            &[("scheme", config.naming_scheme.as_str())],
        )))
    }

    async fn update_settings(
        &self,
        scheme: NamingScheme,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        self.meetings
            .set_user_config(&envelope.user_id, &UserConfig::new(scheme))
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;
        let localizer = self.localizer(envelope).await;
        Ok(CommandResponse::ephemeral(
            localizer.render(MessageId::CommandSettingsUpdated, &[("scheme", scheme.as_str())]),
        ))
    }

    async fn localizer(&self, envelope: &CommandEnvelope) -> Localizer {
        self.meetings.localizer_for(&envelope.user_id).await
    }
}
