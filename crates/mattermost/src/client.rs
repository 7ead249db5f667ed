//! [`PluginApi`] backed by the Mattermost REST v4 API.
//!
//! Directory lookups and posts go over HTTP with the bot token. The REST API
//! has no plugin key-value store or websocket publish, so preferences live in
//! the local database and events are fanned out on an in-process channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use gmeet_core::domain::directory::{BotSpec, Channel, ChannelMember, Team, User};
use gmeet_core::domain::post::Post;
use gmeet_core::host::{HostError, PluginApi, PublishedEvent};
use gmeet_db::repositories::KvRepository;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct RestHost {
    client: reqwest::Client,
    api_url: String,
    kv: Arc<dyn KvRepository>,
    events: broadcast::Sender<PublishedEvent>,
}

#[derive(Serialize)]
struct EphemeralPostRequest<'a> {
    user_id: &'a str,
    post: &'a Post,
}

#[derive(Serialize)]
struct CreateBotRequest<'a> {
    username: &'a str,
    display_name: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct BotResponse {
    user_id: String,
}

impl RestHost {
    pub fn new(
        site_url: &str,
        bot_token: &SecretString,
        timeout: Duration,
        kv: Arc<dyn KvRepository>,
    ) -> Result<Self, HostError> {
        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", bot_token.expose_secret()))
                .map_err(|error| HostError::Transport(format!("invalid bot token: {error}")))?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|error| HostError::Transport(error.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            client,
            api_url: format!("{}/api/v4", site_url.trim_end_matches('/')),
            kv,
            events,
        })
    }

    /// Receives every event published after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        entity: &'static str,
        id: &str,
        path: &str,
    ) -> Result<T, HostError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_url))
            .send()
            .await
            .map_err(transport_error)?;
        decode(check_status(response, entity, id).await?).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        entity: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, HostError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_url))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(check_status(response, entity, path).await?).await
    }
}

async fn check_status(
    response: Response,
    entity: &'static str,
    id: &str,
) -> Result<Response, HostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(
        event_name = "plugin.host.request_failed",
        status = %status,
        entity,
        id,
        body = %body,
        "mattermost api returned error status"
    );
    Err(match status {
        StatusCode::NOT_FOUND => HostError::not_found(entity, id),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HostError::Forbidden(format!("{entity} `{id}`: {status}"))
        }
        _ => HostError::Transport(format!("{entity} `{id}`: {status}")),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HostError> {
    response.json::<T>().await.map_err(transport_error)
}

fn transport_error(error: reqwest::Error) -> HostError {
    HostError::Transport(error.to_string())
}

#[async_trait]
impl PluginApi for RestHost {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError> {
        self.get_json("user", user_id, &format!("/users/{user_id}")).await
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, HostError> {
        self.get_json("channel", channel_id, &format!("/channels/{channel_id}")).await
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelMember, HostError> {
        self.get_json(
            "channel member",
            &format!("{channel_id}/{user_id}"),
            &format!("/channels/{channel_id}/members/{user_id}"),
        )
        .await
    }

    async fn get_team(&self, team_id: &str) -> Result<Team, HostError> {
        self.get_json("team", team_id, &format!("/teams/{team_id}")).await
    }

    async fn create_post(&self, post: Post) -> Result<Post, HostError> {
        self.post_json("post", "/posts", &post).await
    }

    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, HostError> {
        self.post_json("ephemeral post", "/posts/ephemeral", &EphemeralPostRequest {
            user_id,
            post: &post,
        })
        .await
    }

    /// Ephemeral posts only exist in the recipient's client and REST v4 has no
    /// call that removes them. The interactive-action response replaces the
    /// prompt instead.
    async fn delete_ephemeral_post(&self, user_id: &str, post_id: &str) -> Result<(), HostError> {
        debug!(
            event_name = "plugin.host.ephemeral_delete_unsupported",
            user_id,
            post_id,
            "ephemeral post left for the action response"
        );
        Err(HostError::Unsupported("deleting ephemeral posts over REST"))
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
        self.kv.get(key).await.map_err(|error| HostError::Storage(error.to_string()))
    }

    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
        self.kv.set(key, &value).await.map_err(|error| HostError::Storage(error.to_string()))
    }

    async fn publish_event(&self, event: PublishedEvent) -> Result<(), HostError> {
        info!(
            event_name = "plugin.host.event_published",
            event = %event.event,
            user_id = event.broadcast.user_id.as_deref().unwrap_or_default(),
            channel_id = event.broadcast.channel_id.as_deref().unwrap_or_default(),
            "plugin event published"
        );
        // No subscribers is fine; the event has nowhere to go.
        let _ = self.events.send(event);
        Ok(())
    }

    async fn ensure_bot(&self, spec: &BotSpec) -> Result<String, HostError> {
        let path = format!("/users/username/{}", spec.username);
        match self.get_json::<User>("user", &spec.username, &path).await {
            Ok(user) => return Ok(user.id),
            Err(HostError::NotFound { .. }) => {}
            Err(error) => return Err(error),
        }

        let bot: BotResponse = self
            .post_json("bot", "/bots", &CreateBotRequest {
                username: &spec.username,
                display_name: &spec.display_name,
                description: &spec.description,
            })
            .await?;
        info!(
            event_name = "plugin.host.bot_created",
            username = %spec.username,
            user_id = %bot.user_id,
            "bot account created"
        );
        Ok(bot.user_id)
    }
}
