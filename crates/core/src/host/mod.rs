//! Capabilities the chat server provides to the integration.
//!
//! Everything the meeting flow needs from the outside world goes through
//! [`PluginApi`]; the orchestrator never talks to a concrete transport.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::directory::{BotSpec, Channel, ChannelMember, Team, User};
use crate::domain::post::Post;

pub mod memory;

pub use memory::MemoryHost;

pub const CONFIG_CHANGE_EVENT: &str = "custom_gmeet_config_update";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("host request failed: {0}")]
    Transport(String),
    #[error("host storage failed: {0}")]
    Storage(String),
    #[error("not supported by this host: {0}")]
    Unsupported(&'static str),
}

impl HostError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

/// Recipients of a published event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventBroadcast {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl EventBroadcast {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), channel_id: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublishedEvent {
    pub event: String,
    pub payload: Value,
    pub broadcast: EventBroadcast,
}

#[async_trait]
pub trait PluginApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError>;

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, HostError>;

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelMember, HostError>;

    async fn get_team(&self, team_id: &str) -> Result<Team, HostError>;

    async fn create_post(&self, post: Post) -> Result<Post, HostError>;

    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, HostError>;

    async fn delete_ephemeral_post(&self, user_id: &str, post_id: &str) -> Result<(), HostError>;

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError>;

    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError>;

    async fn publish_event(&self, event: PublishedEvent) -> Result<(), HostError>;

    /// Returns the user id of the bot, creating the account when missing.
    async fn ensure_bot(&self, bot: &BotSpec) -> Result<String, HostError>;
}
