use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{HostError, PluginApi, PublishedEvent};
use crate::domain::directory::{BotSpec, Channel, ChannelMember, Team, User};
use crate::domain::post::Post;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    GetTeam,
    CreatePost,
    SendEphemeralPost,
    DeleteEphemeralPost,
    KvGet,
    KvSet,
    PublishEvent,
}

/// In-process host with a seeded directory. Records every side effect so
/// callers can inspect what the integration did.
#[derive(Default)]
pub struct MemoryHost {
    users: RwLock<HashMap<String, User>>,
    channels: RwLock<HashMap<String, Channel>>,
    teams: RwLock<HashMap<String, Team>>,
    members: RwLock<HashSet<(String, String)>>,
    posts: RwLock<Vec<Post>>,
    ephemeral_posts: RwLock<Vec<(String, Post)>>,
    deleted_ephemeral_posts: RwLock<Vec<(String, String)>>,
    kv: RwLock<HashMap<String, Vec<u8>>>,
    events: RwLock<Vec<PublishedEvent>>,
    bots: RwLock<HashMap<String, String>>,
    fail_points: RwLock<HashSet<FailPoint>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn insert_channel(&self, channel: Channel) {
        self.channels.write().await.insert(channel.id.clone(), channel);
    }

    pub async fn insert_team(&self, team: Team) {
        self.teams.write().await.insert(team.id.clone(), team);
    }

    pub async fn add_member(&self, channel_id: &str, user_id: &str) {
        self.members.write().await.insert((channel_id.to_owned(), user_id.to_owned()));
    }

    pub async fn fail(&self, point: FailPoint) {
        self.fail_points.write().await.insert(point);
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    pub async fn ephemeral_posts(&self) -> Vec<(String, Post)> {
        self.ephemeral_posts.read().await.clone()
    }

    pub async fn deleted_ephemeral_posts(&self) -> Vec<(String, String)> {
        self.deleted_ephemeral_posts.read().await.clone()
    }

    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.events.read().await.clone()
    }

    async fn check(&self, point: FailPoint) -> Result<(), HostError> {
        if self.fail_points.read().await.contains(&point) {
            return Err(HostError::Transport(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginApi for MemoryHost {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError> {
        let users = self.users.read().await;
        users.get(user_id).cloned().ok_or_else(|| HostError::not_found("user", user_id))
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, HostError> {
        let channels = self.channels.read().await;
        channels.get(channel_id).cloned().ok_or_else(|| HostError::not_found("channel", channel_id))
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelMember, HostError> {
        let members = self.members.read().await;
        if members.contains(&(channel_id.to_owned(), user_id.to_owned())) {
            Ok(ChannelMember { channel_id: channel_id.to_owned(), user_id: user_id.to_owned() })
        } else {
            Err(HostError::not_found("channel member", format!("{channel_id}/{user_id}")))
        }
    }

    async fn get_team(&self, team_id: &str) -> Result<Team, HostError> {
        self.check(FailPoint::GetTeam).await?;
        let teams = self.teams.read().await;
        teams.get(team_id).cloned().ok_or_else(|| HostError::not_found("team", team_id))
    }

    async fn create_post(&self, mut post: Post) -> Result<Post, HostError> {
        self.check(FailPoint::CreatePost).await?;
        post.id = Uuid::new_v4().simple().to_string();
        self.posts.write().await.push(post.clone());
        Ok(post)
    }

    async fn send_ephemeral_post(&self, user_id: &str, mut post: Post) -> Result<Post, HostError> {
        self.check(FailPoint::SendEphemeralPost).await?;
        post.id = Uuid::new_v4().simple().to_string();
        self.ephemeral_posts.write().await.push((user_id.to_owned(), post.clone()));
        Ok(post)
    }

    async fn delete_ephemeral_post(&self, user_id: &str, post_id: &str) -> Result<(), HostError> {
        self.check(FailPoint::DeleteEphemeralPost).await?;
        self.ephemeral_posts
            .write()
            .await
            .retain(|(recipient, post)| !(recipient == user_id && post.id == post_id));
        self.deleted_ephemeral_posts.write().await.push((user_id.to_owned(), post_id.to_owned()));
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
        self.check(FailPoint::KvGet).await?;
        Ok(self.kv.read().await.get(key).cloned())
    }

    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
        self.check(FailPoint::KvSet).await?;
        self.kv.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn publish_event(&self, event: PublishedEvent) -> Result<(), HostError> {
        self.check(FailPoint::PublishEvent).await?;
        self.events.write().await.push(event);
        Ok(())
    }

    async fn ensure_bot(&self, bot: &BotSpec) -> Result<String, HostError> {
        let mut bots = self.bots.write().await;
        let id = bots
            .entry(bot.username.clone())
            .or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone();
        drop(bots);

        let mut users = self.users.write().await;
        users.entry(id.clone()).or_insert_with(|| User {
            id: id.clone(),
            username: bot.username.clone(),
            nickname: bot.display_name.clone(),
            ..User::default()
        });
        Ok(id)
    }
}
