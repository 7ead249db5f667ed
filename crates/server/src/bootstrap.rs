use std::sync::Arc;
use std::time::Duration;

use gmeet_core::config::{AppConfig, ConfigError};
use gmeet_core::domain::directory::BotSpec;
use gmeet_core::host::{HostError, PluginApi};
use gmeet_core::meetings::MeetingService;
use gmeet_core::{naming, SettingsHandle};
use gmeet_db::{connect_with_settings, migrations, DbPool, SqlKvRepository};
use gmeet_mattermost::RestHost;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub settings: Arc<SettingsHandle>,
    pub host: Arc<dyn PluginApi>,
    pub meetings: Arc<MeetingService>,
    pub bot_user_id: String,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mattermost client setup failed: {0}")]
    Host(#[source] HostError),
    #[error("bot account provisioning failed: {0}")]
    BotProvisioning(#[source] HostError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let host: Arc<dyn PluginApi> = Arc::new(
        RestHost::new(
            &config.mattermost.site_url,
            &config.mattermost.bot_token,
            Duration::from_secs(config.mattermost.timeout_secs),
            Arc::new(SqlKvRepository::new(db_pool.clone())),
        )
        .map_err(BootstrapError::Host)?,
    );

    let bot_user_id =
        host.ensure_bot(&BotSpec::default()).await.map_err(BootstrapError::BotProvisioning)?;
    info!(
        event_name = "system.bootstrap.bot_ready",
        correlation_id = "bootstrap",
        bot_user_id = %bot_user_id,
        "bot account ready"
    );

    let action_token = if config.mattermost.action_token.expose_secret().trim().is_empty() {
        SecretString::from(naming::random_alpha_string(32))
    } else {
        config.mattermost.action_token.clone()
    };
    let callback_url = config.server.meetings_callback_url();
    info!(
        event_name = "system.bootstrap.callback_url",
        correlation_id = "bootstrap",
        callback_url = %callback_url,
        "ask-prompt buttons post back to this service"
    );

    let settings = Arc::new(SettingsHandle::new(config.plugin.clone()));
    let meetings = Arc::new(
        MeetingService::new(
            Arc::clone(&host),
            Arc::clone(&settings),
            callback_url,
            bot_user_id.clone(),
        )
        .with_action_token(action_token),
    );

    Ok(Application { config, db_pool, settings, host, meetings, bot_user_id })
}
