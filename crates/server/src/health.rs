//! Readiness report served on its own port.
//!
//! The service is ready when the plugin KV table answers and the chat server
//! still resolves the bot account. The live settings snapshot is echoed so an
//! operator can confirm a SIGHUP reload took effect.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use gmeet_core::host::PluginApi;
use gmeet_core::{NamingScheme, SettingsHandle};
use gmeet_db::DbPool;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ReadinessState {
    pub db_pool: DbPool,
    pub host: Arc<dyn PluginApi>,
    pub bot_user_id: String,
    pub settings: Arc<SettingsHandle>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub ready: bool,
    pub detail: String,
}

impl DependencyStatus {
    fn up(detail: impl Into<String>) -> Self {
        Self { ready: true, detail: detail.into() }
    }

    fn down(detail: impl Into<String>) -> Self {
        Self { ready: false, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveSettings {
    pub naming_scheme: NamingScheme,
    pub meet_base_url: String,
    pub server_locale: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub bot_user_id: String,
    pub kv_store: DependencyStatus,
    pub chat_server: DependencyStatus,
    pub settings: ActiveSettings,
    pub checked_at: String,
}

pub fn router(state: ReadinessState) -> Router {
    Router::new().route("/health", get(readiness)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: ReadinessState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "readiness endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "readiness endpoint terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn readiness(
    State(state): State<ReadinessState>,
) -> (StatusCode, Json<ReadinessReport>) {
    let (kv_store, chat_server) = tokio::join!(
        kv_store_status(&state.db_pool),
        chat_server_status(state.host.as_ref(), &state.bot_user_id),
    );
    let ready = kv_store.ready && chat_server.ready;
    if !ready {
        warn!(
            event_name = "system.health.not_ready",
            kv_store = %kv_store.detail,
            chat_server = %chat_server.detail,
            "service not ready"
        );
    }

    let settings = state.settings.snapshot();
    let report = ReadinessReport {
        ready,
        bot_user_id: state.bot_user_id.clone(),
        kv_store,
        chat_server,
        settings: ActiveSettings {
            naming_scheme: settings.naming_scheme,
            meet_base_url: settings.meet_base_url.clone(),
            server_locale: settings.server_locale.clone(),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(report))
}

async fn kv_store_status(pool: &DbPool) -> DependencyStatus {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plugin_kv").fetch_one(pool).await {
        Ok(entries) => DependencyStatus::up(format!("{entries} stored entries")),
        Err(error) => DependencyStatus::down(format!("plugin_kv unavailable: {error}")),
    }
}

async fn chat_server_status(host: &dyn PluginApi, bot_user_id: &str) -> DependencyStatus {
    match host.get_user(bot_user_id).await {
        Ok(bot) => DependencyStatus::up(format!("bot @{} resolved", bot.username)),
        Err(error) => DependencyStatus::down(format!("bot lookup failed: {error}")),
    }
}
