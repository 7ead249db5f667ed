//! HTTP surface served under the plugin route prefix.
//!
//! - `POST /api/v1/meetings`  - start a meeting (direct call or ask-prompt button)
//! - `GET  /api/v1/config`    - the caller's effective naming preference
//! - `POST /api/v1/commands`  - `/gmeet` slash command callback
//!
//! Callers are identified by the `Mattermost-User-Id` header. The service binds
//! to loopback unless `server.trust_identity_header` says a proxy in front of it
//! authenticates the session and overwrites that header. Ask-prompt button
//! callbacks come straight from the chat server with the user id in the body;
//! those are trusted only when the button's action token checks out. Anything
//! else without an identity is rejected before the body is used.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use gmeet_core::config::PLUGIN_ROUTE_PREFIX;
use gmeet_core::errors::{ApplicationError, InterfaceError};
use gmeet_core::i18n::MessageId;
use gmeet_core::meetings::{MeetingService, StartIntent};
use gmeet_core::StartOutcome;
use gmeet_mattermost::actions::{parse_start_request, PromptUpdate, StartRequest};
use gmeet_mattermost::commands::{
    normalize_gmeet_command, CommandRouter, MeetingCommandService, SlashCommandPayload,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "Mattermost-User-Id";

#[derive(Clone)]
pub struct ApiState {
    meetings: Arc<MeetingService>,
    command_token: SecretString,
}

impl ApiState {
    pub fn new(meetings: Arc<MeetingService>, command_token: SecretString) -> Self {
        Self { meetings, command_token }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StartMeetingResponse {
    pub meeting_id: String,
    /// Set for button callbacks; replaces the ask prompt the button sat on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<PromptUpdate>,
}

pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/api/v1/meetings", post(start_meeting))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/commands", post(execute_command))
        .with_state(state);

    Router::new().nest(PLUGIN_ROUTE_PREFIX, api).layer(TraceLayer::new_for_http())
}

async fn start_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let parsed = parse_start_request(&body);
    let user_id = match caller_id(&headers) {
        Some(user_id) => user_id,
        None => match parsed.as_ref().ok().and_then(|request| signed_caller(&state, request)) {
            Some(user_id) => user_id,
            None => {
                return error_response(
                    ApplicationError::Unauthenticated.into_interface(&correlation_id),
                )
            }
        },
    };

    let request = match parsed {
        Ok(request) => request,
        Err(error) => {
            let error = ApplicationError::MalformedRequest(error.to_string());
            return error_response(error.into_interface(&correlation_id));
        }
    };

    let channel_id = request.channel_id().to_owned();
    let intent = request.into_intent();
    let from_prompt = matches!(intent, StartIntent::Choice { .. });
    match state.meetings.start(&user_id, &channel_id, intent).await {
        Ok(StartOutcome::Started { meeting_id }) => {
            info!(
                event_name = "api.meetings.started",
                correlation_id = %correlation_id,
                user_id = %user_id,
                channel_id = %channel_id,
                meeting_id = %meeting_id,
                "meeting started"
            );
            let update = if from_prompt {
                let localizer = state.meetings.localizer_for(&user_id).await;
                let message = localizer
                    .render(MessageId::AskPromptAnswered, &[("meeting_id", meeting_id.as_str())]);
                Some(PromptUpdate::answered(message))
            } else {
                None
            };
            (StatusCode::OK, Json(StartMeetingResponse { meeting_id, update })).into_response()
        }
        Ok(StartOutcome::Prompted) => (StatusCode::OK, "OK").into_response(),
        Err(error) => error_response(ApplicationError::from(error).into_interface(&correlation_id)),
    }
}

async fn get_config(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let Some(user_id) = caller_id(&headers) else {
        return error_response(ApplicationError::Unauthenticated.into_interface(&correlation_id));
    };

    match state.meetings.user_config(&user_id).await {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(error) => error_response(ApplicationError::from(error).into_interface(&correlation_id)),
    }
}

async fn execute_command(
    State(state): State<ApiState>,
    Form(payload): Form<SlashCommandPayload>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let expected = state.command_token.expose_secret().as_bytes();
    if !bool::from(payload.token.as_bytes().ct_eq(expected)) {
        warn!(
            event_name = "api.commands.token_rejected",
            correlation_id = %correlation_id,
            user_id = %payload.user_id,
            "slash command token mismatch"
        );
        return (StatusCode::UNAUTHORIZED, "Not authorized").into_response();
    }

    let envelope = match normalize_gmeet_command(payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(
                event_name = "api.commands.unsupported",
                correlation_id = %correlation_id,
                error = %error,
                "slash command rejected"
            );
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };

    let router = CommandRouter::new(MeetingCommandService::new(Arc::clone(&state.meetings)));
    match router.route(envelope).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            error!(
                event_name = "api.commands.failed",
                correlation_id = %correlation_id,
                error = %error,
                "slash command failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Identity of a button callback, taken from the body once its action token
/// matches the one the prompt was signed with.
fn signed_caller(state: &ApiState, request: &StartRequest) -> Option<String> {
    let (user_id, action_token) = request.action_credentials()?;
    state.meetings.accepts_action_token(action_token).then(|| user_id.to_owned())
}

fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn error_response(error: InterfaceError) -> Response {
    let status = match &error {
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            correlation_id = %error.correlation_id(),
            error = %error,
            "request failed"
        );
    } else {
        warn!(
            event_name = "api.request.rejected",
            correlation_id = %error.correlation_id(),
            error = %error,
            "request rejected"
        );
    }

    (status, error.user_message()).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        Router,
    };
    use gmeet_core::domain::directory::{Channel, ChannelType, Team, User};
    use gmeet_core::domain::user_config::{NamingScheme, UserConfig};
    use gmeet_core::host::memory::FailPoint;
    use gmeet_core::{MeetingService, MemoryHost, PluginSettings, SettingsHandle};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ApiState, USER_ID_HEADER};

    const MEETINGS: &str = "/plugins/gmeet/api/v1/meetings";
    const CONFIG: &str = "/plugins/gmeet/api/v1/config";
    const COMMANDS: &str = "/plugins/gmeet/api/v1/commands";
    const BUTTON_TOKEN: &str = "button-secret";

    async fn fixture(scheme: NamingScheme) -> (Router, Arc<MemoryHost>, Arc<MeetingService>) {
        let host = Arc::new(MemoryHost::new());
        host.insert_user(User {
            id: "u1".to_owned(),
            username: "jdoe".to_owned(),
            first_name: "Jane".to_owned(),
            last_name: "Doe".to_owned(),
            ..User::default()
        })
        .await;
        host.insert_team(Team {
            id: "t1".to_owned(),
            name: "acme".to_owned(),
            display_name: "Acme".to_owned(),
        })
        .await;
        host.insert_channel(Channel {
            id: "c1".to_owned(),
            team_id: "t1".to_owned(),
            channel_type: ChannelType::Open,
            name: "town-square".to_owned(),
            display_name: "Town Square".to_owned(),
        })
        .await;
        host.add_member("c1", "u1").await;

        let settings = Arc::new(SettingsHandle::new(PluginSettings {
            naming_scheme: scheme,
            ..PluginSettings::default()
        }));
        let meetings = Arc::new(
            MeetingService::new(
                host.clone(),
                settings,
                "http://127.0.0.1:8065/plugins/gmeet/api/v1/meetings",
                "bot-1",
            )
            .with_action_token(SecretString::from(BUTTON_TOKEN.to_owned())),
        );
        let app = router(ApiState::new(
            Arc::clone(&meetings),
            SecretString::from("command-secret".to_owned()),
        ));
        (app, host, meetings)
    }

    fn json_post(uri: &str, user_id: Option<&str>, body: &str) -> Request<Body> {
        let mut builder =
            Request::builder().method("POST").uri(uri).header(CONTENT_TYPE, "application/json");
        if let Some(user_id) = user_id {
            builder = builder.header(USER_ID_HEADER, user_id);
        }
        builder.body(Body::from(body.to_owned())).expect("request")
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(COMMANDS)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn start_without_identity_is_unauthorized_even_with_garbage_body() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response = app.oneshot(json_post(MEETINGS, None, "not json")).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(response).await, "Not authorized");
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn direct_start_posts_meeting_and_returns_its_id() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response = app
            .oneshot(json_post(
                MEETINGS,
                Some("u1"),
                r#"{"channel_id":"c1","topic":"Sprint Planning"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        let meeting_id = body["meeting_id"].as_str().expect("meeting id");
        assert!(meeting_id.starts_with("Sprint-Planning-"));

        let posts = host.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel_id, "c1");
        assert_eq!(posts[0].props["meeting_id"], meeting_id);
    }

    #[tokio::test]
    async fn ask_preference_sends_prompt_and_answers_ok() {
        let (app, host, _) = fixture(NamingScheme::Ask).await;

        let response = app
            .oneshot(json_post(MEETINGS, Some("u1"), r#"{"channel_id":"c1"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
        assert!(host.posts().await.is_empty());
        assert_eq!(host.ephemeral_posts().await.len(), 1);
    }

    /// Sends the ask prompt and returns the callback body its first button posts.
    async fn click_first_prompt_button(app: &Router, host: &MemoryHost) -> Value {
        let response = app
            .clone()
            .oneshot(json_post(MEETINGS, Some("u1"), r#"{"channel_id":"c1"}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let prompts = host.ephemeral_posts().await;
        let prompt = &prompts[0].1;
        let integration = &prompt.attachments()[0].actions[0].integration;
        json!({
            "user_id": "u1",
            "channel_id": "c1",
            "post_id": prompt.id,
            "context": integration.context,
        })
    }

    #[tokio::test]
    async fn prompt_button_starts_chosen_meeting_and_replaces_prompt() {
        let (app, host, _) = fixture(NamingScheme::Ask).await;
        let callback = click_first_prompt_button(&app, &host).await;
        let chosen = callback["context"]["meeting_id"].as_str().expect("meeting id").to_owned();

        let response =
            app.oneshot(json_post(MEETINGS, None, &callback.to_string())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["meeting_id"], chosen.as_str());
        assert_eq!(body["update"]["props"], json!({}));
        assert_eq!(body["update"]["message"], format!("Meeting `{chosen}` started."));

        let posts = host.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].props["meeting_id"], chosen.as_str());
        assert!(host.ephemeral_posts().await.is_empty());
    }

    #[tokio::test]
    async fn prompt_is_replaced_even_when_host_cannot_delete_it() {
        let (app, host, _) = fixture(NamingScheme::Ask).await;
        host.fail(FailPoint::DeleteEphemeralPost).await;
        let callback = click_first_prompt_button(&app, &host).await;

        let response =
            app.oneshot(json_post(MEETINGS, None, &callback.to_string())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["update"]["props"], json!({}));
        assert_eq!(host.posts().await.len(), 1);
    }

    #[tokio::test]
    async fn button_callback_with_forged_token_is_unauthorized() {
        let (app, host, _) = fixture(NamingScheme::Ask).await;
        let mut callback = click_first_prompt_button(&app, &host).await;
        callback["context"]["action_token"] = json!("button-secreT");

        let response =
            app.oneshot(json_post(MEETINGS, None, &callback.to_string())).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn direct_start_does_not_carry_prompt_update() {
        let (app, _, _) = fixture(NamingScheme::Uuid).await;

        let response = app
            .oneshot(json_post(MEETINGS, Some("u1"), r#"{"channel_id":"c1"}"#))
            .await
            .expect("response");

        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert!(body.get("update").is_none());
    }

    #[tokio::test]
    async fn undecodable_body_is_bad_request() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response =
            app.oneshot(json_post(MEETINGS, Some("u1"), "{\"channel_id\":")).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Unable to decode your request");
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn non_member_is_forbidden() {
        let (app, host, _) = fixture(NamingScheme::Words).await;
        host.insert_user(User {
            id: "u2".to_owned(),
            username: "mallory".to_owned(),
            ..User::default()
        })
        .await;

        let response = app
            .oneshot(json_post(MEETINGS, Some("u2"), r#"{"channel_id":"c1"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn post_failure_is_internal_error() {
        let (app, host, _) = fixture(NamingScheme::Words).await;
        host.fail(FailPoint::CreatePost).await;

        let response = app
            .oneshot(json_post(MEETINGS, Some("u1"), r#"{"channel_id":"c1"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal error");
    }

    #[tokio::test]
    async fn config_returns_default_then_stored_preference() {
        let (app, _, meetings) = fixture(NamingScheme::Words).await;

        let request = Request::builder()
            .uri(CONFIG)
            .header(USER_ID_HEADER, "u1")
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["naming_scheme"], "words");

        meetings
            .set_user_config("u1", &UserConfig::new(NamingScheme::Uuid))
            .await
            .expect("store preference");

        let request = Request::builder()
            .uri(CONFIG)
            .header(USER_ID_HEADER, "u1")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["naming_scheme"], "uuid");
    }

    #[tokio::test]
    async fn config_without_identity_is_unauthorized() {
        let (app, _, _) = fixture(NamingScheme::Words).await;

        let request = Request::builder().uri(CONFIG).body(Body::empty()).expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn config_storage_failure_is_internal_error() {
        let (app, host, _) = fixture(NamingScheme::Words).await;
        host.fail(FailPoint::KvGet).await;

        let request = Request::builder()
            .uri(CONFIG)
            .header(USER_ID_HEADER, "u1")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn slash_command_with_wrong_token_is_unauthorized() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response = app
            .oneshot(form_post("token=wrong&command=%2Fgmeet&text=&channel_id=c1&user_id=u1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn slash_command_with_same_length_token_is_unauthorized() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response = app
            .oneshot(form_post(
                "token=command-secreT&command=%2Fgmeet&text=&channel_id=c1&user_id=u1",
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(host.posts().await.is_empty());
    }

    #[tokio::test]
    async fn slash_command_starts_meeting_with_topic() {
        let (app, host, _) = fixture(NamingScheme::Words).await;

        let response = app
            .oneshot(form_post(
                "token=command-secret&command=%2Fgmeet&text=start+Retro&channel_id=c1&user_id=u1",
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["response_type"], "ephemeral");

        let posts = host.posts().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].props["meeting_id"].as_str().expect("id").starts_with("Retro-"));
    }

    #[tokio::test]
    async fn unsupported_slash_command_is_bad_request() {
        let (app, _, _) = fixture(NamingScheme::Words).await;

        let response = app
            .oneshot(form_post("token=command-secret&command=%2Fzoom&channel_id=c1&user_id=u1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
