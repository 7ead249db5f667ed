use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use gmeet_core::domain::meeting::{MeetingChoiceContext, MeetingRequest};
use gmeet_core::meetings::StartIntent;
use gmeet_core::naming;

/// Body of a direct `POST /meetings` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DirectStartRequest {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub personal: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub meeting_id: String,
    #[serde(default)]
    pub root_id: String,
}

/// Body sent by the chat server when a button on an ask prompt is clicked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ActionStartRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub context: Option<MeetingChoiceContext>,
}

impl ActionStartRequest {
    /// Only interactive callbacks carry a context or the prompt's post id.
    fn is_interactive(&self) -> bool {
        self.context.is_some() || !self.post_id.is_empty()
    }
}

/// Replacement for the prompt a button was clicked on. The chat server applies
/// the `update` of an action response to the source post.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PromptUpdate {
    pub message: String,
    pub props: Map<String, Value>,
}

impl PromptUpdate {
    /// Empty props drop the prompt's attachment and its buttons.
    pub fn answered(message: impl Into<String>) -> Self {
        Self { message: message.into(), props: Map::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartRequest {
    Direct(DirectStartRequest),
    Action(ActionStartRequest),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestParseError {
    #[error("body matches neither start request shape: {0}")]
    Malformed(String),
    #[error("meeting id `{0}` cannot be used in a join link")]
    InvalidMeetingId(String),
}

/// Decodes a start request body.
///
/// Both shapes are attempted. An interactive callback wins when it carries a
/// context or a post id; otherwise a direct body wins, and a bare action body
/// is the last resort.
pub fn parse_start_request(body: &[u8]) -> Result<StartRequest, RequestParseError> {
    let action = serde_json::from_slice::<ActionStartRequest>(body);
    let direct = serde_json::from_slice::<DirectStartRequest>(body);

    let request = match (action, direct) {
        (Ok(action), _) if action.is_interactive() => StartRequest::Action(action),
        (_, Ok(direct)) => StartRequest::Direct(direct),
        (Ok(action), Err(_)) => StartRequest::Action(action),
        (Err(error), Err(_)) => return Err(RequestParseError::Malformed(error.to_string())),
    };

    if let Some(meeting_id) = request.explicit_meeting_id() {
        if !naming::is_valid_meeting_id(meeting_id) {
            return Err(RequestParseError::InvalidMeetingId(meeting_id.to_owned()));
        }
    }
    Ok(request)
}

impl StartRequest {
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Direct(direct) => &direct.channel_id,
            Self::Action(action) => &action.channel_id,
        }
    }

    /// User id and action token echoed back by a button callback.
    pub fn action_credentials(&self) -> Option<(&str, &str)> {
        match self {
            Self::Action(action) if !action.user_id.is_empty() => action
                .context
                .as_ref()
                .map(|context| (action.user_id.as_str(), context.action_token.as_str())),
            _ => None,
        }
    }

    fn explicit_meeting_id(&self) -> Option<&str> {
        let meeting_id = match self {
            Self::Direct(direct) => direct.meeting_id.as_str(),
            Self::Action(action) => {
                action.context.as_ref().map(|context| context.meeting_id.as_str()).unwrap_or("")
            }
        };
        (!meeting_id.is_empty()).then_some(meeting_id)
    }

    pub fn into_intent(self) -> StartIntent {
        match self {
            Self::Direct(direct) => StartIntent::Fresh(MeetingRequest {
                meeting_id: Some(direct.meeting_id),
                topic: Some(direct.topic),
                personal: direct.personal,
                root_id: Some(direct.root_id),
            }),
            Self::Action(action) if !action.post_id.is_empty() => StartIntent::Choice {
                prompt_post_id: action.post_id,
                context: action.context.unwrap_or_default(),
            },
            Self::Action(action) => {
                StartIntent::Fresh(action.context.map(MeetingRequest::from).unwrap_or_default())
            }
        }
    }
}

/// Older clients send the meeting id as a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(value) => Ok(value),
        Value::Number(value) if value.as_u64() == Some(0) => Ok(String::new()),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for meeting_id, got {other}"
        ))),
    }
}
