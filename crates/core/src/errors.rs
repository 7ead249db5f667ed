use thiserror::Error;

use crate::host::HostError;

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("user lookup failed: {0}")]
    UserLookup(#[source] HostError),
    #[error("user `{user_id}` is not a member of channel `{channel_id}`")]
    NotChannelMember { channel_id: String, user_id: String },
    #[error("channel lookup failed: {0}")]
    ChannelLookup(#[source] HostError),
    #[error("team lookup failed: {0}")]
    TeamLookup(#[source] HostError),
    #[error("post creation failed: {0}")]
    CreatePost(#[source] HostError),
    #[error("ephemeral post failed: {0}")]
    EphemeralPost(#[source] HostError),
    #[error("user config storage failed: {0}")]
    Storage(#[source] HostError),
    #[error("user config encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("missing caller identity")]
    Unauthenticated,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error(transparent)]
    Meeting(#[from] MeetingError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Not authorized",
            Self::Forbidden { .. } => "Forbidden",
            Self::BadRequest { .. } => "Unable to decode your request",
            Self::Internal { .. } => "Internal error",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Unauthenticated => {
                Self::Unauthorized { message: "missing caller identity".to_owned(), correlation_id }
            }
            ApplicationError::MalformedRequest(message) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Meeting(
                error @ (MeetingError::UserLookup(_)
                | MeetingError::NotChannelMember { .. }
                | MeetingError::ChannelLookup(_)),
            ) => Self::Forbidden { message: error.to_string(), correlation_id },
            ApplicationError::Meeting(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
        }
    }
}

impl From<MeetingError> for InterfaceError {
    fn from(value: MeetingError) -> Self {
        ApplicationError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError, MeetingError};
    use crate::host::HostError;

    #[test]
    fn missing_identity_maps_to_unauthorized() {
        let interface = ApplicationError::Unauthenticated.into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Unauthorized { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "Not authorized");
    }

    #[test]
    fn membership_and_lookup_failures_map_to_forbidden() {
        let not_member = ApplicationError::from(MeetingError::NotChannelMember {
            channel_id: "c1".to_owned(),
            user_id: "u1".to_owned(),
        })
        .into_interface("req-2");
        assert!(matches!(not_member, InterfaceError::Forbidden { .. }));

        let missing_user =
            ApplicationError::from(MeetingError::UserLookup(HostError::not_found("user", "u1")))
                .into_interface("req-3");
        assert!(matches!(missing_user, InterfaceError::Forbidden { .. }));
        assert_eq!(missing_user.user_message(), "Forbidden");
    }

    #[test]
    fn malformed_body_maps_to_bad_request() {
        let interface =
            ApplicationError::MalformedRequest("expected object".to_owned()).into_interface("req-4");
        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.user_message(), "Unable to decode your request");
    }

    #[test]
    fn host_failures_map_to_internal_without_leaking_detail() {
        let interface = ApplicationError::from(MeetingError::TeamLookup(HostError::Transport(
            "connection reset by peer".to_owned(),
        )))
        .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "Internal error");
        assert_eq!(interface.correlation_id(), "req-5");
    }
}
