use serde::{Deserialize, Serialize};

/// What a caller asked for. Empty strings and `None` are treated alike.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeetingRequest {
    pub meeting_id: Option<String>,
    pub topic: Option<String>,
    pub personal: bool,
    pub root_id: Option<String>,
}

impl MeetingRequest {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self { topic: Some(topic.into()), ..Self::default() }
    }

    pub fn explicit_meeting_id(&self) -> Option<&str> {
        non_empty(self.meeting_id.as_deref())
    }

    pub fn explicit_topic(&self) -> Option<&str> {
        non_empty(self.topic.as_deref())
    }

    pub fn thread_root(&self) -> Option<&str> {
        non_empty(self.root_id.as_deref())
    }
}

/// Pre-computed choice carried by an ask-prompt button.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingChoiceContext {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub meeting_topic: String,
    #[serde(default)]
    pub personal: bool,
    #[serde(default)]
    pub root_id: String,
    /// Proves the callback came from a prompt this service sent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_token: String,
}

impl From<MeetingChoiceContext> for MeetingRequest {
    fn from(context: MeetingChoiceContext) -> Self {
        Self {
            meeting_id: Some(context.meeting_id),
            topic: Some(context.meeting_topic),
            personal: context.personal,
            root_id: Some(context.root_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MeetingAnnouncement {
    pub meeting_id: String,
    /// Topic chosen for the meeting, empty when none was derived.
    pub topic: String,
    pub personal: bool,
    pub join_url: String,
    pub default_topic: String,
}

impl MeetingAnnouncement {
    pub fn title(&self) -> &str {
        if self.topic.is_empty() {
            &self.default_topic
        } else {
            &self.topic
        }
    }

    /// Topic recorded on the post; falls back to the identifier.
    pub fn stored_topic(&self) -> &str {
        if self.topic.is_empty() {
            &self.meeting_id
        } else {
            &self.topic
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { meeting_id: String },
    Prompted,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{MeetingAnnouncement, MeetingChoiceContext, MeetingRequest};

    #[test]
    fn empty_strings_count_as_absent() {
        let request = MeetingRequest {
            meeting_id: Some(String::new()),
            topic: Some(String::new()),
            personal: false,
            root_id: Some(String::new()),
        };
        assert_eq!(request.explicit_meeting_id(), None);
        assert_eq!(request.explicit_topic(), None);
        assert_eq!(request.thread_root(), None);
    }

    #[test]
    fn choice_context_becomes_explicit_request() {
        let request = MeetingRequest::from(MeetingChoiceContext {
            meeting_id: "brave-sunny-otter".to_owned(),
            meeting_topic: "brave-sunny-otter".to_owned(),
            personal: true,
            root_id: "r1".to_owned(),
            ..MeetingChoiceContext::default()
        });
        assert_eq!(request.explicit_meeting_id(), Some("brave-sunny-otter"));
        assert!(request.personal);
        assert_eq!(request.thread_root(), Some("r1"));
    }

    #[test]
    fn title_and_stored_topic_fall_back_differently() {
        let announcement = MeetingAnnouncement {
            meeting_id: "brave-sunny-otter".to_owned(),
            topic: String::new(),
            personal: false,
            join_url: "https://g.co/meet/brave-sunny-otter".to_owned(),
            default_topic: "Google Meeting".to_owned(),
        };
        assert_eq!(announcement.title(), "Google Meeting");
        assert_eq!(announcement.stored_topic(), "brave-sunny-otter");
    }
}
