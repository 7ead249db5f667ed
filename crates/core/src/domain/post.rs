use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::meeting::MeetingChoiceContext;

pub const MEETING_POST_TYPE: &str = "custom_gmeet_post_type";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Post {
    pub fn attachments(&self) -> Vec<Attachment> {
        self.props
            .get("attachments")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<PostAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAction {
    pub name: String,
    pub integration: PostActionIntegration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostActionIntegration {
    pub url: String,
    pub context: MeetingChoiceContext,
}

impl PostAction {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        context: MeetingChoiceContext,
    ) -> Self {
        Self { name: name.into(), integration: PostActionIntegration { url: url.into(), context } }
    }
}

pub struct AttachmentBuilder {
    attachment: Attachment,
}

impl AttachmentBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self { attachment: Attachment { title: title.into(), ..Attachment::default() } }
    }

    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.attachment.fallback = fallback.into();
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.attachment.text = text.into();
        self
    }

    pub fn action(mut self, action: PostAction) -> Self {
        self.attachment.actions.push(action);
        self
    }

    pub fn build(self) -> Attachment {
        self.attachment
    }
}

pub struct PostBuilder {
    post: Post,
}

impl PostBuilder {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            post: Post { user_id: user_id.into(), channel_id: channel_id.into(), ..Post::default() },
        }
    }

    pub fn root_id(mut self, root_id: Option<&str>) -> Self {
        self.post.root_id = root_id.unwrap_or_default().to_owned();
        self
    }

    pub fn post_type(mut self, post_type: impl Into<String>) -> Self {
        self.post.post_type = post_type.into();
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        let mut attachments = self.post.attachments();
        attachments.push(attachment);
        let encoded = serde_json::to_value(attachments).unwrap_or(Value::Array(Vec::new()));
        self.post.props.insert("attachments".to_owned(), encoded);
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.post.props.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Post {
        self.post
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AttachmentBuilder, PostAction, PostBuilder};
    use crate::domain::meeting::MeetingChoiceContext;

    #[test]
    fn builder_embeds_attachments_and_props() {
        let post = PostBuilder::new("u1", "c1")
            .root_id(Some("root-1"))
            .post_type("custom_gmeet_post_type")
            .attachment(AttachmentBuilder::new("Standup").text("body").fallback("fb").build())
            .prop("meeting_id", "abc")
            .prop("meeting_personal", false)
            .build();

        assert_eq!(post.root_id, "root-1");
        assert_eq!(post.props["meeting_id"], json!("abc"));
        assert_eq!(post.props["meeting_personal"], json!(false));
        let attachments = post.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].title, "Standup");
        assert_eq!(attachments[0].fallback, "fb");
    }

    #[test]
    fn action_context_serializes_as_integration_payload() {
        let attachment = AttachmentBuilder::new("Pick one")
            .action(PostAction::new(
                "UUID",
                "http://127.0.0.1:8065/plugins/gmeet/api/v1/meetings",
                MeetingChoiceContext {
                    meeting_id: "m-1".to_owned(),
                    meeting_topic: "Topic".to_owned(),
                    personal: false,
                    root_id: String::new(),
                    action_token: "signed".to_owned(),
                },
            ))
            .build();

        let value = serde_json::to_value(&attachment).expect("serialize");
        assert_eq!(value["actions"][0]["integration"]["context"]["meeting_id"], json!("m-1"));
        assert_eq!(value["actions"][0]["integration"]["context"]["personal"], json!(false));
        assert_eq!(value["actions"][0]["integration"]["context"]["action_token"], json!("signed"));
    }

    #[test]
    fn empty_root_id_is_not_serialized() {
        let post = PostBuilder::new("u1", "c1").root_id(None).build();
        let value = serde_json::to_value(&post).expect("serialize");
        assert!(value.get("root_id").is_none());
    }
}
