//! Shapes of the RTM events and message attachments the harness inspects.
//!
//! Every field is optional: the bot and the platform own these payloads, so
//! decoding never rejects a well-formed object and assertions report what is
//! missing instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// One event read from the RTM feed.
pub struct SlackEvent {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// A user id on messages; a full user object on `user_change` and
    /// `team_join`. Read it through [`SlackEvent::user_id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// A channel id on messages; an object on `channel_created` and friends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackEvent {
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(id_of)
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().and_then(id_of)
    }

    pub fn is_message(&self) -> bool {
        self.event_type() == Some("message")
    }

    pub fn first_attachment(&self) -> Option<&Attachment> {
        self.attachments.as_ref().and_then(|items| items.first())
    }

    /// Decodes a raw RTM frame.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

fn id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id.as_str()),
        Value::Object(object) => object.get("id").and_then(Value::as_str),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<AttachmentField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Slack accepts fields with only a title or only a value.
pub struct AttachmentField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub short: bool,
}

impl AttachmentField {
    pub fn new(title: &str, value: &str, short: bool) -> Self {
        Self {
            title: Some(title.to_string()),
            value: Some(value.to_string()),
            short,
        }
    }
}
