//! Payload items captured from the conversation API
//!
//! Only the fields convlog consumers read or scrub are modelled. Unknown
//! fields in a log are ignored on decode and are not written back.

use serde::{Deserialize, Serialize};

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// A single conversation message, either a channel message or a thread reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message type, usually `"message"`
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub msg_type: String,
    /// Client-generated message UUID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_msg_id: String,
    /// Author user ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Workspace ID of the author
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team: String,
    /// Message text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Message timestamp, unique within a channel
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ts: String,
    /// Timestamp of the thread parent, set on parents and replies
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thread_ts: String,
    /// Number of replies, set on thread parents
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reply_count: i64,
    /// Last edit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<Edited>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    /// Files shared with the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Link unfurls and bot attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Create a plain message with the given timestamp and text
    pub fn new(ts: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            msg_type: "message".to_string(),
            ts: ts.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the thread timestamp
    pub fn with_thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = thread_ts.into();
        self
    }

    /// Set the author
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Attach files
    pub fn with_files(mut self, files: Vec<File>) -> Self {
        self.files = files;
        self
    }

    /// True if this message starts a thread
    pub fn is_thread_parent(&self) -> bool {
        !self.thread_ts.is_empty() && self.thread_ts == self.ts
    }
}

/// Edit marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edited {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ts: String,
}

/// Emoji reaction on a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

/// Link unfurl or bot attachment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_url: String,
}

/// File metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filetype: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    /// Uploader user ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Creation time, unix seconds
    #[serde(default, skip_serializing_if = "is_zero")]
    pub created: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url_private: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url_private_download: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permalink: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permalink_public: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumb_64: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumb_360: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub thumb_360_w: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub thumb_360_h: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumb_720: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub thumb_720_w: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub thumb_720_h: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub original_w: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub original_h: i64,
}

impl File {
    /// Create file metadata with an ID and a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_omitted() {
        let msg = Message::new("123.456", "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"message","text":"hello","ts":"123.456"}"#);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"ts":"1.000001","text":"hi","blocks":[{"type":"rich_text"}],"is_starred":true}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.ts, "1.000001");
        assert_eq!(msg.text, "hi");
    }

    #[test]
    fn test_thread_parent() {
        let parent = Message::new("10.0", "p").with_thread_ts("10.0");
        let reply = Message::new("11.0", "r").with_thread_ts("10.0");
        assert!(parent.is_thread_parent());
        assert!(!reply.is_thread_parent());
        assert!(!Message::new("12.0", "x").is_thread_parent());
    }
}
