//! Log records
//!
//! One [`Event`] is written per line of a log. Field names are kept short
//! since every line repeats them.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::message::{File, Message};

/// Kind of a log record
///
/// Encoded as an integer. Kinds added by newer writers decode as
/// [`EventType::Unknown`] and are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum EventType {
    /// A page of channel messages
    Messages,
    /// A page of thread replies
    ThreadMessages,
    /// A batch of file metadata attached to a message
    Files,
    /// Any other kind
    Unknown(i64),
}

impl From<i64> for EventType {
    fn from(v: i64) -> Self {
        match v {
            0 => Self::Messages,
            1 => Self::ThreadMessages,
            2 => Self::Files,
            other => Self::Unknown(other),
        }
    }
}

impl From<EventType> for i64 {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Messages => 0,
            EventType::ThreadMessages => 1,
            EventType::Files => 2,
            EventType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages => write!(f, "messages"),
            Self::ThreadMessages => write!(f, "thread_messages"),
            Self::Files => write!(f, "files"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// One captured page of conversation data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_t")]
    pub event_type: EventType,
    /// Capture time in unix nanoseconds. Informational only: the position
    /// in the log is the order.
    #[serde(rename = "_ts", default)]
    pub recorded_at: i64,
    /// Channel the page belongs to
    #[serde(rename = "_id")]
    pub channel_id: String,
    /// Set when the page was produced while walking a thread
    #[serde(rename = "_tm", default, skip_serializing_if = "is_false")]
    pub is_thread_message: bool,
    /// Number of payload items
    #[serde(rename = "_c", default)]
    pub count: usize,
    /// Thread parent, or the message the files belong to
    #[serde(rename = "_p", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Message>,
    #[serde(rename = "_m", default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(rename = "_f", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
}

impl Event {
    /// A page of channel messages, stamped with the current time
    pub fn messages(channel_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            event_type: EventType::Messages,
            recorded_at: now_nanos(),
            channel_id: channel_id.into(),
            is_thread_message: false,
            count: messages.len(),
            parent: None,
            messages,
            files: Vec::new(),
        }
    }

    /// A page of thread replies under `parent`
    pub fn thread_messages(
        channel_id: impl Into<String>,
        parent: Message,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            event_type: EventType::ThreadMessages,
            recorded_at: now_nanos(),
            channel_id: channel_id.into(),
            is_thread_message: true,
            count: messages.len(),
            parent: Some(parent),
            messages,
            files: Vec::new(),
        }
    }

    /// A batch of files attached to `parent`
    pub fn files(
        channel_id: impl Into<String>,
        parent: Message,
        is_thread: bool,
        files: Vec<File>,
    ) -> Self {
        Self {
            event_type: EventType::Files,
            recorded_at: now_nanos(),
            channel_id: channel_id.into(),
            is_thread_message: is_thread,
            count: files.len(),
            parent: Some(parent),
            messages: Vec::new(),
            files,
        }
    }

    /// Identity used to group records in an index.
    ///
    /// Never fails: a record of unknown kind maps to a placeholder, and a
    /// missing parent contributes an empty timestamp.
    pub fn id(&self) -> String {
        match self.event_type {
            EventType::Messages => self.channel_id.clone(),
            EventType::ThreadMessages => thread_id(
                &self.channel_id,
                self.parent.as_ref().map_or("", |p| p.thread_ts.as_str()),
            ),
            EventType::Files => file_id(
                &self.channel_id,
                self.parent.as_ref().map_or("", |p| p.ts.as_str()),
            ),
            EventType::Unknown(v) => format!("<unknown:{v}>"),
        }
    }
}

/// Identity of a thread's reply pages
pub fn thread_id(channel_id: &str, thread_ts: &str) -> String {
    format!("t{channel_id}:{thread_ts}")
}

/// Identity of the file batches attached to a message
pub fn file_id(channel_id: &str, ts: &str) -> String {
    format!("f{channel_id}:{ts}")
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
