//! Watermark state
//!
//! Records, per conversation, how far a capture got: the newest message
//! timestamp per channel and per thread, and which files were seen. A later
//! run reads it to resume without fetching the same pages again.
//!
//! The authoritative state of a log is the one built by
//! [`Player::state`](crate::Player::state). The copy a
//! [`Recorder`](crate::Recorder) keeps while writing is a convenience.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use convlog_core::{Event, EventType, micros_to_ts, ts_to_micros};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::StorageError;

/// Version written to, and required from, state documents
pub const STATE_VERSION: f64 = 0.1;

/// Suffix appended to a log filename to name its state document
pub const SIDECAR_SUFFIX: &str = ".state";

/// Watermarks captured from a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub version: f64,
    /// Base filename of the log this state describes. May be empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_filename: String,
    /// Set once the whole log has been folded in
    #[serde(default)]
    pub is_complete: bool,
    /// Channel ID to newest message timestamp, in microseconds
    #[serde(default)]
    pub channels: BTreeMap<String, i64>,
    /// `"channel:thread_ts"` to newest reply timestamp, in microseconds
    #[serde(default)]
    pub threads: BTreeMap<String, i64>,
    /// Channel ID to the IDs of files seen in it
    #[serde(default)]
    pub files: BTreeMap<String, BTreeSet<String>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new("")
    }
}

impl State {
    /// Create an empty state for the named log
    pub fn new(log_filename: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            log_filename: log_filename.into(),
            is_complete: false,
            channels: BTreeMap::new(),
            threads: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Fold in a channel message timestamp. Malformed timestamps are ignored.
    pub fn add_message(&mut self, channel_id: &str, ts: &str) {
        ts_update(&mut self.channels, channel_id, ts);
    }

    /// Fold in a thread reply timestamp
    pub fn add_thread(&mut self, channel_id: &str, thread_ts: &str, ts: &str) {
        ts_update(&mut self.threads, &thread_key(channel_id, thread_ts), ts);
    }

    /// Record a file as seen in a channel
    pub fn add_file(&mut self, channel_id: &str, file_id: &str) {
        self.files
            .entry(channel_id.to_string())
            .or_default()
            .insert(file_id.to_string());
    }

    /// Fold in every item of a record
    pub fn add_event(&mut self, ev: &Event) {
        match ev.event_type {
            EventType::Messages => {
                for m in &ev.messages {
                    self.add_message(&ev.channel_id, &m.ts);
                }
            }
            EventType::ThreadMessages => {
                let thread_ts = ev.parent.as_ref().map_or("", |p| p.thread_ts.as_str());
                for m in &ev.messages {
                    self.add_thread(&ev.channel_id, thread_ts, &m.ts);
                }
            }
            EventType::Files => {
                for f in &ev.files {
                    self.add_file(&ev.channel_id, &f.id);
                }
            }
            EventType::Unknown(_) => {}
        }
    }

    /// True if at least one message was seen in the channel
    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }

    /// True if at least one reply was seen in the thread
    pub fn has_thread(&self, channel_id: &str, thread_ts: &str) -> bool {
        self.threads.contains_key(&thread_key(channel_id, thread_ts))
    }

    /// True if the file was seen in the channel
    pub fn has_file(&self, channel_id: &str, file_id: &str) -> bool {
        self.files
            .get(channel_id)
            .is_some_and(|ids| ids.contains(file_id))
    }

    /// Newest known message timestamp in the channel
    pub fn latest_channel_ts(&self, channel_id: &str) -> Option<String> {
        self.channels.get(channel_id).copied().map(micros_to_ts)
    }

    /// Newest known reply timestamp in the thread
    pub fn latest_thread_ts(&self, channel_id: &str, thread_ts: &str) -> Option<String> {
        self.threads
            .get(&thread_key(channel_id, thread_ts))
            .copied()
            .map(micros_to_ts)
    }

    /// IDs of files seen in the channel, sorted
    pub fn files_for(&self, channel_id: &str) -> Vec<String> {
        self.files
            .get(channel_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Mark the state as covering the whole log
    pub fn set_complete(&mut self, complete: bool) -> &mut Self {
        self.is_complete = complete;
        self
    }

    /// Fold another state into this one, keeping the higher watermark
    pub fn merge(&mut self, other: &State) {
        for (k, v) in &other.channels {
            max_update(&mut self.channels, k, *v);
        }
        for (k, v) in &other.threads {
            max_update(&mut self.threads, k, *v);
        }
        for (k, ids) in &other.files {
            self.files
                .entry(k.clone())
                .or_default()
                .extend(ids.iter().cloned());
        }
    }

    /// Write the state as a JSON document
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        std::fs::write(path, data)?;
        debug!(path = %path.display(), channels = self.channels.len(), "Saved state");
        Ok(())
    }

    /// Read a state document written by [`State::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data = std::fs::read(path.as_ref())?;
        let state: State = serde_json::from_slice(&data)
            .map_err(|e| StorageError::deserialization(e.column() as u64, e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(StorageError::StateVersion {
                expected: STATE_VERSION,
                actual: state.version,
            });
        }
        Ok(state)
    }
}

/// Path of the state document that belongs to a log
pub fn sidecar_path(log_path: impl AsRef<Path>) -> PathBuf {
    let mut s = log_path.as_ref().as_os_str().to_owned();
    s.push(SIDECAR_SUFFIX);
    PathBuf::from(s)
}

fn thread_key(channel_id: &str, thread_ts: &str) -> String {
    format!("{channel_id}:{thread_ts}")
}

fn ts_update(m: &mut BTreeMap<String, i64>, key: &str, ts: &str) {
    match ts_to_micros(ts) {
        Ok(v) => max_update(m, key, v),
        Err(e) => trace!(key, ts, error = %e, "Skipping malformed timestamp"),
    }
}

fn max_update(m: &mut BTreeMap<String, i64>, key: &str, v: i64) {
    match m.get_mut(key) {
        Some(cur) if *cur >= v => {}
        Some(cur) => *cur = v,
        None => {
            m.insert(key.to_string(), v);
        }
    }
}
