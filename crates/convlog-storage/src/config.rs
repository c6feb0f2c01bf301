//! Recorder configuration

use serde::{Deserialize, Serialize};

/// Default number of records that may wait for the writer
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for a [`Recorder`](crate::Recorder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Capacity of the hand-off queue between producers and the writer.
    /// Producers wait once it is full.
    pub queue_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RecorderConfig {
    /// Set the hand-off queue capacity (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}
