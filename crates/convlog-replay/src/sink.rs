//! Sink capability
//!
//! The consumer side of a replay: whatever takes pages of conversation data
//! as they are fetched. A [`Recorder`] is one, so replaying a log into a
//! recorder copies it.

use async_trait::async_trait;
use convlog_core::{File, Message};
use convlog_storage::Recorder;

use crate::error::SinkError;

/// Receiver of conversation pages
///
/// Implementations are called sequentially, in log order, by
/// [`replay`](crate::replay). The first error stops the replay.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Accept a page of channel messages
    ///
    /// # Arguments
    ///
    /// * `channel_id` - The channel the page belongs to
    /// * `messages` - The messages, oldest first as captured
    async fn messages(&self, channel_id: &str, messages: Vec<Message>) -> Result<(), SinkError>;

    /// Accept a page of thread replies
    ///
    /// # Arguments
    ///
    /// * `channel_id` - The channel the thread lives in
    /// * `parent` - The message that starts the thread
    /// * `messages` - The replies
    async fn thread_messages(
        &self,
        channel_id: &str,
        parent: Message,
        messages: Vec<Message>,
    ) -> Result<(), SinkError>;

    /// Accept a batch of file metadata
    ///
    /// # Arguments
    ///
    /// * `channel_id` - The channel the files were shared in
    /// * `parent` - The message the files are attached to
    /// * `is_thread` - True if `parent` is a thread reply
    /// * `files` - The file metadata
    async fn files(
        &self,
        channel_id: &str,
        parent: Message,
        is_thread: bool,
        files: Vec<File>,
    ) -> Result<(), SinkError>;

    /// Release the sink. Replay never calls this; the owner does.
    async fn close(&self) -> Result<(), SinkError>;
}

#[async_trait]
impl Sink for Recorder {
    async fn messages(&self, channel_id: &str, messages: Vec<Message>) -> Result<(), SinkError> {
        Ok(Recorder::messages(self, channel_id, messages).await?)
    }

    async fn thread_messages(
        &self,
        channel_id: &str,
        parent: Message,
        messages: Vec<Message>,
    ) -> Result<(), SinkError> {
        Ok(Recorder::thread_messages(self, channel_id, parent, messages).await?)
    }

    async fn files(
        &self,
        channel_id: &str,
        parent: Message,
        is_thread: bool,
        files: Vec<File>,
    ) -> Result<(), SinkError> {
        Ok(Recorder::files(self, channel_id, parent, is_thread, files).await?)
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(Recorder::close(self).await?)
    }
}
