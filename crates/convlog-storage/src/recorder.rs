//! Log recorder
//!
//! A [`Recorder`] owns the write side of a log. Producers hand records to a
//! single background writer task over a bounded queue; the writer appends
//! them in the order it receives them.
//!
//! The first write failure is latched. The writer stops and drops the queue,
//! and from then on every producer call and [`Recorder::close`] returns that
//! same error. Records still queued at that moment are lost; records written
//! before it stay in the log.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use convlog_core::{Event, File, Message};
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::encode_line;
use crate::config::RecorderConfig;
use crate::error::StorageError;
use crate::state::State;

/// Single-slot error cell. The earliest failure wins.
type Latch = Arc<OnceLock<StorageError>>;

/// Append-only writer for a log
pub struct Recorder {
    name: String,
    tx: Mutex<Option<mpsc::Sender<Event>>>,
    failure: Latch,
    writer: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<State>,
}

impl Recorder {
    /// Create (or truncate) the log at `path` and record into it.
    ///
    /// Must be called within a tokio runtime.
    pub async fn create(
        path: impl AsRef<Path>,
        config: RecorderConfig,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = tokio::fs::File::create(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(path = %path.display(), "Recording log");
        Ok(Self::with_name(file, name, config))
    }

    /// Record into an unnamed writer with the default configuration.
    ///
    /// Must be called within a tokio runtime.
    pub fn new<W>(w: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_name(w, "", RecorderConfig::default())
    }

    /// Record into `w`. `name` tags the in-process state.
    ///
    /// Must be called within a tokio runtime.
    pub fn with_name<W>(w: W, name: impl Into<String>, config: RecorderConfig) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let failure = Latch::default();
        let writer = tokio::spawn(run_writer(w, rx, failure.clone()));
        Self {
            state: Mutex::new(State::new(name.clone())),
            name,
            tx: Mutex::new(Some(tx)),
            failure,
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The latched write failure, if any
    pub fn failure(&self) -> Option<StorageError> {
        self.failure.get().cloned()
    }

    /// Snapshot of the watermarks of everything queued so far.
    ///
    /// Not authoritative: records queued but lost to a later write failure
    /// are included. Replay the finished log for the real state.
    pub fn state(&self) -> State {
        self.state.lock().clone()
    }

    /// Queue a page of channel messages
    pub async fn messages(
        &self,
        channel_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), StorageError> {
        self.append(Event::messages(channel_id, messages)).await
    }

    /// Queue a page of thread replies
    pub async fn thread_messages(
        &self,
        channel_id: &str,
        parent: Message,
        messages: Vec<Message>,
    ) -> Result<(), StorageError> {
        self.append(Event::thread_messages(channel_id, parent, messages))
            .await
    }

    /// Queue a batch of files attached to `parent`
    pub async fn files(
        &self,
        channel_id: &str,
        parent: Message,
        is_thread: bool,
        files: Vec<File>,
    ) -> Result<(), StorageError> {
        self.append(Event::files(channel_id, parent, is_thread, files))
            .await
    }

    /// Queue a record.
    ///
    /// Waits while the queue is full. Returns the latched failure instead of
    /// queuing once the writer has failed, and [`StorageError::Closed`] after
    /// [`Recorder::close`].
    pub async fn append(&self, event: Event) -> Result<(), StorageError> {
        if let Some(err) = self.failure.get() {
            return Err(err.clone());
        }
        let tx = self.tx.lock().clone().ok_or(StorageError::Closed)?;

        // The writer drops the receiver right after latching a failure,
        // which wakes any producer blocked here.
        let permit = match tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => return Err(self.failure().unwrap_or(StorageError::Closed)),
        };
        // A permit can be granted after the writer latched a failure but
        // before it dropped the queue. Such a record would never be written.
        if let Some(err) = self.failure.get() {
            drop(permit);
            return Err(err.clone());
        }
        self.state.lock().add_event(&event);
        debug!(id = %event.id(), count = event.count, "Queued record");
        permit.send(event);
        Ok(())
    }

    /// Stop accepting records, wait for the writer to drain, and return the
    /// latched failure if there was one. Safe to call more than once.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn close(&self) -> Result<(), StorageError> {
        drop(self.tx.lock().take());

        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                let _ = self
                    .failure
                    .set(StorageError::Io(format!("writer task failed: {e}")));
            }
            debug!("Recorder closed");
        }
        match self.failure.get() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

async fn run_writer<W>(mut w: W, mut rx: mpsc::Receiver<Event>, failure: Latch)
where
    W: AsyncWrite + Unpin,
{
    let mut written: u64 = 0;
    while let Some(event) = rx.recv().await {
        if let Err(err) = write_event(&mut w, &event).await {
            error!(error = %err, id = %event.id(), written, "Write failed, recorder stopped");
            if failure.set(err).is_err() {
                warn!("Write failure already latched");
            }
            break;
        }
        written += 1;
    }
    // Stop taking records before flushing so blocked producers are released.
    drop(rx);

    if let Err(e) = w.flush().await {
        let _ = failure.set(StorageError::from(e));
    }
    debug!(written, "Writer finished");
}

async fn write_event<W>(w: &mut W, event: &Event) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_line(event)?;
    w.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll, Waker};

    /// In-memory writer that fails every write after the first `ok_writes`
    #[derive(Clone, Default)]
    struct TestWriter {
        buf: Arc<Mutex<Vec<u8>>>,
        ok_writes: Option<usize>,
        writes: Arc<Mutex<usize>>,
    }

    impl TestWriter {
        fn failing_after(n: usize) -> Self {
            Self {
                ok_writes: Some(n),
                ..Default::default()
            }
        }

        fn contents(&self) -> Vec<u8> {
            self.buf.lock().clone()
        }
    }

    impl AsyncWrite for TestWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            data: &[u8],
        ) -> Poll<io::Result<usize>> {
            let mut writes = self.writes.lock();
            if self.ok_writes.is_some_and(|n| *writes >= n) {
                return Poll::Ready(Err(io::Error::other("disk full")));
            }
            *writes += 1;
            self.buf.lock().extend_from_slice(data);
            Poll::Ready(Ok(data.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_record() {
        let w = TestWriter::default();
        let rec = Recorder::new(w.clone());
        rec.messages("C123", vec![Message::new("1.0", "hello")])
            .await
            .unwrap();
        rec.close().await.unwrap();

        let out = String::from_utf8(w.contents()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with('\n'));
        let ev: Event = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(ev.channel_id, "C123");
        assert_eq!(ev.messages[0].text, "hello");
    }

    #[tokio::test]
    async fn test_close_without_records() {
        let w = TestWriter::default();
        let rec = Recorder::new(w.clone());
        rec.close().await.unwrap();
        assert!(w.contents().is_empty());
    }

    #[tokio::test]
    async fn test_append_after_close() {
        let rec = Recorder::new(TestWriter::default());
        rec.close().await.unwrap();
        let err = rec.messages("C1", vec![]).await.unwrap_err();
        assert_eq!(err, StorageError::Closed);
        rec.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let rec = Recorder::new(TestWriter::failing_after(0));
        rec.messages("C1", vec![]).await.unwrap();

        while rec.failure().is_none() {
            tokio::task::yield_now().await;
        }
        let first = rec.messages("C1", vec![]).await.unwrap_err();
        let second = rec.messages("C2", vec![]).await.unwrap_err();
        assert!(matches!(first, StorageError::Io(_)));
        assert_eq!(first, second);
        assert_eq!(rec.close().await.unwrap_err(), first);
        assert_eq!(rec.close().await.unwrap_err(), first);
    }

    /// Writer whose writes stay pending until the gate is opened
    #[derive(Clone, Default)]
    struct GatedWriter {
        open: Arc<AtomicBool>,
        waker: Arc<Mutex<Option<Waker>>>,
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl GatedWriter {
        fn open(&self) {
            self.open.store(true, Ordering::SeqCst);
            if let Some(waker) = self.waker.lock().take() {
                waker.wake();
            }
        }
    }

    impl AsyncWrite for GatedWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            data: &[u8],
        ) -> Poll<io::Result<usize>> {
            if !self.open.load(Ordering::SeqCst) {
                *self.waker.lock() = Some(cx.waker().clone());
                return Poll::Pending;
            }
            self.buf.lock().extend_from_slice(data);
            Poll::Ready(Ok(data.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_permit_granted_after_failure_is_refused() {
        let w = GatedWriter::default();
        let rec = Arc::new(Recorder::with_name(
            w.clone(),
            "",
            RecorderConfig::default().with_queue_capacity(1),
        ));
        // One record held by the stalled writer, one filling the queue
        rec.messages("C1", vec![]).await.unwrap();
        rec.messages("C2", vec![]).await.unwrap();

        let blocked = tokio::spawn({
            let rec = rec.clone();
            async move { rec.messages("C3", vec![]).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!blocked.is_finished());

        // Latched while the producer waits for a slot and the queue is open
        let latched = StorageError::Io("disk full".into());
        rec.failure.set(latched.clone()).unwrap();
        w.open();

        assert_eq!(blocked.await.unwrap().unwrap_err(), latched);
        assert_eq!(rec.close().await.unwrap_err(), latched);
        let out = String::from_utf8(w.buf.lock().clone()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(!out.contains("C3"));
    }

    #[tokio::test]
    async fn test_state_tracks_queued_records() {
        let rec = Recorder::with_name(
            TestWriter::default(),
            "capture.jsonl",
            RecorderConfig::default(),
        );
        let parent = Message::new("10.0", "p").with_thread_ts("10.0");
        let page = vec![Message::new("10.0", "p"), Message::new("12.0", "q")];
        rec.messages("C1", page).await.unwrap();
        rec.thread_messages("C1", parent.clone(), vec![Message::new("11.0", "r")])
            .await
            .unwrap();
        rec.files("C1", parent, true, vec![File::new("F1", "a.png")])
            .await
            .unwrap();

        let state = rec.state();
        assert_eq!(state.log_filename, "capture.jsonl");
        assert_eq!(state.latest_channel_ts("C1").as_deref(), Some("12.000000"));
        assert_eq!(
            state.latest_thread_ts("C1", "10.0").as_deref(),
            Some("11.000000")
        );
        assert!(state.has_file("C1", "F1"));
        rec.close().await.unwrap();
    }
}
