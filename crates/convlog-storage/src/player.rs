//! Log player
//!
//! Indexes a log once, then serves its records either one identity at a time
//! ([`Player::next`]) or as a full sequential replay ([`Player::for_each`]).
//!
//! A player owns its stream and is not safe for concurrent use: callers that
//! share one must serialize access themselves, or open independent players.
//! Only the last-read offset is observable from other threads, through
//! [`Player::offset_handle`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use convlog_core::{Event, File as FileItem, Message, file_id, thread_id};
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::LineDecoder;
use crate::error::StorageError;
use crate::state::State;

/// Identity to the ascending offsets of its records
type Index = HashMap<String, Vec<u64>>;

/// Identity to the position of the next unread offset in its index entry
type Cursors = HashMap<String, usize>;

/// Shared view of a player's last-read offset
#[derive(Debug, Clone, Default)]
pub struct OffsetHandle(Arc<AtomicU64>);

impl OffsetHandle {
    /// Byte offset of the record read last
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, offset: u64) {
        self.0.store(offset, Ordering::Release);
    }
}

/// Random-access reader over a log
pub struct Player<R> {
    rs: R,
    name: String,
    idx: Index,
    cursors: Cursors,
    records: usize,
    last_offset: OffsetHandle,
}

impl Player<File> {
    /// Open and index the log at `path`. The player is named after the
    /// file's base name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::with_name(file, name)
    }
}

impl<R: Read + Seek> Player<R> {
    /// Index an unnamed log
    pub fn new(rs: R) -> Result<Self, StorageError> {
        Self::with_name(rs, "")
    }

    /// Index a log, naming it for diagnostics and for the state it builds.
    ///
    /// The whole stream is scanned from the start. A malformed record fails
    /// construction: no partial index is ever returned.
    #[instrument(skip_all)]
    pub fn with_name(mut rs: R, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();

        rs.seek(SeekFrom::Start(0))?;
        let (idx, records) = index_records(&mut rs)?;
        rs.seek(SeekFrom::Start(0))?;

        info!(name = %name, records, identities = idx.len(), "Indexed log");
        Ok(Self {
            rs,
            name,
            idx,
            cursors: Cursors::new(),
            records,
            last_offset: OffsetHandle::default(),
        })
    }

    /// Name given at construction, empty if none
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of records in the log, nil records included
    pub fn len(&self) -> usize {
        self.records
    }

    /// True if the log has no records
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// All identities seen while indexing, sorted
    pub fn identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.idx.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Offsets of the records of `id`, in log order
    pub fn offsets(&self, id: &str) -> Option<&[u64]> {
        self.idx.get(id).map(Vec::as_slice)
    }

    /// Offset of the record read last
    pub fn offset(&self) -> u64 {
        self.last_offset.get()
    }

    /// Cloneable observer of the last-read offset
    pub fn offset_handle(&self) -> OffsetHandle {
        self.last_offset.clone()
    }

    /// Read the next unread record of `id`.
    ///
    /// Fails with [`StorageError::NotFound`] if `id` was never recorded and
    /// with [`StorageError::Exhausted`] once every record of `id` was read.
    pub fn next(&mut self, id: &str) -> Result<Event, StorageError> {
        let offsets = self.idx.get(id).ok_or_else(|| StorageError::not_found(id))?;
        let ptr = self.cursors.get(id).copied().unwrap_or(0);
        let offset = *offsets
            .get(ptr)
            .ok_or_else(|| StorageError::exhausted(id))?;

        self.last_offset.set(offset);
        let event = self.read_at(offset)?;
        *self.cursors.entry(id.to_string()).or_insert(0) += 1;

        trace!(id, offset, cursor = ptr + 1, "Read record");
        Ok(event)
    }

    /// True if `next(id)` would return a record
    pub fn has_more(&self, id: &str) -> bool {
        let Some(offsets) = self.idx.get(id) else {
            return false;
        };
        match self.cursors.get(id) {
            None => true,
            Some(&ptr) => ptr < offsets.len(),
        }
    }

    /// Next page of channel messages
    pub fn messages(&mut self, channel_id: &str) -> Result<Vec<Message>, StorageError> {
        self.next(channel_id).map(|e| e.messages)
    }

    /// True if more channel message pages remain
    pub fn has_more_messages(&self, channel_id: &str) -> bool {
        self.has_more(channel_id)
    }

    /// Next page of replies in a thread
    pub fn thread(
        &mut self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<Message>, StorageError> {
        self.next(&thread_id(channel_id, thread_ts)).map(|e| e.messages)
    }

    /// True if more reply pages remain in the thread
    pub fn has_more_threads(&self, channel_id: &str, thread_ts: &str) -> bool {
        self.has_more(&thread_id(channel_id, thread_ts))
    }

    /// Next batch of files attached to the message at `parent_ts`
    pub fn files(
        &mut self,
        channel_id: &str,
        parent_ts: &str,
    ) -> Result<Vec<FileItem>, StorageError> {
        self.next(&file_id(channel_id, parent_ts)).map(|e| e.files)
    }

    /// True if more file batches remain for the message
    pub fn has_more_files(&self, channel_id: &str, parent_ts: &str) -> bool {
        self.has_more(&file_id(channel_id, parent_ts))
    }

    /// Forget all cursors and rewind the stream
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.cursors.clear();
        self.rs.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Stream every record in log order, one at a time.
    ///
    /// Cursors are reset first. Only one record is decoded per step, so
    /// memory does not grow with the log. The stream position from before
    /// the call is restored by [`Records::finish`], or when the reader is
    /// dropped.
    pub fn records(&mut self) -> Result<Records<'_, R>, StorageError> {
        let original = self.rs.stream_position()?;
        self.reset()?;
        Ok(Records {
            dec: LineDecoder::new(BufReader::new(&mut self.rs), 0),
            last_offset: self.last_offset.clone(),
            original,
            done: false,
            restored: false,
        })
    }

    /// Replay every record in log order.
    ///
    /// Cursors are reset first. `f` receives `None` for nil records. The
    /// stream position is restored afterwards, also when `f` fails; the first
    /// error from `f` stops the replay and is returned.
    pub fn for_each<F, E>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(Option<&Event>) -> Result<(), E>,
        E: From<StorageError>,
    {
        let mut records = self.records()?;
        let result = scan(&mut records, &mut f);
        let restored = records.finish();
        result?;
        restored?;
        Ok(())
    }

    /// Replay the log into a fresh watermark state named after the player
    pub fn state(&mut self) -> Result<State, StorageError> {
        let mut state = State::new(self.name.clone());
        self.for_each(|ev| {
            if let Some(ev) = ev {
                state.add_event(ev);
            }
            Ok::<_, StorageError>(())
        })?;
        debug!(
            channels = state.channels.len(),
            threads = state.threads.len(),
            "Built state from log"
        );
        Ok(state)
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> R {
        self.rs
    }

    fn read_at(&mut self, offset: u64) -> Result<Event, StorageError> {
        self.rs.seek(SeekFrom::Start(offset))?;
        let mut dec = LineDecoder::new(BufReader::new(&mut self.rs), offset);
        match dec.next_record()? {
            Some((_, Some(event))) => Ok(event),
            Some((_, None)) => Err(StorageError::deserialization(offset, "nil record")),
            None => Err(StorageError::deserialization(offset, "unexpected end of log")),
        }
    }
}

fn scan<R, F, E>(records: &mut Records<'_, R>, f: &mut F) -> Result<(), E>
where
    R: Read + Seek,
    F: FnMut(Option<&Event>) -> Result<(), E>,
    E: From<StorageError>,
{
    for record in records {
        let (_, event) = record?;
        f(event.as_ref())?;
    }
    Ok(())
}

/// Sequential reader over a whole log, from [`Player::records`]
///
/// Yields `(offset, record)` pairs, `None` for nil records. Stops after the
/// first decode error.
pub struct Records<'a, R: Read + Seek> {
    dec: LineDecoder<BufReader<&'a mut R>>,
    last_offset: OffsetHandle,
    original: u64,
    done: bool,
    restored: bool,
}

impl<R: Read + Seek> Records<'_, R> {
    /// Put the stream back where it was before the replay started
    pub fn finish(mut self) -> Result<(), StorageError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), StorageError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.dec.get_mut().get_mut().seek(SeekFrom::Start(self.original))?;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for Records<'_, R> {
    type Item = Result<(u64, Option<Event>), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.dec.next_record() {
            Ok(Some((offset, event))) => {
                self.last_offset.set(offset);
                Some(Ok((offset, event)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> Drop for Records<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "Failed to restore log position");
        }
    }
}

fn index_records<R: Read + Seek>(rs: &mut R) -> Result<(Index, usize), StorageError> {
    let mut idx = Index::new();
    let mut records = 0;
    let mut dec = LineDecoder::new(BufReader::new(rs), 0);
    while let Some((offset, event)) = dec.next_record()? {
        records += 1;
        if let Some(event) = event {
            idx.entry(event.id()).or_default().push(offset);
        }
    }
    Ok((idx, records))
}
