//! Line codec
//!
//! A log is newline-delimited JSON, one [`Event`] per line. A `null` line is
//! a nil record: it occupies a position in the log but has no identity.

use std::io::BufRead;

use convlog_core::Event;

use crate::error::StorageError;

/// Encode one record as a single line, including the trailing newline.
pub fn encode_line(event: &Event) -> Result<Vec<u8>, StorageError> {
    let mut buf =
        serde_json::to_vec(event).map_err(|e| StorageError::serialization(e.to_string()))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Bytes of a nil record line
pub const NIL_LINE: &[u8] = b"null\n";

/// Sequential record decoder that tracks the byte offset of each record
pub struct LineDecoder<R> {
    reader: R,
    offset: u64,
    line: String,
}

impl<R: BufRead> LineDecoder<R> {
    /// Decode from `reader`, whose current position is `start`
    pub fn new(reader: R, start: u64) -> Self {
        Self {
            reader,
            offset: start,
            line: String::new(),
        }
    }

    /// Offset of the next unread byte
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The underlying reader. Reading from it desynchronizes offsets.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Decode the next record.
    ///
    /// Returns `Ok(None)` at end of input, otherwise the offset the record
    /// starts at and the record itself (`None` for a nil record). Blank
    /// lines are skipped.
    pub fn next_record(&mut self) -> Result<Option<(u64, Option<Event>)>, StorageError> {
        loop {
            self.line.clear();
            let start = self.offset;
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.offset += n as u64;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let event: Option<Event> = serde_json::from_str(text)
                .map_err(|e| StorageError::deserialization(start, e.to_string()))?;
            return Ok(Some((start, event)));
        }
    }
}
