//! # Convlog Core
//!
//! Record schema for convlog conversation logs.
//!
//! A log is a sequence of [`Event`]s, each holding one page of items fetched
//! from a conversation API: a page of channel messages, a page of thread
//! replies, or a batch of file metadata. Records are grouped by their
//! identity (see [`Event::id`]), which is the key readers index on.
//!
//! ## Key Types
//!
//! - [`Event`]: One captured page, as stored on one line of the log
//! - [`EventType`]: Open enumeration of record kinds
//! - [`Message`], [`File`]: The captured payload items
//!
//! ## Identity
//!
//! | kind | identity |
//! |---|---|
//! | Messages | `channel` |
//! | ThreadMessages | `"t" + channel + ":" + parent.thread_ts` |
//! | Files | `"f" + channel + ":" + parent.ts` |
//! | unknown | `"<unknown:N>"` |

pub mod error;
pub mod event;
pub mod message;
pub mod timestamp;

pub use error::TimestampError;
pub use event::{Event, EventType, file_id, thread_id};
pub use message::{Attachment, Edited, File, Message, Reaction};
pub use timestamp::{micros_to_ts, ts_to_micros};
