//! # Convlog Storage
//!
//! Append-only conversation logs.
//!
//! - [`Recorder`] appends records to a log from any number of producers,
//!   through one background writer task.
//! - [`Player`] indexes a finished log by record identity and serves it back
//!   one identity at a time, or replays it in full.
//! - [`State`] holds the watermarks a later capture resumes from. It is built
//!   by replaying a log with [`Player::state`].
//!
//! ## Storage Format
//!
//! Newline-delimited JSON, one [`Event`](convlog_core::Event) per line. The
//! line order is the record order. The watermark state of a log is stored
//! next to it as `<log>.state`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use convlog_core::Message;
//! use convlog_storage::{Player, Recorder, RecorderConfig};
//!
//! let rec = Recorder::create("capture.jsonl", RecorderConfig::default()).await?;
//! rec.messages("C1", vec![Message::new("1.0", "hello")]).await?;
//! rec.close().await?;
//!
//! let mut player = Player::open("capture.jsonl")?;
//! let page = player.messages("C1")?;
//! assert_eq!(page[0].text, "hello");
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod player;
pub mod recorder;
pub mod state;

// Re-exports
pub use codec::{LineDecoder, NIL_LINE, encode_line};
pub use config::RecorderConfig;
pub use error::StorageError;
pub use player::{OffsetHandle, Player, Records};
pub use recorder::Recorder;
pub use state::{SIDECAR_SUFFIX, STATE_VERSION, State, sidecar_path};
