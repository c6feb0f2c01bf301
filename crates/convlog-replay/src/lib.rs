//! # Convlog Replay
//!
//! Drives a captured log back out, in log order.
//!
//! - [`replay`] feeds every record to a [`Sink`]. A
//!   [`Recorder`](convlog_storage::Recorder) is a sink, so replaying into one
//!   copies a log.
//! - [`EmulationServer`] serves a log over HTTP in the shape of the
//!   conversation API (`conversations.history`, `conversations.replies`),
//!   for integration tests that must not touch the network.
//!
//! ## Emulated responses
//!
//! | player result | history | replies |
//! |---|---|---|
//! | page | `200`, `ok: true` | `200`, `ok: true` |
//! | exhausted | `200`, `ok: true`, no messages | `200`, `ok: false`, `thread_not_found[..]` |
//! | not found | `404` | `404` |
//! | missing parameter | `404` (channel) | `400` (ts) |

pub mod error;
pub mod replay;
pub mod server;
pub mod sink;

pub use error::{ReplayError, ReplayResult, SinkError};
pub use replay::{ReplayStats, replay};
pub use server::{EmulationServer, HistoryParams, RepliesParams, SharedPlayer, router};
pub use sink::Sink;
