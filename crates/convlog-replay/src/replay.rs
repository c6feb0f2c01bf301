//! Sink replay

use std::io::{Read, Seek};

use convlog_core::EventType;
use convlog_storage::Player;
use tracing::{debug, info, instrument, warn};

use crate::error::{ReplayError, ReplayResult};
use crate::sink::Sink;

/// Counts from one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records handed to the sink
    pub dispatched: usize,
    /// Nil records and records of unknown kind
    pub skipped: usize,
}

/// Feed every record of the log to `sink`, in log order.
///
/// Records are decoded one at a time and each is handed over before the
/// next is read. A malformed log cannot get this far because the player
/// rejects it when indexing. Nil records and records of unknown kind are
/// skipped. The first sink error stops the replay; what the sink already
/// accepted stays accepted. The sink is not closed.
///
/// The sink capability only carries pages, so a sink sees neither the
/// original `recorded_at` stamps nor records of unknown kind.
#[instrument(skip_all, fields(log = %player.name()))]
pub async fn replay<R, S>(player: &mut Player<R>, sink: &S) -> ReplayResult<ReplayStats>
where
    R: Read + Seek,
    S: Sink + ?Sized,
{
    let mut records = player.records()?;
    let mut stats = ReplayStats::default();

    for record in records.by_ref() {
        let (offset, event) = record?;
        let Some(event) = event else {
            stats.skipped += 1;
            continue;
        };
        let identity = event.id();
        let result = match event.event_type {
            EventType::Messages => sink.messages(&event.channel_id, event.messages).await,
            EventType::ThreadMessages => {
                let parent = event.parent.unwrap_or_default();
                sink.thread_messages(&event.channel_id, parent, event.messages)
                    .await
            }
            EventType::Files => {
                let parent = event.parent.unwrap_or_default();
                sink.files(
                    &event.channel_id,
                    parent,
                    event.is_thread_message,
                    event.files,
                )
                .await
            }
            EventType::Unknown(kind) => {
                warn!(kind, offset, "Skipping record of unknown kind");
                stats.skipped += 1;
                continue;
            }
        };
        if let Err(source) = result {
            return Err(ReplayError::Sink {
                identity,
                offset,
                source,
            });
        }
        debug!(%identity, offset, "Dispatched record");
        stats.dispatched += 1;
    }

    records.finish()?;
    info!(
        dispatched = stats.dispatched,
        skipped = stats.skipped,
        "Replay complete"
    );
    Ok(stats)
}
