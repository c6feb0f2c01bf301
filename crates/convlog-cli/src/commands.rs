//! Command implementations

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use convlog_obfuscate::{ObfuscateConfig, ObfuscateStats, obfuscate_file};
use convlog_replay::{EmulationServer, ReplayStats, Sink, replay};
use convlog_storage::{Player, Recorder, RecorderConfig, sidecar_path};
use tracing::info;

/// Write `identity<TAB>records` for every identity, sorted
pub fn index(log: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let player =
        Player::open(log).with_context(|| format!("cannot index {}", log.display()))?;
    for id in player.identities() {
        let records = player.offsets(id).map_or(0, <[u64]>::len);
        writeln!(out, "{id}\t{records}")?;
    }
    Ok(())
}

/// Rebuild the watermark state of `log` and save it. Returns where it went.
pub fn state(log: &Path, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let mut player =
        Player::open(log).with_context(|| format!("cannot open {}", log.display()))?;
    let mut state = player.state()?;
    state.set_complete(true);

    let path = output.unwrap_or_else(|| sidecar_path(log));
    state
        .save(&path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    info!(
        path = %path.display(),
        channels = state.channels.len(),
        threads = state.threads.len(),
        "Saved state"
    );
    Ok(path)
}

/// Write an anonymized copy of `src` to `dst`
pub fn obfuscate(
    src: &Path,
    dst: &Path,
    config: &ObfuscateConfig,
) -> anyhow::Result<ObfuscateStats> {
    let stats = obfuscate_file(src, dst, config)
        .with_context(|| format!("cannot obfuscate {}", src.display()))?;
    Ok(stats)
}

/// Copy `src` to `dst` through the sink replay path.
///
/// The copy carries pages, not raw records: records of unknown kind and
/// nil records are dropped, and every copied record is stamped with the
/// time of the copy instead of its original capture time.
pub async fn replay_copy(src: &Path, dst: &Path) -> anyhow::Result<ReplayStats> {
    let mut player =
        Player::open(src).with_context(|| format!("cannot open {}", src.display()))?;
    let rec = Recorder::create(dst, RecorderConfig::default())
        .await
        .with_context(|| format!("cannot create {}", dst.display()))?;

    let replayed = replay(&mut player, &rec).await;
    // Close even when the replay failed so the writer drains.
    let closed = Sink::close(&rec).await;
    let stats = replayed?;
    closed.map_err(|e| anyhow::anyhow!("cannot finish {}: {e}", dst.display()))?;
    Ok(stats)
}

/// Serve `log` until Ctrl-C
pub async fn serve(log: &Path, addr: SocketAddr) -> anyhow::Result<()> {
    let player =
        Player::open(log).with_context(|| format!("cannot open {}", log.display()))?;
    let server = EmulationServer::bind(addr, player)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    println!("Serving {} at {}", log.display(), server.api_url());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    server.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convlog_core::{Event, Message};
    use convlog_storage::{State, encode_line};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("capture.jsonl");
        let parent = Message::new("10.0", "p").with_thread_ts("10.0");
        let mut data = Vec::new();
        for ev in [
            Event::messages("C1", vec![parent.clone()]),
            Event::messages("C1", vec![Message::new("12.0", "q")]),
            Event::thread_messages("C1", parent, vec![Message::new("11.0", "r")]),
        ] {
            data.extend(encode_line(&ev).unwrap());
        }
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_index_lists_identities() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir);
        let mut out = Vec::new();
        index(&log, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "C1\t2\ntC1:10.0\t1\n");
    }

    #[test]
    fn test_state_writes_sidecar() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir);
        let path = state(&log, None).unwrap();
        assert_eq!(path, sidecar_path(&log));

        let saved = State::load(&path).unwrap();
        assert!(saved.is_complete);
        assert_eq!(saved.log_filename, "capture.jsonl");
        assert_eq!(saved.latest_channel_ts("C1").as_deref(), Some("12.000000"));
        assert!(saved.has_thread("C1", "10.0"));
    }

    #[test]
    fn test_index_missing_log() {
        let dir = TempDir::new().unwrap();
        let err = index(&dir.path().join("nope.jsonl"), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("cannot index"));
    }

    #[tokio::test]
    async fn test_replay_copy() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir);
        let copy = dir.path().join("copy.jsonl");
        let stats = replay_copy(&log, &copy).await.unwrap();
        assert_eq!(stats.dispatched, 3);

        let mut out = Vec::new();
        index(&copy, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "C1\t2\ntC1:10.0\t1\n");
    }

    #[tokio::test]
    async fn test_replay_copy_drops_unknown_kinds_and_restamps() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mixed.jsonl");
        let mut ev = Event::messages("C1", vec![Message::new("1.0", "a")]);
        ev.recorded_at = 1;
        let mut data = encode_line(&ev).unwrap();
        data.extend_from_slice(b"{\"_t\":42,\"_ts\":1,\"_id\":\"C1\"}\n");
        std::fs::write(&log, data).unwrap();

        let copy = dir.path().join("copy.jsonl");
        let stats = replay_copy(&log, &copy).await.unwrap();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.skipped, 1);

        let mut out = Vec::new();
        index(&log, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<unknown:42>\t1\nC1\t1\n");
        let mut out = Vec::new();
        index(&copy, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "C1\t1\n");

        let mut copied = Player::open(&copy).unwrap();
        let ev = copied.next("C1").unwrap();
        assert_eq!(ev.messages[0].text, "a");
        assert_ne!(ev.recorded_at, 1);
    }

    #[test]
    fn test_obfuscate_keeps_identities() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir);
        let dst = dir.path().join("scrubbed.jsonl");
        let stats = obfuscate(&log, &dst, &ObfuscateConfig::new(1)).unwrap();
        assert_eq!(stats.records, 3);

        let mut out = Vec::new();
        index(&dst, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "C1\t2\ntC1:10.0\t1\n");
    }
}
