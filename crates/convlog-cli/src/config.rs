use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use convlog_obfuscate::ObfuscateConfig;

#[derive(Parser)]
#[command(name = "convlog", version, about = "Inspect, anonymize and replay conversation logs")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Write diagnostics as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every identity in a log with its record count
    Index {
        /// Log file
        log: PathBuf,
    },
    /// Rebuild the watermark state of a log
    State {
        /// Log file
        log: PathBuf,
        /// Where to write the state (default: next to the log)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write an anonymized copy of a log
    Obfuscate {
        /// Source log
        src: PathBuf,
        /// Destination log
        dst: PathBuf,
        /// Generator seed (random if neither this nor the config sets one)
        #[arg(long)]
        seed: Option<u64>,
        /// Salt for identifier hashing
        #[arg(long)]
        salt: Option<String>,
        /// TOML file with `seed` and `salt`; flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Copy a log by replaying it into a new recorder
    Replay {
        /// Source log
        src: PathBuf,
        /// Destination log
        dst: PathBuf,
    },
    /// Serve a log through the conversation API emulation server
    Serve {
        /// Log file
        log: PathBuf,
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

/// Resolve the anonymizer configuration from an optional TOML file and flags.
///
/// Returns the configuration and whether the seed was chosen at random.
pub fn obfuscate_config(
    file: Option<&Path>,
    seed: Option<u64>,
    salt: Option<String>,
) -> anyhow::Result<(ObfuscateConfig, bool)> {
    let mut file_seed = None;
    let mut config = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&text)?;
            file_seed = table.get("seed").and_then(toml::Value::as_integer);
            toml::from_str::<ObfuscateConfig>(&text)?
        }
        None => ObfuscateConfig::default(),
    };

    let random = seed.is_none() && file_seed.is_none();
    config.seed = match seed {
        Some(seed) => seed,
        None if random => rand::random(),
        None => config.seed,
    };
    if salt.is_some() {
        config.salt = salt;
    }
    Ok((config, random))
}
