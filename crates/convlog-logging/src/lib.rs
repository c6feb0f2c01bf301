//! Tracing subscriber setup for convlog binaries
//!
//! Library crates in this workspace only emit `tracing` events. Binaries
//! install a subscriber once at startup with [`SubscriberBuilder`]:
//!
//! - human-readable console output (default) or JSONL console output
//! - optional JSONL file output with daily/hourly rotation via
//!   tracing-appender
//! - `RUST_LOG` overrides the configured default level
//!
//! Console output goes to stderr so command output on stdout stays clean.
//!
//! # Quick Start
//!
//! ```ignore
//! use convlog_logging::{LogConfig, SubscriberBuilder};
//!
//! // Keep the guard alive for the duration of the program
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod error;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};
pub use error::LoggingError;
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use tracing::Dispatch;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and installing the subscriber
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: pretty console output at `info`
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Write JSONL to the console instead of human-readable lines
    pub fn with_json_console(mut self, json: bool) -> Self {
        self.config.console.pretty = !json;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Build the subscriber without installing it.
    ///
    /// The guard, if any, flushes file output when dropped.
    pub fn build(self) -> Result<(Dispatch, Option<WorkerGuard>), LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.config.default_level).map_err(|e| {
                LoggingError::InvalidLevel {
                    level: self.config.default_level.clone(),
                    message: e.to_string(),
                }
            })?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if self.config.console.pretty {
                layers.push(
                    console
                        .with_ansi(self.config.console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                layers.push(
                    console
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .flatten_event(true)
                        .boxed(),
                );
            }
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        let subscriber = Registry::default().with(layers).with(filter);
        Ok((Dispatch::new(subscriber), guard))
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is configured. If the configuration cannot
    /// be applied a warning is printed and logging falls back to the console.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been set.
    pub fn init(self) -> Option<WorkerGuard> {
        let config = self.config.clone();
        let (dispatch, guard) = match self.build() {
            Ok(built) => built,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                let fallback = SubscriberBuilder {
                    config: LogConfig {
                        file: None,
                        ..config
                    },
                };
                match fallback.build() {
                    Ok(built) => built,
                    Err(e) => {
                        eprintln!("Warning: Falling back to default log level: {}", e);
                        (Dispatch::new(default_subscriber()), None)
                    }
                }
            }
        };
        dispatch.init();
        guard
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set or the
    /// configuration cannot be applied.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let (dispatch, guard) = self.build()?;
        dispatch
            .try_init()
            .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;
        Ok(guard)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_subscriber() -> impl tracing::Subscriber + Send + Sync {
    Registry::default()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new("info"))
}

fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory).map_err(|e| LoggingError::File(e.to_string()))?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            // Single file, truncated on start
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            let file = File::create(&path).map_err(|e| LoggingError::File(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl")
        .build(&config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}
