//! # Convlog Obfuscate
//!
//! Structure-preserving anonymizer for convlog logs.
//!
//! The output has the same records in the same order as the input, with the
//! same kinds, entity keys, counts and timestamps, so it indexes to the same
//! identities and replays exactly like the source. Free text is replaced by
//! random text of at least the same length; person identifiers are replaced
//! by a salted hash that is stable within a run.
//!
//! Randomness comes from a [`ChaCha8Rng`](rand_chacha::ChaCha8Rng) seeded
//! from [`ObfuscateConfig`], so a seed and salt reproduce a run exactly.
//!
//! ## Example
//!
//! ```rust,ignore
//! use convlog_obfuscate::{ObfuscateConfig, obfuscate_file};
//!
//! let stats = obfuscate_file("capture.jsonl", "shareable.jsonl", &ObfuscateConfig::new(42))?;
//! println!("rewrote {} messages", stats.messages);
//! ```

pub mod config;
pub mod error;
pub mod obfuscate;

pub use config::ObfuscateConfig;
pub use error::{ObfuscateError, ObfuscateResult};
pub use obfuscate::{FILE_URL_PREFIX, ObfuscateStats, Obfuscator, obfuscate, obfuscate_file};
