//! Anonymizer configuration

use serde::{Deserialize, Serialize};

/// Seed and salt for one anonymization run.
///
/// The same seed and salt over the same input produce byte-identical
/// output. Without a salt one is drawn from the seeded generator, so the
/// seed alone is enough to reproduce a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscateConfig {
    pub seed: u64,
    pub salt: Option<String>,
}

impl ObfuscateConfig {
    pub fn new(seed: u64) -> Self {
        Self { seed, salt: None }
    }

    /// Use a fixed salt for identifier hashing
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config: ObfuscateConfig = toml::from_str("seed = 42\nsalt = \"pepper\"").unwrap();
        assert_eq!(config, ObfuscateConfig::new(42).with_salt("pepper"));

        let config: ObfuscateConfig = toml::from_str("seed = 7").unwrap();
        assert_eq!(config.salt, None);
    }
}
