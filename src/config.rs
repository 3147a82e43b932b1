//! Configuration for the Casebook engine
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. [`CasebookConfig::load`] layers an optional file under
//! `CASEBOOK_*` environment variables (nested fields use `__`, e.g.
//! `CASEBOOK_CACHE__CAPACITY=200`).

use crate::error::{CasebookError, Result};
use crate::retrieval::{RankingPolicy, CONFIDENCE_THRESHOLD, RELEVANCE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CASEBOOK";

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasebookConfig {
    /// Directory holding one subdirectory per namespace
    pub base_path: PathBuf,

    /// Successes and failures each keep at most this many entries
    pub max_entries: usize,

    pub cache: CacheConfig,

    pub retrieval: RetrievalConfig,
}

/// Lookup cache settings (TTLs in seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Used when a caller gives no TTL of its own
    #[serde(with = "serde_duration")]
    pub default_ttl: Duration,

    pub capacity: usize,

    /// Similar-case lookups; case stores are appended to mid-session
    #[serde(with = "serde_duration")]
    pub similar_ttl: Duration,

    #[serde(with = "serde_duration")]
    pub recommendations_ttl: Duration,
}

/// Ranking thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub relevance_threshold: f64,
    pub confidence_threshold: f64,

    /// Similar cases returned when the caller does not say
    pub default_limit: usize,

    /// Learnings above this confidence are applied without being asked for
    pub high_confidence_threshold: f64,
}

impl Default for CasebookConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(".agents/memory"),
            max_entries: 1000,
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300), // 5 minutes
            capacity: 500,
            similar_ttl: Duration::from_secs(60),
            recommendations_ttl: Duration::from_secs(120),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: RELEVANCE_THRESHOLD,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            default_limit: 5,
            high_confidence_threshold: 0.7,
        }
    }
}

impl RetrievalConfig {
    pub fn ranking_policy(&self) -> RankingPolicy {
        RankingPolicy {
            relevance_threshold: self.relevance_threshold,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

// Durations are written as whole seconds
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl CasebookConfig {
    /// Default configuration rooted at `base_path`
    pub fn with_base_path<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: CasebookConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Defaults, overridden by an optional file, overridden by environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: CasebookConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CasebookError::Config(
                "max_entries must be at least 1".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(CasebookError::Config(
                "cache.capacity must be at least 1".to_string(),
            ));
        }

        for (name, ttl) in [
            ("cache.default_ttl", self.cache.default_ttl),
            ("cache.similar_ttl", self.cache.similar_ttl),
            ("cache.recommendations_ttl", self.cache.recommendations_ttl),
        ] {
            if ttl.is_zero() {
                return Err(CasebookError::Config(format!(
                    "{} must be at least 1 second",
                    name
                )));
            }
        }

        for (name, value) in [
            ("retrieval.relevance_threshold", self.retrieval.relevance_threshold),
            ("retrieval.confidence_threshold", self.retrieval.confidence_threshold),
            (
                "retrieval.high_confidence_threshold",
                self.retrieval.high_confidence_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CasebookError::Config(format!(
                    "{} must be between 0 and 1",
                    name
                )));
            }
        }

        if self.retrieval.default_limit == 0 {
            return Err(CasebookError::Config(
                "retrieval.default_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let toml_str =
            toml::to_string_pretty(self).map_err(|e| CasebookError::Config(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
