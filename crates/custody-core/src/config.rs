use std::path::{Path, PathBuf};
use std::time::Duration;

use custody_anchor::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, CustodyResult};

/// Content store backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    #[default]
    Memory,
    Fs,
}

/// Metadata store backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    #[default]
    Memory,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub backend: ContentBackend,
    /// Root directory for the `fs` backend.
    pub root: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backend: ContentBackend::Memory,
            root: PathBuf::from("data/content"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// JSON file for the `file` backend.
    pub path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::Memory,
            path: PathBuf::from("data/records.json"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Verification calls in flight per oracle request.
    pub max_concurrency: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// Complete service configuration.
///
/// Built once (defaults, TOML text or a TOML file) and handed to
/// [`crate::CustodyService::from_config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Deadline for the synchronous part of registration.
    pub register_timeout_ms: u64,
    pub content: ContentConfig,
    pub metadata: MetadataConfig,
    pub ledger: LedgerConfig,
    pub oracle: OracleConfig,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            register_timeout_ms: 10_000,
            content: ContentConfig::default(),
            metadata: MetadataConfig::default(),
            ledger: LedgerConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl CustodyConfig {
    /// Parse and validate TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> CustodyResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CustodyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> CustodyResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CustodyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> CustodyResult<String> {
        toml::to_string_pretty(self).map_err(|e| CustodyError::Config(e.to_string()))
    }

    pub fn validate(&self) -> CustodyResult<()> {
        if self.register_timeout_ms == 0 {
            return Err(CustodyError::Config(
                "register_timeout_ms must be positive".into(),
            ));
        }
        if self.oracle.max_concurrency == 0 {
            return Err(CustodyError::Config(
                "oracle.max_concurrency must be at least 1".into(),
            ));
        }
        self.ledger
            .validate()
            .map_err(|e| CustodyError::Config(format!("ledger: {e}")))
    }

    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }

    /// State file for a locally simulated ledger: `chain.json` beside the
    /// metadata file when records are durable, `None` otherwise.
    pub fn chain_snapshot_path(&self) -> Option<PathBuf> {
        match self.metadata.backend {
            MetadataBackend::File => Some(self.metadata.path.with_file_name("chain.json")),
            MetadataBackend::Memory => None,
        }
    }
}
