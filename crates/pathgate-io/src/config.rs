//! Gateway configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid:
//!
//! ```toml
//! [local]
//! default_mode = "automatic"
//! known_roots = ["/storage/emulated/0", "/sdcard"]
//! dry_run = false
//!
//! [saf]
//! default_file_mime = "application/octet-stream"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::local::Mode;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration for all gateways.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub local: LocalConfig,
    pub saf: SafConfig,
}

impl GatewayConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file.
    ///
    /// Relative `known_roots` are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for root in &mut config.local.known_roots {
            if !root.is_absolute() {
                *root = dunce::simplified(&base.join(&*root)).to_path_buf();
            }
        }
        Ok(config)
    }

    pub fn with_local(mut self, local: LocalConfig) -> Self {
        self.local = local;
        self
    }

    pub fn with_saf(mut self, saf: SafConfig) -> Self {
        self.saf = saf;
        self
    }
}

/// Settings for [`LocalGateway`](crate::LocalGateway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Mode used by the trait methods.
    pub default_mode: Mode,

    /// Directories known to be readable without privileges (shared storage
    /// roots). Existence checks below them never escalate.
    pub known_roots: Vec<PathBuf>,

    /// Log deletions instead of performing them.
    pub dry_run: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::Automatic,
            known_roots: Vec::new(),
            dry_run: false,
        }
    }
}

impl LocalConfig {
    pub fn with_default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_known_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.known_roots.push(root.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Settings for [`SafGateway`](crate::SafGateway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafConfig {
    /// MIME type for files created through the gateway.
    pub default_file_mime: String,
}

impl Default for SafConfig {
    fn default() -> Self {
        Self {
            default_file_mime: "application/octet-stream".to_string(),
        }
    }
}
