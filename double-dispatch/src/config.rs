//! Dispatch Configuration
//!
//! Tunables shared by table building and resolution. Every field has a
//! default, so a partial TOML document is valid.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Result;

static SHARED_DEFAULT: Lazy<Arc<DispatchConfig>> =
    Lazy::new(|| Arc::new(DispatchConfig::default()));

/// Configuration for dispatchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Operation whose `Object`-typed overload is structural equality and is
    /// never registered as a candidate.
    pub equality_operation: String,

    /// Maximum superclass links followed by one resolution.
    pub max_hierarchy_depth: usize,

    /// Emit a `debug` event for every resolution miss.
    pub log_misses: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            equality_operation: "eq".to_string(),
            max_hierarchy_depth: 64,
            log_misses: false,
        }
    }
}

impl DispatchConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The process-wide default configuration.
    pub fn shared() -> Arc<DispatchConfig> {
        Arc::clone(&SHARED_DEFAULT)
    }
}
