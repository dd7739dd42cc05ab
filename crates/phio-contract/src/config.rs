//! Probe configuration.
//!
//! Resolved once at the process boundary (config file, then CLI overrides)
//! and handed to the engine by reference. Nothing below this layer reads
//! the environment.

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which spelling of the aggregation-tau parameter the target exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TauAlias {
    /// Both `--agg_tau` and `--agg_τ` are expected.
    #[default]
    Unicode,
    /// The target is forced to its ASCII spelling; only `--agg_tau` is
    /// expected and the target is told so through its environment.
    Ascii,
}

impl TauAlias {
    /// Environment forwarded to every target invocation.
    pub fn target_env(self) -> Vec<(String, String)> {
        match self {
            Self::Unicode => Vec::new(),
            Self::Ascii => vec![("PHIO_FORCE_ASCII_TAU".to_string(), "1".to_string())],
        }
    }
}

impl std::str::FromStr for TauAlias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unicode" | "τ" => Ok(Self::Unicode),
            "ascii" | "tau" => Ok(Self::Ascii),
            _ => Err(format!("unknown tau alias mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Program the target is run with; `None` executes the target directly.
    pub interpreter: Option<String>,
    pub timeout_secs: u64,
    pub tau_alias: TauAlias,
    pub check_formula: bool,
    /// Use the built-in syntax-tree strategy for zone extraction.
    pub static_analysis: bool,
    /// External extractor command; the target path is appended as the
    /// last argument. Takes precedence over the built-in strategy.
    pub zone_extractor: Option<Vec<String>>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interpreter: Some(DEFAULT_INTERPRETER.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tau_alias: TauAlias::default(),
            check_formula: false,
            static_analysis: true,
            zone_extractor: None,
        }
    }
}

impl ProbeConfig {
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ProbeError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ProbeError::ParseConfig {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Invocation bound, never below one second.
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.max(1)
    }
}
