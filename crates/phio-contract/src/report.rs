//! Versioned, hashed, timestamped contract report.

use crate::cli_surface::CliContract;
use crate::compliance::{self, ComplianceSummary};
use crate::error::ProbeError;
use crate::formula::FormulaContract;
use crate::zones::ZoneContract;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::path::Path;

pub const CONTRACT_VERSION: &str = "1.5";
const TIMESTAMP_FIELD: &str = "validation_timestamp";

/// `sha256:<hex>` digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(format!("sha256:{digest:x}"))
    }

    /// Streams the file through the hasher.
    pub fn from_file(path: &Path) -> Result<Self, ProbeError> {
        let read_err = |source| ProbeError::ReadTarget {
            path: path.display().to_string(),
            source,
        };
        let mut file = File::open(path).map_err(read_err)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(read_err)?;
        let digest = hasher.finalize();
        Ok(Self(format!("sha256:{digest:x}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flattened booleans and counts for quick inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub cli_help_valid: bool,
    pub zones_attempted: bool,
    pub zones_count: usize,
    pub formula_checked: bool,
    pub formula_pass: bool,
}

/// Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractReport {
    pub contract_version: String,
    pub instrument_path: String,
    pub instrument_hash: ContentHash,
    pub validation_timestamp: String,
    pub compliance: ComplianceSummary,
    pub summary: ReportSummary,
    pub cli: CliContract,
    pub zones: ZoneContract,
    pub formula: FormulaContract,
}

impl ContractReport {
    pub fn to_json_pretty(&self) -> Result<String, ProbeError> {
        serde_json::to_string_pretty(self).map_err(ProbeError::SerializeReport)
    }

    /// The report without its timestamp; equal across runs on an
    /// unchanged target.
    pub fn canonical_json(&self) -> Result<String, ProbeError> {
        let mut value = serde_json::to_value(self).map_err(ProbeError::SerializeReport)?;
        if let Some(object) = value.as_object_mut() {
            object.shift_remove(TIMESTAMP_FIELD);
        }
        serde_json::to_string_pretty(&value).map_err(ProbeError::SerializeReport)
    }

    /// Writes pretty JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ProbeError> {
        let write_err = |source| ProbeError::WriteReport {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut text = self.to_json_pretty()?;
        text.push('\n');
        fs::write(path, text).map_err(write_err)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    timestamp: Option<DateTime<Utc>>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the timestamp instead of reading the clock.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(
        &self,
        target: &Path,
        cli: CliContract,
        zones: ZoneContract,
        formula: FormulaContract,
    ) -> Result<ContractReport, ProbeError> {
        let instrument_hash = ContentHash::from_file(target)?;
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let compliance = compliance::assess(&cli, &zones, &formula);
        let summary = ReportSummary {
            cli_help_valid: cli.help_valid,
            zones_attempted: zones.attempted,
            zones_count: zones.zones.len(),
            formula_checked: formula.attempted,
            formula_pass: formula.passed,
        };

        Ok(ContractReport {
            contract_version: CONTRACT_VERSION.to_string(),
            instrument_path: target.display().to_string(),
            instrument_hash,
            validation_timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
            compliance,
            summary,
            cli,
            zones,
            formula,
        })
    }
}
