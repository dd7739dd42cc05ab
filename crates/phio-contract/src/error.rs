//! Error types for contract probe operations.
//!
//! Only [`ProbeError`] is fatal. Everything an axis can run into while
//! talking to the target is carried in-band through [`InvocationFailure`]
//! and [`ExtractionFailure`] and ends up in the report.

use serde::{Deserialize, Serialize};

/// Fatal errors: raised only around target resolution, configuration and
/// report I/O. Axis extractors never produce these.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The target program does not exist.
    #[error("instrument not found: {path}")]
    TargetNotFound { path: String },

    /// The target exists but its bytes cannot be read for hashing.
    #[error("failed to read instrument: {path}: {source}")]
    ReadTarget {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config: {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseConfig {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render report: {0}")]
    SerializeReport(#[source] serde_json::Error),

    #[error("failed to write report: {path}: {source}")]
    WriteReport {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why an external invocation did not produce a completed process.
///
/// A non-zero exit code is *not* a failure at this level: the process ran
/// to completion and its output is returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum InvocationFailure {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {after_secs}s")]
    Timeout { program: String, after_secs: u64 },

    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed capturing output of `{program}`: {detail}")]
    Capture { program: String, detail: String },
}

impl InvocationFailure {
    pub fn kind(&self) -> InvocationFailureKind {
        match self {
            Self::Spawn { .. } => InvocationFailureKind::Spawn,
            Self::Timeout { .. } => InvocationFailureKind::Timeout,
            Self::Wait { .. } => InvocationFailureKind::Wait,
            Self::Capture { .. } => InvocationFailureKind::Capture,
        }
    }
}

/// Serializable discriminant of [`InvocationFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationFailureKind {
    Spawn,
    Timeout,
    Wait,
    Capture,
}

/// Failure reported by a zone extraction strategy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionFailure {
    /// The target source could not be turned into a syntax tree.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("failed to read source: {0}")]
    Read(String),

    /// An external extractor could not be run or did not exit cleanly.
    #[error("extractor invocation failed: {0}")]
    Invocation(String),

    /// The extractor answered, but not with a shape the normalizer knows.
    #[error("{0}")]
    UnrecognizedShape(String),
}

impl ExtractionFailure {
    pub fn kind(&self) -> ExtractionFailureKind {
        match self {
            Self::Parse(_) => ExtractionFailureKind::Parse,
            Self::Read(_) => ExtractionFailureKind::Read,
            Self::Invocation(_) => ExtractionFailureKind::Invocation,
            Self::UnrecognizedShape(_) => ExtractionFailureKind::UnrecognizedShape,
        }
    }
}

/// Serializable discriminant recorded in the zone contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailureKind {
    Parse,
    Read,
    Invocation,
    UnrecognizedShape,
    /// Neither a static strategy nor the fallback produced any result.
    NoSignalSource,
}
