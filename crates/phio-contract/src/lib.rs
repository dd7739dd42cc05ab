//! # Phi⊗O Contract
//!
//! Contract validation for Phi⊗O scoring instruments. A target instrument
//! is probed along three independent axes and the results are reduced to a
//! versioned, hashed report.
//!
//! ## Architecture
//!
//! ```text
//! ContractProbe            ← resolves the target, runs the axes in order
//!     │
//!     ├── CliContractExtractor   ← `<target> --help`: subcommands, flags
//!     ├── ZoneExtractor          ← strategy (syntax tree | command) + regex fallback
//!     └── FormulaVerifier        ← golden new-template → score round trip
//!     │
//! compliance::assess       ← per-axis FULL / PARTIAL / MINIMAL, global = min
//!     │
//! ReportBuilder            ← content hash, timestamp, ContractReport
//! ```
//!
//! Every external call goes through [`ProcessRunner`], which bounds it by a
//! timeout. Axis extractors never fail: problems are recorded in the axis
//! contract. Only target resolution and report I/O return [`ProbeError`].

pub mod cli_surface;
pub mod compliance;
pub mod config;
pub mod error;
pub mod formula;
pub mod probe;
pub mod process;
pub mod report;
pub mod zones;

pub use cli_surface::{CliContract, CliContractExtractor, HelpSource, ProcessHelp};
pub use compliance::{AxisLevels, ComplianceLevel, ComplianceSummary};
pub use config::{ProbeConfig, TauAlias};
pub use error::{
    ExtractionFailure, ExtractionFailureKind, InvocationFailure, InvocationFailureKind, ProbeError,
};
pub use formula::{FormulaContract, FormulaVerifier};
pub use probe::ContractProbe;
pub use process::{Invocation, ProcessOutput, ProcessRunner, TargetLauncher};
pub use report::{ContentHash, ContractReport, ReportBuilder, ReportSummary};
pub use zones::{
    CommandStrategy, ExtractionMethod, SyntaxTreeProvider, SyntaxTreeStrategy, ZoneContract,
    ZoneExtractionStrategy, ZoneExtractor,
};
