//! CLI-surface contract: what the target's help text advertises.

use crate::config::TauAlias;
use crate::error::{InvocationFailure, InvocationFailureKind};
use crate::process::{ProcessRunner, TargetLauncher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const REQUIRED_SUBCOMMANDS: [&str; 2] = ["new-template", "score"];
pub const TAU_ASCII_FLAG: &str = "--agg_tau";
pub const TAU_UNICODE_FLAG: &str = "--agg_τ";
const BASE_REQUIRED_FLAGS: [&str; 2] = ["--input", "--outdir"];
const SCANNED_FLAGS: [&str; 5] = [
    "--input",
    "--outdir",
    "--help",
    TAU_ASCII_FLAG,
    TAU_UNICODE_FLAG,
];

/// Capability to obtain the target's combined help output.
pub trait HelpSource {
    fn run_help(&self, target: &Path) -> Result<String, InvocationFailure>;
}

impl<F> HelpSource for F
where
    F: Fn(&Path) -> Result<String, InvocationFailure>,
{
    fn run_help(&self, target: &Path) -> Result<String, InvocationFailure> {
        self(target)
    }
}

/// Runs `<target> --help` through a [`ProcessRunner`]. Any exit code is
/// accepted; only failing to run at all is an error.
pub struct ProcessHelp<'a> {
    runner: &'a ProcessRunner,
    launcher: &'a TargetLauncher,
}

impl<'a> ProcessHelp<'a> {
    pub fn new(runner: &'a ProcessRunner, launcher: &'a TargetLauncher) -> Self {
        Self { runner, launcher }
    }
}

impl HelpSource for ProcessHelp<'_> {
    fn run_help(&self, target: &Path) -> Result<String, InvocationFailure> {
        let output = self
            .runner
            .run(&self.launcher.invocation(target, ["--help"]))?;
        Ok(output.combined())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasPairPresence {
    pub ascii: bool,
    pub unicode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliContract {
    pub help_valid: bool,
    pub help_text_length: usize,
    pub detected_subcommands: BTreeSet<String>,
    pub detected_flags: BTreeSet<String>,
    pub alias_pair_presence: AliasPairPresence,
    pub required_subcommands: Vec<String>,
    pub required_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<InvocationFailureKind>,
}

impl CliContract {
    fn empty(tau_alias: TauAlias) -> Self {
        Self {
            help_valid: false,
            help_text_length: 0,
            detected_subcommands: BTreeSet::new(),
            detected_flags: BTreeSet::new(),
            alias_pair_presence: AliasPairPresence::default(),
            required_subcommands: REQUIRED_SUBCOMMANDS.iter().map(|s| s.to_string()).collect(),
            required_flags: required_flags(tau_alias),
            error: None,
            failure_kind: None,
        }
    }

    pub fn missing_flags(&self) -> Vec<&str> {
        self.required_flags
            .iter()
            .filter(|flag| !self.detected_flags.contains(flag.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Flags the target must advertise under the given alias mode.
pub fn required_flags(tau_alias: TauAlias) -> Vec<String> {
    let mut flags: Vec<String> = BASE_REQUIRED_FLAGS.iter().map(|s| s.to_string()).collect();
    flags.push(TAU_ASCII_FLAG.to_string());
    if tau_alias == TauAlias::Unicode {
        flags.push(TAU_UNICODE_FLAG.to_string());
    }
    flags
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CliContractExtractor {
    tau_alias: TauAlias,
}

impl CliContractExtractor {
    pub fn new(tau_alias: TauAlias) -> Self {
        Self { tau_alias }
    }

    /// Never fails: an unusable help invocation is recorded in the contract.
    pub fn extract(&self, target: &Path, help: &dyn HelpSource) -> CliContract {
        let mut contract = CliContract::empty(self.tau_alias);

        let help_text = match help.run_help(target) {
            Ok(text) => text,
            Err(failure) => {
                tracing::warn!(instrument = %target.display(), error = %failure, "help invocation failed");
                contract.failure_kind = Some(failure.kind());
                contract.error = Some(failure.to_string());
                return contract;
            }
        };

        contract.help_text_length = help_text.chars().count();
        if help_text.trim().is_empty() {
            contract.error = Some("help output was empty".to_string());
            return contract;
        }
        contract.help_valid = true;

        contract.detected_subcommands = REQUIRED_SUBCOMMANDS
            .iter()
            .filter(|name| help_text.contains(**name))
            .map(|name| name.to_string())
            .collect();
        contract.detected_flags = SCANNED_FLAGS
            .iter()
            .filter(|flag| help_text.contains(**flag))
            .map(|flag| flag.to_string())
            .collect();
        contract.alias_pair_presence = AliasPairPresence {
            ascii: help_text.contains(TAU_ASCII_FLAG),
            unicode: help_text.contains(TAU_UNICODE_FLAG),
        };

        contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HELP: &str = "usage: inst [--input INPUT] [--outdir OUTDIR] [--agg_tau AGG_TAU] [--agg_τ AGG_Τ]\n\
        {new-template,score} ...\n  -h, --help  show this help message and exit\n";

    fn fixed(text: &'static str) -> impl Fn(&Path) -> Result<String, InvocationFailure> {
        move |_target: &Path| Ok(text.to_string())
    }

    #[test]
    fn full_help_detects_everything() {
        let contract =
            CliContractExtractor::default().extract(Path::new("inst.py"), &fixed(FULL_HELP));
        assert!(contract.help_valid);
        assert_eq!(contract.help_text_length, FULL_HELP.chars().count());
        assert_eq!(contract.detected_subcommands.len(), 2);
        assert!(contract.missing_flags().is_empty());
        assert!(contract.detected_flags.contains("--help"));
        assert_eq!(
            contract.alias_pair_presence,
            AliasPairPresence {
                ascii: true,
                unicode: true
            }
        );
        assert!(contract.error.is_none());
    }

    #[test]
    fn missing_unicode_alias_is_reported() {
        let help = "new-template score --input --outdir --agg_tau";
        let contract = CliContractExtractor::new(TauAlias::Unicode)
            .extract(Path::new("inst.py"), &fixed(help));
        assert!(contract.help_valid);
        assert_eq!(contract.missing_flags(), vec![TAU_UNICODE_FLAG]);
        assert!(!contract.alias_pair_presence.unicode);

        let ascii = CliContractExtractor::new(TauAlias::Ascii)
            .extract(Path::new("inst.py"), &fixed(help));
        assert!(ascii.missing_flags().is_empty());
    }

    #[test]
    fn invocation_failure_is_captured_not_propagated() {
        let failing = |_target: &Path| -> Result<String, InvocationFailure> {
            Err(InvocationFailure::Timeout {
                program: "python3".to_string(),
                after_secs: 5,
            })
        };
        let contract = CliContractExtractor::default().extract(Path::new("inst.py"), &failing);
        assert!(!contract.help_valid);
        assert_eq!(contract.help_text_length, 0);
        assert!(contract.detected_subcommands.is_empty());
        assert!(contract.detected_flags.is_empty());
        assert_eq!(contract.failure_kind, Some(InvocationFailureKind::Timeout));
        assert_eq!(
            contract.error.as_deref(),
            Some("`python3` timed out after 5s")
        );
    }

    #[test]
    fn empty_help_output_is_not_valid() {
        let contract =
            CliContractExtractor::default().extract(Path::new("inst.py"), &fixed("  \n"));
        assert!(!contract.help_valid);
        assert_eq!(contract.error.as_deref(), Some("help output was empty"));
        assert!(contract.failure_kind.is_none());
    }
}
