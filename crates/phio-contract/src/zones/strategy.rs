//! Pluggable zone extraction strategies.

use crate::error::ExtractionFailure;
use crate::process::{Invocation, ProcessRunner};
use serde_json::Value;
use std::path::Path;

/// A primary zone extraction capability, injected into the extractor.
///
/// `Ok(None)` means the strategy had nothing usable to say about the target
/// and the regex fallback should run. `Ok(Some(raw))` is handed to the
/// normalizer.
pub trait ZoneExtractionStrategy {
    fn name(&self) -> &str;

    fn extract(&self, target: &Path) -> Result<Option<Value>, ExtractionFailure>;
}

/// Runs an external extractor command with the target path appended and
/// reads its stdout as JSON.
#[derive(Debug, Clone)]
pub struct CommandStrategy {
    program: String,
    args: Vec<String>,
    runner: ProcessRunner,
}

impl CommandStrategy {
    pub fn new(program: impl Into<String>, args: Vec<String>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            args,
            runner,
        }
    }

    /// `command[0]` is the program, the rest its leading arguments.
    pub fn from_command(command: &[String], runner: ProcessRunner) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), runner))
    }
}

impl ZoneExtractionStrategy for CommandStrategy {
    fn name(&self) -> &str {
        "command"
    }

    fn extract(&self, target: &Path) -> Result<Option<Value>, ExtractionFailure> {
        let invocation = Invocation::new(self.program.clone())
            .args(self.args.iter().cloned())
            .arg(target.to_string_lossy());
        let output = self
            .runner
            .run(&invocation)
            .map_err(|failure| ExtractionFailure::Invocation(failure.to_string()))?;
        if !output.success() {
            let code = output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ExtractionFailure::Invocation(format!(
                "`{}` exited with {code}: {}",
                invocation.display(),
                output.diagnostic().trim()
            )));
        }

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(stdout) {
            Ok(Value::Null) => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(err) => Err(ExtractionFailure::UnrecognizedShape(format!(
                "extractor output is not JSON: {err}"
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ExtractionFailureKind;
    use serde_json::json;

    fn sh(script: &str) -> CommandStrategy {
        CommandStrategy::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "extractor".to_string()],
            ProcessRunner::from_secs(10),
        )
    }

    #[test]
    fn target_path_is_appended_and_json_parsed() {
        let strategy = sh(r#"printf '{"thresholds": [1, 2], "target": "%s"}' "$1""#);
        let raw = strategy
            .extract(Path::new("/tmp/inst.py"))
            .expect("extractor should succeed")
            .expect("extractor should produce output");
        assert_eq!(raw, json!({"thresholds": [1, 2], "target": "/tmp/inst.py"}));
    }

    #[test]
    fn null_or_empty_output_means_no_result() {
        assert!(sh("echo null").extract(Path::new("x")).expect("ok").is_none());
        assert!(sh("true").extract(Path::new("x")).expect("ok").is_none());
    }

    #[test]
    fn failures_are_classified() {
        let err = sh("echo boom 1>&2; exit 4")
            .extract(Path::new("x"))
            .expect_err("non-zero exit should fail");
        assert_eq!(err.kind(), ExtractionFailureKind::Invocation);
        assert!(err.to_string().contains("boom"));

        let err = sh("echo not-json")
            .extract(Path::new("x"))
            .expect_err("non-json should fail");
        assert_eq!(err.kind(), ExtractionFailureKind::UnrecognizedShape);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandStrategy::from_command(&[], ProcessRunner::from_secs(1)).is_none());
    }
}
