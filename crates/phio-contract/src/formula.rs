//! Formula contract: one controlled "golden" round trip through the target.
//!
//! The run checks output schema, not arithmetic: a generated template is
//! scored with every item pinned to [`CONTROLLED_SCORE`], and the results
//! file must carry [`REQUIRED_RESULT_FIELDS`]. Scratch files live in a
//! temporary directory owned by the call and removed on every exit path.

use crate::error::{InvocationFailure, InvocationFailureKind};
use crate::process::{ProcessOutput, ProcessRunner, TargetLauncher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const TEMPLATE_NAME: &str = "ContractProbe";
pub const CONTROLLED_SCORE: i64 = 2;
pub const RESULTS_FILE: &str = "results.json";
pub const REQUIRED_RESULT_FIELDS: [&str; 2] = ["T", "K_eff"];
/// Stands in for the per-run scratch directory in recorded diagnostics.
pub const SCRATCH_PLACEHOLDER: &str = "<scratch>";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaContract {
    pub attempted: bool,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a target invocation did not run to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<InvocationFailureKind>,
}

impl FormulaContract {
    pub fn not_attempted() -> Self {
        Self::default()
    }

    fn failed(error: impl Into<String>, failure_kind: Option<InvocationFailureKind>) -> Self {
        Self {
            attempted: true,
            passed: false,
            error: Some(error.into()),
            failure_kind,
        }
    }

    fn passed() -> Self {
        Self {
            attempted: true,
            passed: true,
            error: None,
            failure_kind: None,
        }
    }
}

pub struct FormulaVerifier<'a> {
    runner: &'a ProcessRunner,
    launcher: &'a TargetLauncher,
}

impl<'a> FormulaVerifier<'a> {
    pub fn new(runner: &'a ProcessRunner, launcher: &'a TargetLauncher) -> Self {
        Self { runner, launcher }
    }

    pub fn verify(&self, target: &Path) -> FormulaContract {
        let contract = match tempfile::Builder::new().prefix("phio-formula-").tempdir() {
            Ok(scratch) => {
                let mut contract = self.golden_run(target, scratch.path());
                contract.error = contract
                    .error
                    .map(|error| scrub_scratch(&error, scratch.path()));
                contract
            }
            Err(err) => FormulaContract::failed(format!("failed to create scratch directory: {err}"), None),
        };
        if let Some(error) = &contract.error {
            tracing::warn!(instrument = %target.display(), error = %error, "golden run failed");
        }
        contract
    }

    fn golden_run(&self, target: &Path, scratch: &Path) -> FormulaContract {
        let template_path = scratch.join("template.json");
        let output = match self.invoke(
            target,
            vec![
                "new-template".to_string(),
                "--name".to_string(),
                TEMPLATE_NAME.to_string(),
                "--out".to_string(),
                template_path.to_string_lossy().into_owned(),
            ],
        ) {
            Ok(output) => output,
            Err(failure) => {
                return FormulaContract::failed(
                    format!("new-template failed: {failure}"),
                    Some(failure.kind()),
                );
            }
        };
        if !output.success() || !template_path.is_file() {
            return FormulaContract::failed(
                format!("new-template failed: {}", output.diagnostic().trim()),
                None,
            );
        }

        let mut template = match read_json(&template_path) {
            Ok(template) => template,
            Err(detail) => return FormulaContract::failed(format!("template unreadable: {detail}"), None),
        };
        pin_scores(&mut template);

        let input_path = scratch.join("input.json");
        let out_dir = scratch.join("out");
        let prepared = serde_json::to_string_pretty(&template)
            .map_err(|err| err.to_string())
            .and_then(|text| fs::write(&input_path, text).map_err(|err| err.to_string()))
            .and_then(|()| fs::create_dir_all(&out_dir).map_err(|err| err.to_string()));
        if let Err(detail) = prepared {
            return FormulaContract::failed(format!("failed to prepare score input: {detail}"), None);
        }

        let output = match self.invoke(
            target,
            vec![
                "score".to_string(),
                "--input".to_string(),
                input_path.to_string_lossy().into_owned(),
                "--outdir".to_string(),
                out_dir.to_string_lossy().into_owned(),
            ],
        ) {
            Ok(output) => output,
            Err(failure) => {
                return FormulaContract::failed(
                    format!("score failed: {failure}"),
                    Some(failure.kind()),
                );
            }
        };

        let results = read_json(&out_dir.join(RESULTS_FILE)).ok();
        let results = match results {
            Some(Value::Object(fields)) if output.success() && !fields.is_empty() => fields,
            _ => {
                return FormulaContract::failed(
                    format!("score failed: {}", output.diagnostic().trim()),
                    None,
                );
            }
        };
        if REQUIRED_RESULT_FIELDS
            .iter()
            .any(|field| !results.contains_key(*field))
        {
            return FormulaContract::failed("results.json missing T and/or K_eff", None);
        }

        FormulaContract::passed()
    }

    fn invoke(&self, target: &Path, args: Vec<String>) -> Result<ProcessOutput, InvocationFailure> {
        self.runner.run(&self.launcher.invocation(target, args))
    }
}

/// Target output often echoes the scratch paths it was given; those differ
/// per run and must not leak into the report.
fn scrub_scratch(text: &str, scratch: &Path) -> String {
    let scratch = scratch.to_string_lossy();
    if scratch.is_empty() {
        return text.to_string();
    }
    text.replace(scratch.as_ref(), SCRATCH_PLACEHOLDER)
}

/// Sets `score` on every template item that has one.
fn pin_scores(template: &mut Value) {
    let Some(items) = template.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };
    for item in items {
        if let Some(score) = item.get_mut("score") {
            *score = Value::from(CONTROLLED_SCORE);
        }
    }
}

fn read_json(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TempDirGuard {
        path: PathBuf,
    }

    impl TempDirGuard {
        fn new(prefix: &str) -> Self {
            let unique = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos();
            let path = std::env::temp_dir().join(format!(
                "phio-formula-test-{prefix}-{}-{unique}",
                std::process::id()
            ));
            fs::create_dir_all(&path).expect("temp dir should be creatable");
            Self { path }
        }

        fn script(&self, body: &str) -> PathBuf {
            let path = self.path.join("instrument.sh");
            fs::write(&path, body).expect("script should be written");
            path
        }
    }

    impl Drop for TempDirGuard {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn instrument(results: &str) -> String {
        format!(
            r#"cmd="$1"; shift
out=""; input=""; outdir=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift 2 ;;
    --input) input="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$cmd" in
  new-template)
    printf '%s' '{{"items":[{{"dimension":"a","score":0,"weight":1}},{{"dimension":"b","score":7,"weight":2}},{{"dimension":"c","weight":1}}]}}' > "$out" ;;
  score)
    grep -q '"score": 2' "$input" || {{ echo "scores not pinned" 1>&2; exit 3; }}
    grep -q '"score": 7' "$input" && exit 4
    printf '%s' '{results}' > "$outdir/results.json" ;;
  *) exit 64 ;;
esac
"#
        )
    }

    fn verify(script: &Path, timeout: std::time::Duration) -> FormulaContract {
        let runner = ProcessRunner::new(timeout);
        let launcher = TargetLauncher::new(Some("sh".to_string()), Vec::new());
        FormulaVerifier::new(&runner, &launcher).verify(script)
    }

    fn secs(n: u64) -> std::time::Duration {
        std::time::Duration::from_secs(n)
    }

    #[test]
    fn golden_run_passes_with_required_fields() {
        let dir = TempDirGuard::new("pass");
        let script = dir.script(&instrument(r#"{"T": 2.0, "K_eff": 1.5}"#));
        let contract = verify(&script, secs(10));
        assert_eq!(
            contract,
            FormulaContract {
                attempted: true,
                passed: true,
                error: None,
                failure_kind: None,
            }
        );
    }

    #[test]
    fn missing_result_field_fails_after_attempt() {
        let dir = TempDirGuard::new("missing");
        let script = dir.script(&instrument(r#"{"T": 2.0}"#));
        let contract = verify(&script, secs(10));
        assert!(contract.attempted);
        assert!(!contract.passed);
        assert_eq!(
            contract.error.as_deref(),
            Some("results.json missing T and/or K_eff")
        );
    }

    #[test]
    fn empty_results_are_a_score_failure() {
        let dir = TempDirGuard::new("empty");
        let script = dir.script(&instrument("{}"));
        let contract = verify(&script, secs(10));
        assert!(
            contract
                .error
                .as_deref()
                .is_some_and(|error| error.starts_with("score failed"))
        );
    }

    #[test]
    fn template_failure_is_reported() {
        let dir = TempDirGuard::new("template");
        let script = dir.script("echo 'cannot build template' 1>&2\nexit 1\n");
        let contract = verify(&script, secs(10));
        assert!(contract.attempted);
        assert_eq!(
            contract.error.as_deref(),
            Some("new-template failed: cannot build template")
        );
    }

    #[test]
    fn scratch_paths_in_diagnostics_are_stable_across_runs() {
        let dir = TempDirGuard::new("scratch");
        let script = dir.script("echo \"cannot write template to $5\" 1>&2\nexit 1\n");
        let first = verify(&script, secs(10));
        let second = verify(&script, secs(10));
        assert_eq!(
            first.error.as_deref(),
            Some("new-template failed: cannot write template to <scratch>/template.json")
        );
        assert_eq!(first, second);
    }

    #[test]
    fn hung_target_times_out() {
        let dir = TempDirGuard::new("hang");
        let script = dir.script("sleep 5\n");
        let contract = verify(&script, std::time::Duration::from_millis(200));
        assert!(contract.attempted);
        assert_eq!(contract.failure_kind, Some(InvocationFailureKind::Timeout));
    }

    #[test]
    fn pin_scores_only_touches_items_with_score() {
        let mut template = json!({"items": [{"score": 9}, {"weight": 1}], "score": 5});
        pin_scores(&mut template);
        assert_eq!(template, json!({"items": [{"score": 2}, {"weight": 1}], "score": 5}));
    }
}
