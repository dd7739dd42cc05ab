//! Zone pattern recognition over the neutral syntax tree.
//!
//! Two patterns are recognized, in priority order:
//!
//! 1. a top-level assignment to a recognized constant name whose value is a
//!    numeric sequence (thresholds) or a literal mapping;
//! 2. an if/elif ladder comparing one subject name against strictly
//!    increasing numeric thresholds, each branch assigning a short label.
//!
//! The raw result is a JSON object in the passthrough shape understood by
//! the normalizer: `{constants, if_chain, pattern, name?}`.

use super::python::PythonSyntax;
use super::strategy::ZoneExtractionStrategy;
use super::syntax::{CmpOp, Expr, IfChain, Module, Stmt, SyntaxTreeProvider};
use crate::error::ExtractionFailure;
use serde_json::{Map, Number, Value, json};
use std::fs;
use std::path::Path;

/// Constant the regex fallback looks for.
pub const PRIMARY_CONSTANT: &str = "ZONE_THRESHOLDS";
pub const RECOGNIZED_CONSTANTS: [&str; 6] = [
    PRIMARY_CONSTANT,
    "ZONES",
    "ZONE_BOUNDS",
    "ZONE_LIMITS",
    "ZONE_CUTS",
    "THRESHOLDS",
];
pub const LADDER_SUBJECTS: [&str; 3] = ["T", "score", "total"];
pub const LABEL_TARGETS: [&str; 3] = ["zone", "zone_label", "label"];
pub const MAX_LABEL_CHARS: usize = 32;

pub const PATTERN_ASSIGN_THRESHOLDS: &str = "assign_thresholds";
pub const PATTERN_ASSIGN_MAPPING: &str = "assign_mapping";
pub const PATTERN_IF_CHAIN: &str = "if_chain";
pub const PATTERN_NONE: &str = "none";

/// Built-in primary strategy: parse with the first provider that accepts
/// the target, then recognize.
pub struct SyntaxTreeStrategy {
    providers: Vec<Box<dyn SyntaxTreeProvider>>,
}

impl Default for SyntaxTreeStrategy {
    fn default() -> Self {
        Self::with_providers(vec![Box::new(PythonSyntax)])
    }
}

impl SyntaxTreeStrategy {
    pub fn with_providers(providers: Vec<Box<dyn SyntaxTreeProvider>>) -> Self {
        Self { providers }
    }

    pub fn languages(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.language()).collect()
    }
}

impl ZoneExtractionStrategy for SyntaxTreeStrategy {
    fn name(&self) -> &str {
        "syntax_tree"
    }

    fn extract(&self, target: &Path) -> Result<Option<Value>, ExtractionFailure> {
        let bytes = fs::read(target)
            .map_err(|err| ExtractionFailure::Read(format!("{}: {err}", target.display())))?;
        let source = String::from_utf8_lossy(&bytes);

        let Some(provider) = self
            .providers
            .iter()
            .find(|provider| provider.accepts(target, &source))
        else {
            tracing::debug!(
                instrument = %target.display(),
                languages = ?self.languages(),
                "no syntax-tree provider accepts instrument"
            );
            return Ok(None);
        };

        let module = provider
            .parse(&source)
            .map_err(|err| ExtractionFailure::Parse(err.to_string()))?;
        Ok(Some(recognize(&module)))
    }
}

/// Runs both recognizers; never fails. No match yields pattern `none`.
pub fn recognize(module: &Module) -> Value {
    if let Some(found) = assignment_pattern(module) {
        return found;
    }
    for stmt in module.walk() {
        if let Stmt::If(chain) = stmt
            && let Some(links) = ladder(chain)
        {
            return ladder_output(&links);
        }
    }
    json!({
        "constants": {},
        "if_chain": [],
        "pattern": PATTERN_NONE,
    })
}

fn assignment_pattern(module: &Module) -> Option<Value> {
    for stmt in &module.body {
        let Stmt::Assign { target, value, .. } = stmt else {
            continue;
        };
        if !RECOGNIZED_CONSTANTS.contains(&target.as_str()) {
            continue;
        }
        match value {
            Expr::List(items) | Expr::Tuple(items) => {
                let Some(thresholds) = items.iter().map(Expr::as_number).collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let mut constants = Map::new();
                for (idx, threshold) in thresholds.into_iter().enumerate() {
                    if let Some(number) = Number::from_f64(threshold) {
                        constants.insert(format!("ZONE_THRESHOLD_{idx}"), Value::Number(number));
                    }
                }
                return Some(json!({
                    "constants": constants,
                    "if_chain": [],
                    "pattern": PATTERN_ASSIGN_THRESHOLDS,
                    "name": target,
                }));
            }
            Expr::Dict(pairs) => {
                let mut constants = Map::new();
                for (key, value) in pairs {
                    let (Some(key), Some(value)) = (key.literal_key(), scalar_value(value)) else {
                        continue;
                    };
                    constants.insert(format!("ZONE_MAP_{key}"), value);
                }
                return Some(json!({
                    "constants": constants,
                    "if_chain": [],
                    "pattern": PATTERN_ASSIGN_MAPPING,
                    "name": target,
                }));
            }
            _ => continue,
        }
    }
    None
}

/// Integers, floats and strings; booleans and containers are dropped.
fn scalar_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Int(value) => Some(Value::from(*value)),
        Expr::Float(value) => Number::from_f64(*value).map(Value::Number),
        Expr::Str(value) => Some(Value::String(value.clone())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LadderLink {
    op: CmpOp,
    threshold: f64,
    label: String,
}

/// A valid ladder, or `None`. Any broken link rejects the whole chain.
fn ladder(chain: &IfChain) -> Option<Vec<LadderLink>> {
    let mut subject: Option<&str> = None;
    let mut links: Vec<LadderLink> = Vec::new();
    for branch in &chain.branches {
        let Expr::Compare { left, op, right } = &branch.test else {
            return None;
        };
        let Expr::Name(name) = left.as_ref() else {
            return None;
        };
        let name = name.as_str();
        if !LADDER_SUBJECTS.contains(&name) || subject.is_some_and(|s| s != name) {
            return None;
        }
        subject = Some(name);
        if !matches!(op, CmpOp::Lt | CmpOp::LtE) {
            return None;
        }
        let threshold = right.as_number()?;
        if links.last().is_some_and(|prev| threshold <= prev.threshold) {
            return None;
        }
        let label = branch_label(&branch.body)?;
        links.push(LadderLink {
            op: *op,
            threshold,
            label,
        });
    }
    (!links.is_empty()).then_some(links)
}

fn branch_label(body: &[Stmt]) -> Option<String> {
    body.iter().find_map(|stmt| match stmt {
        Stmt::Assign {
            target,
            value: Expr::Str(label),
            ..
        } if LABEL_TARGETS.contains(&target.as_str())
            && label.chars().count() <= MAX_LABEL_CHARS =>
        {
            Some(label.clone())
        }
        _ => None,
    })
}

fn ladder_output(links: &[LadderLink]) -> Value {
    let mut constants = Map::new();
    let mut if_chain = Vec::with_capacity(links.len());
    for (idx, link) in links.iter().enumerate() {
        let comparator = match link.op {
            CmpOp::LtE => "LtE",
            _ => "Lt",
        };
        if_chain.push(json!([comparator, link.threshold, link.label]));
        if let Some(number) = Number::from_f64(link.threshold) {
            constants.insert(format!("ZONE_IF_THRESHOLD_{idx}"), Value::Number(number));
        }
        constants.insert(
            format!("ZONE_IF_LABEL_{idx}"),
            Value::String(link.label.clone()),
        );
    }
    json!({
        "constants": constants,
        "if_chain": if_chain,
        "pattern": PATTERN_IF_CHAIN,
    })
}
