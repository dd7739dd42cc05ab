//! Language-agnostic last resort: a single-line regex over the source text
//! for the primary threshold constant. Only plain numeric tokens are read;
//! nothing is evaluated.

use super::patterns::PRIMARY_CONSTANT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

pub const PATTERN_FALLBACK_REGEX: &str = "fallback_regex";

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| threshold_regex(r"\[([^\]]+)\]"));
static PAREN_RE: Lazy<Regex> = Lazy::new(|| threshold_regex(r"\(([^\)]+)\)"));
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)").expect("number regex"));

/// `PRIMARY_CONSTANT [: annotation] = <list>` on a line of its own.
fn threshold_regex(list: &str) -> Regex {
    let pattern = format!(
        r"(?m)^\s*{}\s*(?::[^=\n]*)?=\s*{list}\s*$",
        regex::escape(PRIMARY_CONSTANT)
    );
    Regex::new(&pattern).expect("threshold regex")
}

/// Raw `{thresholds, pattern, name}` for the normalizer, or `None` when the
/// constant is absent or lists no numbers.
pub fn fallback_thresholds(source: &str) -> Option<Value> {
    let inside = BRACKET_RE
        .captures(source)
        .or_else(|| PAREN_RE.captures(source))?
        .get(1)?
        .as_str();

    let thresholds: Vec<f64> = NUMBER_RE
        .find_iter(inside)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect();
    if thresholds.is_empty() {
        return None;
    }

    Some(json!({
        "thresholds": thresholds,
        "pattern": PATTERN_FALLBACK_REGEX,
        "name": PRIMARY_CONSTANT,
    }))
}
