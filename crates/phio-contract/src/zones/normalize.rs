//! Coerces raw strategy output into the uniform `{constants, if_chain}` shape.
//!
//! Accepted raw shapes, checked in order:
//! - `{"thresholds": [n, ...]}` becomes `THRESH_<i>` constants;
//! - `{"mapping": {k: v}}` keeps scalar values under their own keys;
//! - `{"constants": {...}}` and/or `{"if_chain": [...]}` pass through.
//!
//! `pattern` and `name` are taken from the raw object when present.

use super::{Comparator, ConstantMap, IfChainLink, ZoneLiteral};
use crate::error::ExtractionFailure;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedZones {
    pub constants: ConstantMap,
    pub if_chain: Vec<IfChainLink>,
    pub pattern: String,
    pub name: Option<String>,
}

pub fn normalize(raw: &Value) -> Result<NormalizedZones, ExtractionFailure> {
    let Value::Object(object) = raw else {
        return Err(ExtractionFailure::UnrecognizedShape(format!(
            "extractor returned non-object: {}",
            json_type_name(raw)
        )));
    };

    let name = object.get("name").and_then(Value::as_str).map(str::to_string);
    let pattern_or = |default: &str| {
        object
            .get("pattern")
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    if let Some(Value::Array(thresholds)) = object.get("thresholds") {
        let mut constants = ConstantMap::default();
        let numbers = thresholds.iter().filter_map(Value::as_f64);
        for (idx, threshold) in numbers.enumerate() {
            constants.insert(format!("THRESH_{idx}"), ZoneLiteral::Float(threshold));
        }
        return Ok(NormalizedZones {
            constants,
            if_chain: Vec::new(),
            pattern: pattern_or("thresholds"),
            name,
        });
    }

    if let Some(Value::Object(mapping)) = object.get("mapping") {
        let constants = mapping
            .iter()
            .map(|(key, value)| (key.clone(), ZoneLiteral::from_json(value)))
            .filter(|(_, literal)| literal.is_scalar())
            .collect();
        return Ok(NormalizedZones {
            constants,
            if_chain: Vec::new(),
            pattern: pattern_or("mapping"),
            name,
        });
    }

    let constants = object.get("constants").and_then(Value::as_object);
    let if_chain = object.get("if_chain").and_then(Value::as_array);
    if constants.is_some() || if_chain.is_some() {
        return Ok(NormalizedZones {
            constants: constants.map(passthrough_constants).unwrap_or_default(),
            if_chain: if_chain
                .map(|links| links.iter().filter_map(parse_link).collect())
                .unwrap_or_default(),
            pattern: pattern_or("static"),
            name,
        });
    }

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    Err(ExtractionFailure::UnrecognizedShape(format!(
        "extractor returned object without recognized keys: {}",
        keys.join(", ")
    )))
}

fn passthrough_constants(constants: &Map<String, Value>) -> ConstantMap {
    constants
        .iter()
        .map(|(key, value)| (key.clone(), ZoneLiteral::from_json(value)))
        .collect()
}

/// `[comparator, threshold, label]` or `{comparator|op, threshold, label}`.
fn parse_link(link: &Value) -> Option<IfChainLink> {
    let (comparator, threshold, label) = match link {
        Value::Array(parts) if parts.len() == 3 => (&parts[0], &parts[1], &parts[2]),
        Value::Object(fields) => (
            fields.get("comparator").or_else(|| fields.get("op"))?,
            fields.get("threshold")?,
            fields.get("label")?,
        ),
        _ => return None,
    };
    Some(IfChainLink {
        comparator: comparator.as_str()?.parse::<Comparator>().ok()?,
        threshold: threshold.as_f64()?,
        label: label.as_str()?.to_string(),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionFailureKind;
    use serde_json::json;

    #[test]
    fn thresholds_become_thresh_constants() {
        let normalized = normalize(&json!({
            "thresholds": [0.5, "x", true, 2],
            "pattern": "fallback_regex",
            "name": "ZONE_THRESHOLDS",
        }))
        .expect("thresholds shape");
        assert_eq!(
            normalized.constants,
            ConstantMap::from_iter([
                ("THRESH_0".to_string(), ZoneLiteral::Float(0.5)),
                ("THRESH_1".to_string(), ZoneLiteral::Float(2.0)),
            ])
        );
        assert_eq!(normalized.pattern, "fallback_regex");
        assert_eq!(normalized.name.as_deref(), Some("ZONE_THRESHOLDS"));
    }

    #[test]
    fn mapping_drops_non_scalars_and_defaults_pattern() {
        let normalized = normalize(&json!({
            "mapping": {"A": 1, "B": "green", "C": false, "D": [1]},
        }))
        .expect("mapping shape");
        assert_eq!(normalized.pattern, "mapping");
        let keys: Vec<&str> = normalized.constants.keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn passthrough_parses_links_in_both_forms() {
        let normalized = normalize(&json!({
            "constants": {"ZONE_IF_LABEL_0": "A", "NESTED": {"x": 1}},
            "if_chain": [
                ["Lt", 1.0, "A"],
                {"op": "LtE", "threshold": 2, "label": "B"},
                ["Gt", 3.0, "C"],
                "garbage",
            ],
        }))
        .expect("passthrough shape");
        assert_eq!(normalized.pattern, "static");
        assert_eq!(normalized.constants.len(), 2);
        assert_eq!(
            normalized.if_chain,
            vec![
                IfChainLink {
                    comparator: Comparator::Lt,
                    threshold: 1.0,
                    label: "A".to_string(),
                },
                IfChainLink {
                    comparator: Comparator::LtE,
                    threshold: 2.0,
                    label: "B".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unrecognized_shapes_are_diagnosed() {
        let err = normalize(&json!([1, 2])).expect_err("array is not an object");
        assert_eq!(err.kind(), ExtractionFailureKind::UnrecognizedShape);
        assert_eq!(err.to_string(), "extractor returned non-object: array");

        let err = normalize(&json!({"zeta": 1, "alpha": 2})).expect_err("no known keys");
        assert_eq!(
            err.to_string(),
            "extractor returned object without recognized keys: alpha, zeta"
        );
    }
}
