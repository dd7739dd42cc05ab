//! Zone contract: thresholds and labels the instrument declares in source.
//!
//! [`ZoneExtractor`] runs an optional primary [`ZoneExtractionStrategy`],
//! falls back to a regex over the source text when the primary has nothing
//! usable, and normalizes whichever answered into a [`ZoneContract`]. It
//! never fails; every problem is recorded in the contract.

pub mod fallback;
pub mod normalize;
pub mod patterns;
pub mod python;
pub mod strategy;
pub mod syntax;

pub use fallback::fallback_thresholds;
pub use normalize::{NormalizedZones, normalize};
pub use patterns::SyntaxTreeStrategy;
pub use python::PythonSyntax;
pub use strategy::{CommandStrategy, ZoneExtractionStrategy};
pub use syntax::{SyntaxError, SyntaxTreeProvider};

use crate::error::{ExtractionFailure, ExtractionFailureKind};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A constant value as declared by the instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ZoneLiteral {
    Integer(i64),
    Float(f64),
    Text(String),
    /// Anything non-scalar a passthrough extractor reported.
    Other(Value),
}

impl ZoneLiteral {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Integer(int),
                None => number
                    .as_f64()
                    .map(Self::Float)
                    .unwrap_or_else(|| Self::Other(value.clone())),
            },
            Value::String(text) => Self::Text(text.clone()),
            other => Self::Other(other.clone()),
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Insertion-ordered constant table, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantMap(Vec<(String, ZoneLiteral)>);

impl ConstantMap {
    /// Replaces an existing key in place, otherwise appends.
    pub fn insert(&mut self, key: String, value: ZoneLiteral) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ZoneLiteral> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZoneLiteral)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The public `zones` view: scalar entries only.
    pub fn scalars(&self) -> Self {
        self.0
            .iter()
            .filter(|(_, value)| value.is_scalar())
            .cloned()
            .collect()
    }
}

impl FromIterator<(String, ZoneLiteral)> for ConstantMap {
    fn from_iter<I: IntoIterator<Item = (String, ZoneLiteral)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Serialize for ConstantMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    Lt,
    LtE,
}

impl std::str::FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Lt" | "<" => Ok(Self::Lt),
            "LtE" | "<=" => Ok(Self::LtE),
            _ => Err(format!("unsupported comparator: {s}")),
        }
    }
}

/// One ladder rung, serialized as `[comparator, threshold, label]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfChainLink {
    pub comparator: Comparator,
    pub threshold: f64,
    pub label: String,
}

impl Serialize for IfChainLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.comparator)?;
        tuple.serialize_element(&self.threshold)?;
        tuple.serialize_element(&self.label)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Static,
    StaticFailed,
    FallbackRegex,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::StaticFailed => "static_failed",
            Self::FallbackRegex => "fallback_regex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneContract {
    /// False only when the source could not be read by any strategy.
    pub attempted: bool,
    pub extraction_method: ExtractionMethod,
    #[serde(rename = "pattern")]
    pub source_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub constants: ConstantMap,
    pub zones: ConstantMap,
    pub if_chain: Vec<IfChainLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<ExtractionFailureKind>,
}

impl ZoneContract {
    fn blank() -> Self {
        Self {
            attempted: true,
            extraction_method: ExtractionMethod::StaticFailed,
            source_pattern: patterns::PATTERN_NONE.to_string(),
            name: None,
            strategy: None,
            constants: ConstantMap::default(),
            zones: ConstantMap::default(),
            if_chain: Vec::new(),
            fallback_reason: None,
            error: None,
            failure_kind: None,
        }
    }

    fn fail(mut self, failure: &ExtractionFailure) -> Self {
        self.extraction_method = ExtractionMethod::StaticFailed;
        self.error = Some(failure.to_string());
        self.failure_kind = Some(failure.kind());
        self
    }

    fn apply(mut self, normalized: NormalizedZones, method: ExtractionMethod) -> Self {
        self.extraction_method = method;
        self.zones = normalized.constants.scalars();
        self.constants = normalized.constants;
        self.if_chain = normalized.if_chain;
        self.source_pattern = normalized.pattern;
        self.name = normalized.name;
        self
    }
}

#[derive(Default)]
pub struct ZoneExtractor {
    strategy: Option<Box<dyn ZoneExtractionStrategy>>,
}

impl ZoneExtractor {
    pub fn new(strategy: Option<Box<dyn ZoneExtractionStrategy>>) -> Self {
        Self { strategy }
    }

    /// Built-in syntax-tree strategy with the Python provider.
    pub fn with_syntax_tree() -> Self {
        Self::new(Some(Box::new(SyntaxTreeStrategy::default())))
    }

    pub fn strategy_name(&self) -> Option<&str> {
        self.strategy.as_deref().map(|strategy| strategy.name())
    }

    pub fn extract(&self, target: &Path) -> ZoneContract {
        let mut contract = ZoneContract::blank();
        let mut primary_failure = None;

        let fallback_reason = match self.strategy.as_deref() {
            Some(strategy) => {
                contract.strategy = Some(strategy.name().to_string());
                match strategy.extract(target) {
                    Ok(Some(raw)) => return finish(contract, &raw, ExtractionMethod::Static),
                    Ok(None) => format!("{} strategy produced no result", strategy.name()),
                    Err(failure) if failure.kind() == ExtractionFailureKind::UnrecognizedShape => {
                        tracing::warn!(instrument = %target.display(), error = %failure, "zone extractor returned an unrecognized shape");
                        return contract.fail(&failure);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            instrument = %target.display(),
                            strategy = strategy.name(),
                            error = %failure,
                            "zone strategy failed, trying fallback"
                        );
                        let reason = failure.to_string();
                        primary_failure = Some(failure);
                        reason
                    }
                }
            }
            None => "no static strategy configured".to_string(),
        };
        contract.fallback_reason = Some(fallback_reason.clone());

        let source = match fs::read(target) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                let failure = ExtractionFailure::Read(format!("{}: {err}", target.display()));
                contract.attempted = false;
                return contract.fail(&failure);
            }
        };

        if let Some(raw) = fallback_thresholds(&source) {
            return finish(contract, &raw, ExtractionMethod::FallbackRegex);
        }

        match primary_failure {
            Some(failure) => contract.fail(&failure),
            None => {
                contract.error = Some(format!("no zone signal source: {fallback_reason}"));
                contract.failure_kind = Some(ExtractionFailureKind::NoSignalSource);
                contract
            }
        }
    }
}

fn finish(contract: ZoneContract, raw: &Value, method: ExtractionMethod) -> ZoneContract {
    match normalize(raw) {
        Ok(normalized) => contract.apply(normalized, method),
        Err(failure) => {
            tracing::warn!(error = %failure, "zone extraction output not normalizable");
            contract.fail(&failure)
        }
    }
}
