//! Integration tests: run the zone extraction vectors.
//!
//! Each fixture in tests/fixtures/zones/ has:
//! - instrument.py: the instrument source
//! - expect.json: the expected zone contract, plus optional prefixes for
//!   the free-form `fallback_reason` and `error` messages
//!
//! The built-in syntax-tree extractor runs on the source and its serialized
//! contract is compared to the expected one.

use phio_contract::ZoneExtractor;
use serde_json::Value;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/zones")
}

/// Removes a message field from the contract and checks it against an
/// expected prefix. Absent prefix means the field must be absent too.
fn check_message(contract: &mut Value, expected: &Value, field: &str, name: &str) {
    let actual = contract
        .as_object_mut()
        .and_then(|fields| fields.remove(field));
    let prefix_key = format!("{field}_prefix");
    match (expected[prefix_key.as_str()].as_str(), actual) {
        (Some(prefix), Some(Value::String(message))) => assert!(
            message.starts_with(prefix),
            "fixture {name}: {field} {message:?} should start with {prefix:?}"
        ),
        (None, None) => {}
        (prefix, actual) => panic!("fixture {name}: expected {field} prefix {prefix:?}, got {actual:?}"),
    }
}

fn run_fixture(name: &str) {
    let dir = fixtures_dir().join(name);
    let instrument = dir.join("instrument.py");
    let expect_path = dir.join("expect.json");

    let expect_str = std::fs::read_to_string(&expect_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", expect_path.display()));
    let expected: Value = serde_json::from_str(&expect_str)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", expect_path.display()));

    let contract = ZoneExtractor::with_syntax_tree().extract(&instrument);
    let mut contract_json = serde_json::to_value(&contract).expect("failed to serialize contract");

    check_message(&mut contract_json, &expected, "fallback_reason", name);
    check_message(&mut contract_json, &expected, "error", name);

    assert_eq!(
        contract_json,
        expected["contract"],
        "\n\nFixture: {name}\n\nGot:\n{}\n\nExpected:\n{}\n",
        serde_json::to_string_pretty(&contract_json).unwrap(),
        serde_json::to_string_pretty(&expected["contract"]).unwrap(),
    );
}

#[test]
fn golden_assign_thresholds() {
    run_fixture("assign_thresholds");
}

#[test]
fn golden_annotated_tuple() {
    run_fixture("annotated_tuple");
}

#[test]
fn golden_assign_mapping() {
    run_fixture("assign_mapping");
}

#[test]
fn golden_if_chain_ladder() {
    run_fixture("if_chain_ladder");
}

#[test]
fn adversarial_non_increasing_ladder() {
    run_fixture("non_increasing_ladder");
}

#[test]
fn adversarial_parse_error_fallback() {
    run_fixture("parse_error_fallback");
}

#[test]
fn adversarial_parse_error_no_signal() {
    run_fixture("parse_error_no_signal");
}
