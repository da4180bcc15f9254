use std::collections::BTreeSet;

use redline_common::protocol::jsonrpc::SUPPORTED_PROTOCOL_VERSIONS;
use redline_common::protocol::methods::{IMPLEMENTED_METHODS, SESSION_POLICY};

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/jsonrpc-methods.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

#[test]
fn implemented_methods_match_contract() {
    let contract = load_contract();
    let expected: BTreeSet<&str> = contract["implemented_methods"]
        .as_array()
        .expect("implemented_methods should be an array")
        .iter()
        .map(|v| v.as_str().expect("method should be a string"))
        .collect();

    let actual: BTreeSet<&str> = IMPLEMENTED_METHODS.iter().copied().collect();
    assert_eq!(actual, expected, "IMPLEMENTED_METHODS diverged from contract");
}

#[test]
fn rpc_protocol_versions_match_contract() {
    let contract = load_contract();
    let expected: Vec<&str> = contract["rpc_protocol_versions"]
        .as_array()
        .expect("rpc_protocol_versions should be an array")
        .iter()
        .map(|v| v.as_str().expect("version should be a string"))
        .collect();

    assert_eq!(
        SUPPORTED_PROTOCOL_VERSIONS,
        &expected[..],
        "SUPPORTED_PROTOCOL_VERSIONS diverged from contract"
    );
}

#[test]
fn session_policy_matches_contract() {
    let contract = load_contract();
    assert_eq!(
        contract["session_policy"].as_str(),
        Some(SESSION_POLICY),
        "SESSION_POLICY diverged from contract"
    );
}

#[test]
fn method_names_are_unique() {
    let unique: BTreeSet<&str> = IMPLEMENTED_METHODS.iter().copied().collect();
    assert_eq!(unique.len(), IMPLEMENTED_METHODS.len(), "duplicate method name in contract list");
}
