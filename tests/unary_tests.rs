//! Unary-test matching (§4.3.10), beyond what `scenarios.rs` already
//! covers from the §8 table: comparison tests, a disjunction, and the
//! match-any `-` wildcard.

mod support;

use feel_lang::Value;
use support::test_unary;

#[test]
fn match_any_wildcard_always_matches() {
    assert!(matches!(test_unary("-", serde_json::json!(42)), Value::Bool(true)));
    assert!(matches!(test_unary("-", serde_json::Value::Null), Value::Bool(true)));
}

#[test]
fn comparison_tests_against_input() {
    assert!(matches!(test_unary("<= 10", serde_json::json!(10)), Value::Bool(true)));
    assert!(matches!(test_unary("<= 10", serde_json::json!(11)), Value::Bool(false)));
    assert!(matches!(test_unary(">= 10", serde_json::json!(9)), Value::Bool(false)));
}

#[test]
fn disjunction_of_tests_matches_any_branch() {
    assert!(matches!(test_unary("1, 2, 3", serde_json::json!(2)), Value::Bool(true)));
    assert!(matches!(test_unary("1, 2, 3", serde_json::json!(9)), Value::Bool(false)));
}

#[test]
fn bare_string_literal_test_is_plain_equality() {
    assert!(matches!(test_unary(r#""open""#, serde_json::json!("open")), Value::Bool(true)));
    assert!(matches!(test_unary(r#""open""#, serde_json::json!("closed")), Value::Bool(false)));
}
