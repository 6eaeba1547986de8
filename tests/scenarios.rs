//! The concrete scenario table (§8): each row reproduced verbatim
//! against the public `Engine` entry point rather than the internal
//! interpreter, so these exercise the whole parse-then-evaluate path.

mod support;

use feel_lang::Value;
use rust_decimal::Decimal;
use support::{eval, eval_with, test_unary};

fn is_number(v: &Value, n: i64) -> bool {
    matches!(v, Value::Number(x) if *x == Decimal::from(n))
}

#[test]
fn arithmetic_precedence() {
    assert!(is_number(&eval("2 * (3 + 5)"), 16));
    assert!(is_number(&eval("10 ** 5"), 100000));
}

#[test]
fn division_by_zero_is_null() {
    assert!(matches!(eval("0.0 / 0.0"), Value::Null));
}

#[test]
fn string_concatenation_and_type_mismatch() {
    assert!(matches!(eval(r#""a" + "b""#), Value::String(s) if s == "ab"));
    assert!(matches!(eval(r#"1 + "a""#), Value::Null));
}

#[test]
fn date_subtraction_and_duration_addition() {
    assert!(matches!(eval(r#"date("2012-12-25") - date("2012-12-24") = duration("P1D")"#), Value::Bool(true)));
    assert!(matches!(eval(r#"date("2023-10-06") + duration("P1M") = date("2023-11-06")"#), Value::Bool(true)));
}

#[test]
fn context_entries_see_earlier_siblings() {
    assert!(is_number(&eval("({foo: function(x) x + 5, bar: foo(5)}).bar"), 10));
}

#[test]
fn for_expression_partial_accumulator_builds_factorials() {
    match eval("for i in 0..4 return if i = 0 then 1 else i * partial[-1]") {
        Value::List(items) => {
            let expected = [1, 1, 2, 6, 24];
            assert_eq!(items.len(), expected.len());
            for (got, want) in items.iter().zip(expected.iter()) {
                assert!(is_number(got, *want));
            }
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn every_over_empty_list_from_context_is_true() {
    let result = eval_with("every b in a satisfies b < 10", &serde_json::json!({"a": []}));
    assert!(matches!(result, Value::Bool(true)));
}

#[test]
fn list_indexing_is_one_based_and_total() {
    assert!(is_number(&eval("[1,2,3][-1]"), 3));
    assert!(matches!(eval("[1,2,3][0]"), Value::Null));
    assert!(matches!(eval("[1,2,3][4]"), Value::Null));
}

#[test]
fn filter_with_qualified_predicate() {
    match eval("[{a:1},{a:2},{a:3}][item.a >= 2]") {
        Value::List(items) => {
            assert_eq!(items.len(), 2);
            assert!(matches!(items[0].context_get("a"), Some(Value::Number(n)) if *n == Decimal::from(2)));
            assert!(matches!(items[1].context_get("a"), Some(Value::Number(n)) if *n == Decimal::from(3)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn filter_predicate_context_key_shadows_implicit_item() {
    match eval("[{item: 1}, {item: 2}, {item: 3}][item >= 2]") {
        Value::List(items) => assert_eq!(items.len(), 2),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn boolean_conjunction_and_disjunction_with_non_bool_operand() {
    assert!(matches!(eval("false and 1"), Value::Bool(false)));
    assert!(matches!(eval("true and 1"), Value::Null));
    assert!(matches!(eval("false or true"), Value::Bool(true)));
    assert!(matches!(eval("false or 1"), Value::Null));
}

#[test]
fn in_against_a_disjunction_of_tests_and_null() {
    assert!(matches!(eval("5 in (> 0, <10)"), Value::Bool(true)));
    assert!(matches!(eval(r#""d" in null"#), Value::Bool(false)));
}

#[test]
fn unary_test_greater_than_with_null_input() {
    assert!(matches!(test_unary("> 5", serde_json::Value::Null), Value::Null));
}

#[test]
fn unary_test_not_of_a_literal() {
    assert!(matches!(test_unary("not(5)", serde_json::json!(5)), Value::Bool(false)));
    assert!(matches!(test_unary("not(5)", serde_json::json!(0)), Value::Bool(true)));
}

#[test]
fn unary_test_closed_vs_open_range() {
    assert!(matches!(test_unary("[4..6]", serde_json::json!(4)), Value::Bool(true)));
    assert!(matches!(test_unary("[4..6]", serde_json::json!(6)), Value::Bool(true)));
    assert!(matches!(test_unary("]4..6[", serde_json::json!(4)), Value::Bool(false)));
    assert!(matches!(test_unary("]4..6[", serde_json::json!(6)), Value::Bool(false)));
}
