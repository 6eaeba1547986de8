//! The "Universal properties" bullets of §8, each checked against a
//! handful of representative values rather than an exhaustive sweep —
//! these are algebraic invariants, not a round-trip grid.

mod support;

use feel_lang::Value;
use rust_decimal::Decimal;
use support::eval;

fn is_number(v: &Value, n: i64) -> bool {
    matches!(v, Value::Number(x) if *x == Decimal::from(n))
}

#[test]
fn equality_is_reflexive_including_null() {
    assert!(matches!(eval("1 = 1"), Value::Bool(true)));
    assert!(matches!(eval(r#""x" = "x""#), Value::Bool(true)));
    assert!(matches!(eval("[1,2] = [1,2]"), Value::Bool(true)));
    assert!(matches!(eval("null = null"), Value::Bool(true)));
}

#[test]
fn additive_and_multiplicative_identities() {
    for x in [-7, 0, 3, 42] {
        assert!(is_number(&eval(&format!("{x} + 0")), x));
        assert!(is_number(&eval(&format!("{x} * 1")), x));
        assert!(is_number(&eval(&format!("{x} - {x}")), 0));
    }
}

#[test]
fn list_self_equality_and_indexing_identities() {
    assert!(matches!(eval("[10,20,30] = [10,20,30]"), Value::Bool(true)));
    let list = "[10,20,30]";
    for (i, want) in [(1, 10), (2, 20), (3, 30)] {
        assert!(is_number(&eval(&format!("{list}[{i}]")), want));
    }
    // xs[-i] = xs[|xs| - i + 1]
    for i in 1..=3 {
        let forward = 3 - i + 1;
        assert_eq!(eval(&format!("{list}[-{i}]")).to_string(), eval(&format!("{list}[{forward}]")).to_string());
    }
}

#[test]
fn ascending_and_descending_ranges_materialize_via_for() {
    match eval("for i in 1..5 return i") {
        Value::List(items) => {
            let got: Vec<i64> = items.iter().map(|v| match v {
                Value::Number(n) => n.to_string().parse().unwrap(),
                other => panic!("unexpected: {other:?}"),
            }).collect();
            assert_eq!(got, vec![1, 2, 3, 4, 5]);
        }
        other => panic!("unexpected: {other:?}"),
    }

    match eval("for i in 5..1 return i") {
        Value::List(items) => {
            let got: Vec<i64> = items.iter().map(|v| match v {
                Value::Number(n) => n.to_string().parse().unwrap(),
                other => panic!("unexpected: {other:?}"),
            }).collect();
            assert_eq!(got, vec![5, 4, 3, 2, 1]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn every_satisfies_is_vacuously_true_on_empty_list() {
    assert!(matches!(eval("every e in [] satisfies e > 1000"), Value::Bool(true)));
}

#[test]
fn every_satisfies_is_true_iff_no_element_fails() {
    assert!(matches!(eval("every e in [2,4,6] satisfies e > 0"), Value::Bool(true)));
    assert!(matches!(eval("every e in [2,4,-6] satisfies e > 0"), Value::Bool(false)));
}
