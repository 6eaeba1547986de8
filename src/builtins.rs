//! The built-in function library (§5), installed into the bottom scope
//! of every [`crate::environment::Environment`] an [`crate::engine::Engine`]
//! hands out.
//!
//! Grounded on the teacher's `functions.rs` registry pattern: a static
//! `phf::Map` from name to a plain function pointer, wrapped at install
//! time into the same `Value::Function` shape a FEEL-defined function
//! would produce, so the interpreter never has to special-case builtins.

use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::environment::Environment;
use crate::temporal;
use crate::value::{value_equal, FunctionBody, FunctionValue, Value};

type BuiltinFn = fn(&[Value]) -> Value;

static BUILTINS: phf::Map<&'static str, BuiltinFn> = phf::phf_map! {
    "not" => b_not,
    "string length" => b_string_length,
    "substring" => b_substring,
    "upper case" => b_upper_case,
    "lower case" => b_lower_case,
    "number" => b_number,
    "date" => b_date,
    "time" => b_time,
    "date and time" => b_date_and_time,
    "duration" => b_duration,
    "years and months duration" => b_years_and_months_duration,
    "get or else" => b_get_or_else,
    "list contains" => b_list_contains,
    "sum" => b_sum,
    "count" => b_count,
    "and" => b_and,
    "or" => b_or,
};

/// Install every built-in as a `Value::Function` binding in a new scope
/// layered on top of `env` (typically `Environment::root()`).
pub fn install(env: &Environment) -> Environment {
    let mut bindings = HashMap::with_capacity(BUILTINS.len());
    for (name, f) in BUILTINS.entries() {
        let f = *f;
        let func = FunctionValue {
            params: Vec::new(),
            body: FunctionBody::Native(Rc::new(move |args: &[Value]| f(args))),
            var_args: true,
        };
        bindings.insert((*name).to_string(), Value::Function(Rc::new(func)));
    }
    env.push(bindings)
}

fn b_not(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Bool(b)) => Value::Bool(!b),
        Some(Value::Null) | None => Value::Null,
        _ => Value::Null,
    }
}

fn b_string_length(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::Number(Decimal::from(s.chars().count())),
        _ => Value::Null,
    }
}

fn b_substring(args: &[Value]) -> Value {
    let (Some(Value::String(s)), Some(Value::Number(start))) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let Some(start_i) = start.to_i64() else { return Value::Null };
    let start_idx = if start_i > 0 { start_i - 1 } else { len + start_i };
    if start_idx < 0 || start_idx >= len {
        return Value::String(String::new());
    }
    let count = match args.get(2) {
        Some(Value::Number(n)) => n.to_i64().unwrap_or(len - start_idx),
        _ => len - start_idx,
    };
    let end_idx = (start_idx + count.max(0)).min(len);
    if end_idx <= start_idx {
        return Value::String(String::new());
    }
    Value::String(chars[start_idx as usize..end_idx as usize].iter().collect())
}

fn b_upper_case(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.to_uppercase()),
        _ => Value::Null,
    }
}

fn b_lower_case(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.to_lowercase()),
        _ => Value::Null,
    }
}

/// `number(from)` is the one built-in that surfaces a reportable failure
/// (§7 tier 2) rather than staying silently `Null`: a string that isn't
/// a valid numeric literal is a caller mistake worth a warning, not a
/// type mismatch an expression can route around.
fn b_number(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(*n),
        Some(Value::String(s)) => match Decimal::from_str(s.trim()) {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Error(format!("\"{s}\" is not a valid number")),
        },
        _ => Value::Null,
    }
}

fn b_date(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => temporal::parse_date(s).unwrap_or(Value::Null),
        Some(v @ Value::Date(_)) => v.clone(),
        Some(Value::LocalDateTime(dt)) => Value::Date(dt.date()),
        Some(Value::ZonedDateTime(dt)) => Value::Date(dt.naive_local().date()),
        _ => Value::Null,
    }
}

fn b_time(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => temporal::parse_time(s).unwrap_or(Value::Null),
        Some(v @ (Value::LocalTime(_) | Value::ZonedTime(_, _))) => v.clone(),
        Some(Value::LocalDateTime(dt)) => Value::LocalTime(dt.time()),
        Some(Value::ZonedDateTime(dt)) => Value::ZonedTime(dt.naive_local().time(), *dt.offset()),
        _ => Value::Null,
    }
}

fn b_date_and_time(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::String(s)), None) => temporal::parse_date_and_time(s).unwrap_or(Value::Null),
        (Some(Value::Date(d)), Some(Value::LocalTime(t))) => Value::LocalDateTime(chrono::NaiveDateTime::new(*d, *t)),
        (Some(Value::Date(d)), Some(Value::ZonedTime(t, off))) => {
            use chrono::TimeZone;
            off.from_local_datetime(&chrono::NaiveDateTime::new(*d, *t)).single().map(Value::ZonedDateTime).unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn b_duration(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => temporal::parse_duration(s).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn b_years_and_months_duration(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::Date(from)), Some(Value::Date(to))) => {
            use chrono::Datelike;
            let months = (to.year() as i64 * 12 + to.month() as i64 - 1) - (from.year() as i64 * 12 + from.month() as i64 - 1);
            let months = if to.day() < from.day() { months - 1 } else { months };
            Value::YearMonthDuration(months)
        }
        _ => Value::Null,
    }
}

fn b_get_or_else(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Null) | None => args.get(1).cloned().unwrap_or(Value::Null),
        Some(v) => v.clone(),
    }
}

fn b_list_contains(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::List(items)), Some(needle)) => {
            Value::Bool(items.iter().any(|item| matches!(value_equal(item, needle), Value::Bool(true))))
        }
        _ => Value::Null,
    }
}

fn b_sum(args: &[Value]) -> Value {
    let numbers = collect_numbers(args);
    match numbers {
        Some(ns) => Value::Number(ns.into_iter().sum()),
        None => Value::Null,
    }
}

fn b_count(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::List(items)) => Value::Number(Decimal::from(items.len())),
        _ => Value::Number(Decimal::ZERO),
    }
}

fn b_and(args: &[Value]) -> Value {
    let bools = flatten_args(args);
    if bools.iter().any(|v| matches!(v, Value::Bool(false))) {
        Value::Bool(false)
    } else if bools.iter().all(|v| matches!(v, Value::Bool(true))) {
        Value::Bool(true)
    } else {
        Value::Null
    }
}

fn b_or(args: &[Value]) -> Value {
    let bools = flatten_args(args);
    if bools.iter().any(|v| matches!(v, Value::Bool(true))) {
        Value::Bool(true)
    } else if bools.iter().all(|v| matches!(v, Value::Bool(false))) {
        Value::Bool(false)
    } else {
        Value::Null
    }
}

fn flatten_args(args: &[Value]) -> Vec<Value> {
    match args {
        [Value::List(items)] => items.clone(),
        other => other.to_vec(),
    }
}

fn collect_numbers(args: &[Value]) -> Option<Vec<Decimal>> {
    let values = match args {
        [Value::List(items)] => items.clone(),
        other => other.to_vec(),
    };
    values
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_negates_booleans() {
        assert!(matches!(b_not(&[Value::Bool(true)]), Value::Bool(false)));
        assert!(matches!(b_not(&[Value::Null]), Value::Null));
    }

    #[test]
    fn string_length_counts_chars() {
        assert!(matches!(b_string_length(&[Value::string("hello")]), Value::Number(n) if n == Decimal::from(5)));
    }

    #[test]
    fn substring_supports_negative_and_out_of_range_start() {
        let s = Value::string("foobar");
        assert_eq!(b_substring(&[s.clone(), Value::Number(Decimal::from(4))]).to_string(), "\"bar\"");
        assert_eq!(b_substring(&[s, Value::Number(Decimal::from(-3))]).to_string(), "\"bar\"");
    }

    #[test]
    fn list_contains_uses_feel_equality() {
        let list = Value::List(vec![Value::Number(Decimal::from(1)), Value::Number(Decimal::from(2))]);
        assert!(matches!(b_list_contains(&[list, Value::Number(Decimal::from(2))]), Value::Bool(true)));
    }

    #[test]
    fn sum_and_count_over_a_list() {
        let list = Value::List(vec![Value::Number(Decimal::from(1)), Value::Number(Decimal::from(2)), Value::Number(Decimal::from(3))]);
        assert!(matches!(b_sum(&[list.clone()]), Value::Number(n) if n == Decimal::from(6)));
        assert!(matches!(b_count(&[list]), Value::Number(n) if n == Decimal::from(3)));
    }

    #[test]
    fn and_or_are_three_valued() {
        assert!(matches!(b_and(&[Value::Bool(false), Value::Null]), Value::Bool(false)));
        assert!(matches!(b_or(&[Value::Bool(true), Value::Null]), Value::Bool(true)));
        assert!(matches!(b_and(&[Value::Bool(true), Value::Null]), Value::Null));
    }

    #[test]
    fn number_reports_failure_on_malformed_input() {
        assert!(matches!(b_number(&[Value::string("not a number")]), Value::Error(_)));
        assert!(matches!(b_number(&[Value::string(" 42 ")]), Value::Number(n) if n == Decimal::from(42)));
    }

    #[test]
    fn install_binds_every_name() {
        let env = install(&Environment::root());
        assert!(env.contains("string length"));
        assert!(env.contains("date and time"));
    }
}
