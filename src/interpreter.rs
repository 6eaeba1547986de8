//! The AST-walking evaluator (§4.3).
//!
//! [`evaluate`] is total: it never panics and never returns a `Result`.
//! Anything that would be a runtime error in a conventional language —
//! an undeclared reference, a type mismatch, division by zero, an
//! ill-formed range — becomes `Value::Null` instead, per §4.3.1's
//! null-propagation rule. The only escape hatch is `Value::Error`,
//! which a handful of builtins use to surface a message a caller can
//! inspect; the engine façade logs and downgrades it to a warning
//! rather than aborting.
//!
//! A `RefCell<Vec<Warning>>` is threaded through every call instead of
//! a global, so two concurrent evaluations on different threads (or a
//! function calling back into the interpreter re-entrantly) each keep
//! their own diagnostics without interfering with one another (§4.4).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::ast::{ArithOp, Args, CmpOp, Expr, QuantKind, RangeEndpoint};
use crate::engine::{Warning, WarningKind};
use crate::environment::Environment;
use crate::value::{value_cmp, value_equal, Bound, FunctionBody, FunctionValue, Range, Value};

type Warnings = RefCell<Vec<Warning>>;

fn warn(warnings: &Warnings, kind: WarningKind, message: impl Into<String>) {
    warnings.borrow_mut().push(Warning { kind, message: message.into() });
}

/// Most FEEL calls pass a handful of arguments; a small inline buffer
/// avoids a heap allocation for the common case (§4.3.9).
type PositionalArgs = SmallVec<[Value; 4]>;

/// Positional or named argument values, already evaluated.
enum ArgValues {
    Positional(PositionalArgs),
    Named(Vec<(String, Value)>),
}

impl ArgValues {
    /// Fetch the argument feeding parameter `name` at position `index`.
    /// A missing named parameter is a surfaced failure (§7 tier 2); a
    /// missing positional argument (arity mismatch) stays silent (§4.3.9).
    fn get(&self, index: usize, name: &str, warnings: &Warnings) -> Value {
        match self {
            ArgValues::Positional(values) => values.get(index).cloned().unwrap_or(Value::Null),
            ArgValues::Named(pairs) => match pairs.iter().find(|(k, _)| k == name) {
                Some((_, v)) => v.clone(),
                None => {
                    warn(warnings, WarningKind::AssertionFailure, format!("missing named parameter `{name}`"));
                    Value::Null
                }
            },
        }
    }

    fn into_positional(self) -> Vec<Value> {
        match self {
            ArgValues::Positional(values) => values.into_vec(),
            ArgValues::Named(pairs) => pairs.into_iter().map(|(_, v)| v).collect(),
        }
    }
}

fn eval_args(args: &Args, env: &Environment, input: &Value, warnings: &Warnings) -> ArgValues {
    match args {
        Args::Positional(exprs) => {
            ArgValues::Positional(exprs.iter().map(|e| evaluate(e, env, input, warnings)).collect())
        }
        Args::Named(pairs) => {
            ArgValues::Named(pairs.iter().map(|(k, e)| (k.clone(), evaluate(e, env, input, warnings))).collect())
        }
    }
}

fn call_function(func: &FunctionValue, args: ArgValues, warnings: &Warnings) -> Value {
    match &func.body {
        FunctionBody::Native(f) => {
            let result = f(&args.into_positional());
            if let Value::Error(msg) = &result {
                warn(warnings, WarningKind::FunctionInvocationFailure, msg.clone());
                return Value::Null;
            }
            result
        }
        FunctionBody::Interpreted { body, closure } => {
            let mut bindings = HashMap::with_capacity(func.params.len());
            for (i, name) in func.params.iter().enumerate() {
                bindings.insert(name.clone(), args.get(i, name, warnings));
            }
            let call_env = closure.push(bindings);
            evaluate(body, &call_env, &Value::Null, warnings)
        }
    }
}

/// Evaluate `expr` in `env`, with `input` bound as the implicit value
/// referenced by `?` (only meaningful while evaluating a unary test).
pub fn evaluate(expr: &Expr, env: &Environment, input: &Value, warnings: &Warnings) -> Value {
    match expr {
        Expr::NullLit => Value::Null,
        Expr::BoolLit(b) => Value::Bool(*b),
        Expr::NumberLit(n) => Value::Number(*n),
        Expr::StringLit(s) => Value::String(s.clone()),
        Expr::Input => input.clone(),

        Expr::ListLit(items) => Value::List(items.iter().map(|e| evaluate(e, env, input, warnings)).collect()),
        Expr::ContextLit(entries) => {
            let mut result = Vec::with_capacity(entries.len());
            let mut scope_bindings = HashMap::new();
            for (name, expr) in entries {
                // Later entries can reference earlier ones (§3.2): each
                // key is evaluated in an environment extended by its
                // predecessors.
                let scoped_env = env.push(scope_bindings.clone());
                let v = evaluate(expr, &scoped_env, input, warnings);
                scope_bindings.insert(name.clone(), v.clone());
                result.push((name.clone(), v));
            }
            Value::Context(result)
        }
        Expr::ConstRange { lower, upper } => eval_range(lower, upper, env, input, warnings)
            .map(|r| Value::Range(Box::new(r)))
            .unwrap_or(Value::Null),

        Expr::Ref(path) => {
            let mut current = match env.lookup(&path[0]) {
                Some(v) => v,
                None => {
                    warn(warnings, WarningKind::NoVariableFound, format!("undeclared variable `{}`", path[0]));
                    return Value::Null;
                }
            };
            // Navigating into the resolved value (`a.b.c`) is a context
            // lookup, not a variable lookup: a missing key here stays
            // silent per §4.3.5.
            for segment in &path[1..] {
                current = match current.context_get(segment) {
                    Some(v) => v.clone(),
                    None => return Value::Null,
                };
            }
            current
        }

        Expr::Neg(inner) => match evaluate(inner, env, input, warnings) {
            Value::Number(n) => Value::Number(-n),
            Value::YearMonthDuration(m) => Value::YearMonthDuration(-m),
            Value::DayTimeDuration(d) => Value::DayTimeDuration(-d),
            _ => Value::Null,
        },

        Expr::Arith { op, left, right } => {
            let l = evaluate(left, env, input, warnings);
            let r = evaluate(right, env, input, warnings);
            eval_arith(*op, &l, &r)
        }

        Expr::And(left, right) => {
            let l = evaluate(left, env, input, warnings);
            if matches!(l, Value::Bool(false)) {
                return Value::Bool(false);
            }
            let r = evaluate(right, env, input, warnings);
            match (l, r) {
                (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                (_, Value::Bool(false)) => Value::Bool(false),
                _ => Value::Null,
            }
        }
        Expr::Or(left, right) => {
            let l = evaluate(left, env, input, warnings);
            if matches!(l, Value::Bool(true)) {
                return Value::Bool(true);
            }
            let r = evaluate(right, env, input, warnings);
            match (l, r) {
                (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                (_, Value::Bool(true)) => Value::Bool(true),
                _ => Value::Null,
            }
        }

        Expr::Compare { op, left, right } => {
            let l = evaluate(left, env, input, warnings);
            let r = evaluate(right, env, input, warnings);
            eval_compare(*op, &l, &r)
        }

        Expr::Between { value, lower, upper } => {
            let v = evaluate(value, env, input, warnings);
            let lo = evaluate(lower, env, input, warnings);
            let hi = evaluate(upper, env, input, warnings);
            match (value_cmp(&v, &lo), value_cmp(&v, &hi)) {
                (Some(lo_ord), Some(hi_ord)) => {
                    Value::Bool(lo_ord != std::cmp::Ordering::Less && hi_ord != std::cmp::Ordering::Greater)
                }
                _ => Value::Null,
            }
        }

        Expr::InstanceOf { value, type_name } => {
            let v = evaluate(value, env, input, warnings);
            Value::Bool(matches_type(&v, type_name))
        }

        Expr::In { value, tests } => {
            let v = evaluate(value, env, input, warnings);
            // `in` is total (§4.3.7): a Null result from the underlying
            // test (e.g. comparing across incompatible kinds) is coerced
            // to `false` rather than leaking through.
            match match_unary_test(tests, env, &v, warnings) {
                Value::Bool(b) => Value::Bool(b),
                _ => Value::Bool(false),
            }
        }

        Expr::If { cond, then_branch, else_branch } => {
            if matches!(evaluate(cond, env, input, warnings), Value::Bool(true)) {
                evaluate(then_branch, env, input, warnings)
            } else {
                evaluate(else_branch, env, input, warnings)
            }
        }

        Expr::For { iterators, body } => match cartesian_bindings(iterators, env, input, warnings) {
            None => Value::Null,
            Some(combos) => {
                let mut results = Vec::with_capacity(combos.len());
                for scope in combos {
                    // `partial` is bound to the results produced so far
                    // in this iteration, before the body for this combo
                    // runs (§4.3.3) — this is what lets e.g. a running
                    // factorial be expressed as `i * partial[-1]`.
                    let iter_scope = scope.push_one("partial", Value::List(results.clone()));
                    let v = evaluate(body, &iter_scope, input, warnings);
                    results.push(v);
                }
                Value::List(results)
            }
        },

        Expr::Quantified { kind, iterators, condition } => match cartesian_bindings(iterators, env, input, warnings) {
            None => Value::Null,
            Some(combos) => match kind {
                // `.any`/`.all` over an empty iterator already produce
                // the correct vacuous-truth values (§4.3.4).
                QuantKind::Some => {
                    Value::Bool(combos.iter().any(|scope| matches!(evaluate(condition, scope, input, warnings), Value::Bool(true))))
                }
                QuantKind::Every => {
                    Value::Bool(combos.iter().all(|scope| matches!(evaluate(condition, scope, input, warnings), Value::Bool(true))))
                }
            },
        },

        Expr::FunctionDefinition { params, body } => Value::Function(Rc::new(FunctionValue {
            params: params.clone(),
            body: FunctionBody::Interpreted { body: Rc::new((**body).clone()), closure: env.clone() },
            var_args: false,
        })),

        Expr::FunctionInvocation { name, args } => {
            let arg_values = eval_args(args, env, input, warnings);
            match env.lookup(name) {
                Some(Value::Function(f)) => call_function(&f, arg_values, warnings),
                // Unknown name or a non-function value bound to it: both
                // are silent per §4.3.9 ("unknown function name yields
                // Null", "invocation of a non-function value yields Null").
                _ => Value::Null,
            }
        }

        Expr::QualifiedFunctionInvocation { target, name, args } => {
            let target_value = evaluate(target, env, input, warnings);
            let arg_values = eval_args(args, env, input, warnings);
            match target_value.context_get(name) {
                Some(Value::Function(f)) => call_function(f, arg_values, warnings),
                _ => Value::Null,
            }
        }

        Expr::PathExpression { base, name } => {
            let base_value = evaluate(base, env, input, warnings);
            project_path(&base_value, name)
        }

        Expr::Filter { base, predicate } => {
            let base_value = evaluate(base, env, input, warnings);
            match &base_value {
                Value::List(items) => filter_list(items, predicate, env, input, warnings),
                // Null or any scalar: no implicit scalar-to-list promotion (§4.3.6).
                _ => Value::Null,
            }
        }

        // Unary-test-only forms evaluated as plain expressions make no sense on
        // their own; they are only ever reached through match_unary_test.
        Expr::InputEqualTo(_)
        | Expr::InputLessThan(_)
        | Expr::InputLessOrEqual(_)
        | Expr::InputGreaterThan(_)
        | Expr::InputGreaterOrEqual(_)
        | Expr::InputInRange { .. }
        | Expr::UnaryTestExpression(_)
        | Expr::AtLeastOne(_)
        | Expr::Negation(_)
        | Expr::MatchAny => match_unary_test(expr, env, input, warnings),
    }
}

/// Evaluate `expr` as a unary test against `input` (§4.3.10), yielding
/// `Bool(true)`/`Bool(false)` or `Null` when the test can't be decided.
pub fn match_unary_test(expr: &Expr, env: &Environment, input: &Value, warnings: &Warnings) -> Value {
    match expr {
        Expr::MatchAny => Value::Bool(true),
        Expr::UnaryTestExpression(inner) => {
            // Evaluate as a plain expression with `?` already bound to
            // `input`; a non-Bool result is then compared for equality
            // against `input` (§4.3.10).
            match evaluate(inner, env, input, warnings) {
                Value::Bool(b) => Value::Bool(b),
                other => value_equal(input, &other),
            }
        }
        Expr::Negation(tests) => {
            let results: Vec<Value> = tests.iter().map(|t| match_unary_test(t, env, input, warnings)).collect();
            // not(...) is total: Null (the mixed/undecided case) maps to
            // false rather than propagating (§4.3.10).
            Value::Bool(!results.iter().any(|v| matches!(v, Value::Bool(true))))
        }
        Expr::AtLeastOne(tests) => {
            let results: Vec<Value> = tests.iter().map(|t| match_unary_test(t, env, input, warnings)).collect();
            if results.iter().any(|v| matches!(v, Value::Bool(true))) {
                Value::Bool(true)
            } else if results.iter().all(|v| matches!(v, Value::Bool(false))) {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        Expr::InputEqualTo(e) => value_equal(input, &evaluate(e, env, input, warnings)),
        Expr::InputLessThan(e) => eval_compare(CmpOp::Lt, input, &evaluate(e, env, input, warnings)),
        Expr::InputLessOrEqual(e) => eval_compare(CmpOp::Le, input, &evaluate(e, env, input, warnings)),
        Expr::InputGreaterThan(e) => eval_compare(CmpOp::Gt, input, &evaluate(e, env, input, warnings)),
        Expr::InputGreaterOrEqual(e) => eval_compare(CmpOp::Ge, input, &evaluate(e, env, input, warnings)),
        Expr::InputInRange { lower, upper } => match eval_range(lower, upper, env, input, warnings) {
            Some(range) => Value::Bool(range_contains(&range, input)),
            None => Value::Null,
        },
        // A range *value* as a plain test also means membership (§3.3).
        Expr::ConstRange { lower, upper } => match eval_range(lower, upper, env, input, warnings) {
            Some(range) => Value::Bool(range_contains(&range, input)),
            None => Value::Null,
        },
        // Any other expression is a plain equality test against the input.
        other => value_equal(input, &evaluate(other, env, input, warnings)),
    }
}

fn range_contains(range: &Range, value: &Value) -> bool {
    let lower_ok = match &range.lower {
        Bound::Unbounded => true,
        Bound::Closed(v) => matches!(value_cmp(value, v), Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)),
        Bound::Open(v) => matches!(value_cmp(value, v), Some(std::cmp::Ordering::Greater)),
    };
    let upper_ok = match &range.upper {
        Bound::Unbounded => true,
        Bound::Closed(v) => matches!(value_cmp(value, v), Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)),
        Bound::Open(v) => matches!(value_cmp(value, v), Some(std::cmp::Ordering::Less)),
    };
    lower_ok && upper_ok
}

fn eval_range(lower: &RangeEndpoint, upper: &RangeEndpoint, env: &Environment, input: &Value, warnings: &Warnings) -> Option<Range> {
    let lower_bound = match &lower.expr {
        None => Bound::Unbounded,
        Some(e) => {
            let v = evaluate(e, env, input, warnings);
            if lower.closed { Bound::Closed(Box::new(v)) } else { Bound::Open(Box::new(v)) }
        }
    };
    let upper_bound = match &upper.expr {
        None => Bound::Unbounded,
        Some(e) => {
            let v = evaluate(e, env, input, warnings);
            if upper.closed { Bound::Closed(Box::new(v)) } else { Bound::Open(Box::new(v)) }
        }
    };
    let range = Range { lower: lower_bound, upper: upper_bound };
    if range.is_well_formed() {
        Some(range)
    } else {
        None
    }
}

fn eval_compare(op: CmpOp, l: &Value, r: &Value) -> Value {
    match op {
        CmpOp::Eq => value_equal(l, r),
        CmpOp::Ne => match value_equal(l, r) {
            Value::Bool(b) => Value::Bool(!b),
            other => other,
        },
        _ => match value_cmp(l, r) {
            None => Value::Null,
            Some(ord) => Value::Bool(match op {
                CmpOp::Lt => ord == std::cmp::Ordering::Less,
                CmpOp::Le => ord != std::cmp::Ordering::Greater,
                CmpOp::Gt => ord == std::cmp::Ordering::Greater,
                CmpOp::Ge => ord != std::cmp::Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            }),
        },
    }
}

fn matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "Any" => true,
        "number" | "string" | "boolean" | "date" | "time" | "list" | "context" | "function" => value.type_name() == type_name,
        "date and time" => matches!(value, Value::LocalDateTime(_) | Value::ZonedDateTime(_)),
        "days and time duration" | "day time duration" => matches!(value, Value::DayTimeDuration(_)),
        "years and months duration" | "year month duration" => matches!(value, Value::YearMonthDuration(_)),
        _ => false,
    }
}

fn eval_arith(op: ArithOp, l: &Value, r: &Value) -> Value {
    use Value::*;
    if matches!(l, Null) || matches!(r, Null) {
        return Null;
    }
    match (op, l, r) {
        (ArithOp::Add, Number(a), Number(b)) => Number(*a + *b),
        (ArithOp::Sub, Number(a), Number(b)) => Number(*a - *b),
        (ArithOp::Mul, Number(a), Number(b)) => Number(*a * *b),
        (ArithOp::Div, Number(a), Number(b)) => {
            if b.is_zero() {
                Null
            } else {
                Number(*a / *b)
            }
        }
        (ArithOp::Pow, Number(a), Number(b)) => pow_decimal(*a, *b).map(Number).unwrap_or(Null),

        (ArithOp::Add, String(a), String(b)) => String(format!("{a}{b}")),

        (ArithOp::Add, Date(d), YearMonthDuration(m)) => add_months(*d, *m).map(Date).unwrap_or(Null),
        (ArithOp::Add, YearMonthDuration(m), Date(d)) => add_months(*d, *m).map(Date).unwrap_or(Null),
        (ArithOp::Add, Date(d), DayTimeDuration(dur)) => Date(*d + chrono::Duration::seconds(dur.num_seconds())),
        (ArithOp::Sub, Date(d), DayTimeDuration(dur)) => Date(*d - chrono::Duration::seconds(dur.num_seconds())),
        (ArithOp::Sub, Date(a), Date(b)) => DayTimeDuration(ChronoDuration::days((*a - *b).num_days())),

        (ArithOp::Add, LocalDateTime(dt), YearMonthDuration(m)) => {
            add_months(dt.date(), *m).map(|d| LocalDateTime(chrono::NaiveDateTime::new(d, dt.time()))).unwrap_or(Null)
        }
        (ArithOp::Add, LocalDateTime(dt), DayTimeDuration(dur)) => LocalDateTime(*dt + *dur),
        (ArithOp::Sub, LocalDateTime(dt), DayTimeDuration(dur)) => LocalDateTime(*dt - *dur),
        (ArithOp::Sub, LocalDateTime(a), LocalDateTime(b)) => DayTimeDuration(*a - *b),

        (ArithOp::Add, ZonedDateTime(dt), DayTimeDuration(dur)) => ZonedDateTime(*dt + *dur),
        (ArithOp::Sub, ZonedDateTime(dt), DayTimeDuration(dur)) => ZonedDateTime(*dt - *dur),
        (ArithOp::Sub, ZonedDateTime(a), ZonedDateTime(b)) => DayTimeDuration(a.signed_duration_since(*b)),

        // Time ± DayTimeDuration wraps modulo 24h: chrono's own
        // `NaiveTime + Duration` already discards the day carry (§4.3.1).
        (ArithOp::Add, LocalTime(t), DayTimeDuration(dur)) => LocalTime(*t + *dur),
        (ArithOp::Sub, LocalTime(t), DayTimeDuration(dur)) => LocalTime(*t - *dur),
        (ArithOp::Sub, LocalTime(a), LocalTime(b)) => DayTimeDuration(a.signed_duration_since(*b)),

        (ArithOp::Add, ZonedTime(t, off), DayTimeDuration(dur)) => ZonedTime(*t + *dur, *off),
        (ArithOp::Sub, ZonedTime(t, off), DayTimeDuration(dur)) => ZonedTime(*t - *dur, *off),
        (ArithOp::Sub, ZonedTime(a, oa), ZonedTime(b, ob)) => DayTimeDuration(zoned_time_diff(*a, *oa, *b, *ob)),

        (ArithOp::Add, YearMonthDuration(a), YearMonthDuration(b)) => YearMonthDuration(*a + *b),
        (ArithOp::Sub, YearMonthDuration(a), YearMonthDuration(b)) => YearMonthDuration(*a - *b),
        (ArithOp::Mul, YearMonthDuration(a), Number(n)) | (ArithOp::Mul, Number(n), YearMonthDuration(a)) => {
            let a = *a;
            n.to_i64().map(|n| YearMonthDuration(a * n)).unwrap_or(Null)
        }
        (ArithOp::Div, YearMonthDuration(a), Number(n)) => {
            let a = *a;
            n.to_i64().filter(|n| *n != 0).map(|n| YearMonthDuration(a / n)).unwrap_or(Null)
        }
        (ArithOp::Div, YearMonthDuration(a), YearMonthDuration(b)) if *b != 0 => Number(Decimal::from(*a) / Decimal::from(*b)),

        (ArithOp::Add, DayTimeDuration(a), DayTimeDuration(b)) => DayTimeDuration(*a + *b),
        (ArithOp::Sub, DayTimeDuration(a), DayTimeDuration(b)) => DayTimeDuration(*a - *b),
        (ArithOp::Mul, DayTimeDuration(a), Number(n)) | (ArithOp::Mul, Number(n), DayTimeDuration(a)) => {
            n.to_i64().map(|n| DayTimeDuration(*a * n as i32)).unwrap_or(Null)
        }
        (ArithOp::Div, DayTimeDuration(a), Number(n)) => {
            n.to_i64().filter(|n| *n != 0).map(|n| DayTimeDuration(*a / n as i32)).unwrap_or(Null)
        }
        (ArithOp::Div, DayTimeDuration(a), DayTimeDuration(b)) if b.num_nanoseconds().unwrap_or(0) != 0 => {
            Number(Decimal::from(a.num_nanoseconds().unwrap_or(0)) / Decimal::from(b.num_nanoseconds().unwrap_or(1)))
        }

        _ => Null,
    }
}

fn pow_decimal(base: Decimal, exp: Decimal) -> Option<Decimal> {
    if exp.fract().is_zero() {
        let e = exp.to_i64()?;
        if e >= 0 {
            let mut result = Decimal::ONE;
            for _ in 0..e {
                result = result.checked_mul(base)?;
            }
            return Some(result);
        }
    }
    let base_f = base.to_f64()?;
    let exp_f = exp.to_f64()?;
    Decimal::from_f64_retain(base_f.powf(exp_f))
}

fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + (date.month() as i64 - 1) + months;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12)) as u32 + 1;
    let last_day = last_day_of_month(year, month);
    NaiveDate::from_ymd_opt(year, month, date.day().min(last_day))
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1).unwrap().pred_opt().unwrap().day()
}

/// Time-of-day difference between two zoned times, accounting for their
/// (possibly distinct) UTC offsets.
fn zoned_time_diff(a: chrono::NaiveTime, oa: chrono::FixedOffset, b: chrono::NaiveTime, ob: chrono::FixedOffset) -> ChronoDuration {
    let a_utc = a.num_seconds_from_midnight() as i64 - oa.local_minus_utc() as i64;
    let b_utc = b.num_seconds_from_midnight() as i64 - ob.local_minus_utc() as i64;
    ChronoDuration::seconds(a_utc - b_utc)
}

/// An iteration source materialized into a concrete list of values, or
/// a signal that the whole enclosing `for`/quantified expression must
/// be `Null` (§4.3.3: each source must be a List, a Range, or Null).
enum IterSource {
    Values(Vec<Value>),
    WholeNull,
}

fn materialize_source(value: &Value) -> IterSource {
    match value {
        Value::List(items) => IterSource::Values(items.clone()),
        Value::Range(range) => match (range.lower.value(), range.upper.value()) {
            (Some(Value::Number(lo)), Some(Value::Number(hi))) => match (lo.to_i64(), hi.to_i64()) {
                (Some(lo), Some(hi)) if lo <= hi => {
                    IterSource::Values((lo..=hi).map(|n| Value::Number(Decimal::from(n))).collect())
                }
                (Some(lo), Some(hi)) => IterSource::Values((hi..=lo).rev().map(|n| Value::Number(Decimal::from(n))).collect()),
                _ => IterSource::WholeNull,
            },
            _ => IterSource::WholeNull,
        },
        Value::Null => IterSource::WholeNull,
        _ => IterSource::WholeNull,
    }
}

/// Expands every iterator clause into its Cartesian product of scopes.
/// Returns `None` when any source is Null or not iterable, in which
/// case the caller must yield `Value::Null` for the whole expression.
fn cartesian_bindings(
    iterators: &[crate::ast::Iterator],
    env: &Environment,
    input: &Value,
    warnings: &Warnings,
) -> Option<Vec<Environment>> {
    let mut scopes = vec![env.clone()];
    for iter in iterators {
        let mut next_scopes = Vec::new();
        for scope in &scopes {
            let source = evaluate(&iter.source, scope, input, warnings);
            match materialize_source(&source) {
                IterSource::Values(items) => {
                    for item in items {
                        next_scopes.push(scope.push_one(iter.name.clone(), item));
                    }
                }
                IterSource::WholeNull => return None,
            }
        }
        scopes = next_scopes;
    }
    Some(scopes)
}

fn project_path(base: &Value, name: &str) -> Value {
    match base {
        Value::Context(_) => base.context_get(name).cloned().unwrap_or(Value::Null),
        Value::List(items) => Value::List(items.iter().map(|item| project_path(item, name)).collect()),
        _ => Value::Null,
    }
}

fn filter_list(items: &[Value], predicate: &Expr, env: &Environment, input: &Value, warnings: &Warnings) -> Value {
    if let Expr::NumberLit(n) = predicate {
        let Some(idx) = n.to_i64() else { return Value::Null };
        let len = items.len() as i64;
        let zero_based = if idx > 0 { idx - 1 } else { len + idx };
        return if zero_based >= 0 && zero_based < len { items[zero_based as usize].clone() } else { Value::Null };
    }

    let mut selected = Vec::new();
    for item in items {
        let child_env = bind_item_scope(env, item);
        if matches!(evaluate(predicate, &child_env, input, warnings), Value::Bool(true)) {
            selected.push(item.clone());
        }
    }
    Value::List(selected)
}

fn bind_item_scope(env: &Environment, item: &Value) -> Environment {
    let mut bindings = HashMap::new();
    bindings.insert("item".to_string(), item.clone());
    // A Context element's own `item` key, if present, shadows the
    // implicit one (§4.3.6) — insert it second so it overwrites.
    if let Value::Context(entries) = item {
        for (k, v) in entries {
            bindings.insert(k.clone(), v.clone());
        }
    }
    env.push(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn eval_src(src: &str) -> Value {
        let expr = Parser::new(src.to_string()).parse().unwrap();
        let warnings = RefCell::new(Vec::new());
        evaluate(&expr, &Environment::root(), &Value::Null, &warnings)
    }

    fn eval_src_with_warnings(src: &str) -> (Value, Vec<Warning>) {
        let expr = Parser::new(src.to_string()).parse().unwrap();
        let warnings = RefCell::new(Vec::new());
        let v = evaluate(&expr, &Environment::root(), &Value::Null, &warnings);
        (v, warnings.into_inner())
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        assert!(matches!(eval_src("null + 1"), Value::Null));
    }

    #[test]
    fn string_concatenation() {
        assert!(matches!(eval_src(r#""a" + "b""#), Value::String(s) if s == "ab"));
    }

    #[test]
    fn three_valued_and() {
        assert!(matches!(eval_src("false and null"), Value::Bool(false)));
        assert!(matches!(eval_src("true and null"), Value::Null));
    }

    #[test]
    fn three_valued_or() {
        assert!(matches!(eval_src("true or null"), Value::Bool(true)));
        assert!(matches!(eval_src("false or null"), Value::Null));
    }

    #[test]
    fn if_treats_non_true_as_else() {
        assert!(matches!(eval_src("if null then 1 else 2"), Value::Number(n) if n == Decimal::from(2)));
    }

    #[test]
    fn for_expression_builds_list() {
        match eval_src("for x in [1,2,3] return x * 2") {
            Value::List(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn for_expression_null_source_yields_null() {
        assert!(matches!(eval_src("for x in null return x"), Value::Null));
    }

    #[test]
    fn for_expression_partial_accumulator() {
        match eval_src("for i in 0..4 return if i = 0 then 1 else i * partial[-1]") {
            Value::List(items) => {
                let expected = [1, 1, 2, 6, 24];
                assert_eq!(items.len(), expected.len());
                for (got, want) in items.iter().zip(expected.iter()) {
                    assert!(matches!(got, Value::Number(n) if *n == Decimal::from(*want)));
                }
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn quantified_expressions() {
        assert!(matches!(eval_src("some x in [1,2,3] satisfies x > 2"), Value::Bool(true)));
        assert!(matches!(eval_src("every x in [1,2,3] satisfies x > 0"), Value::Bool(true)));
        assert!(matches!(eval_src("every x in [1,2,3] satisfies x > 1"), Value::Bool(false)));
    }

    #[test]
    fn every_is_vacuously_true_on_empty_list() {
        assert!(matches!(eval_src("every x in [] satisfies x > 1"), Value::Bool(true)));
    }

    #[test]
    fn path_projection_over_list() {
        match eval_src(r#"[{a: 1}, {a: 2}].a"#) {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn filter_with_implicit_item_binding() {
        match eval_src(r#"[{a: 1}, {a: 2}, {a: 3}][a > 1]"#) {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn range_membership_via_in() {
        assert!(matches!(eval_src("5 in [1..10]"), Value::Bool(true)));
        assert!(matches!(eval_src("15 in [1..10]"), Value::Bool(false)));
    }

    #[test]
    fn in_is_total_never_null() {
        // Comparing across incompatible kinds would normally yield Null;
        // `in` must still resolve to a concrete Bool.
        assert!(matches!(eval_src(r#""x" in [1, 2, 3]"#), Value::Bool(false)));
    }

    #[test]
    fn not_maps_null_to_false() {
        assert!(matches!(eval_src("not(if true then null else true)"), Value::Bool(false)));
    }

    #[test]
    fn function_definition_and_invocation() {
        assert!(matches!(eval_src("(function(x) x * x)(4)"), Value::Number(n) if n == Decimal::from(16)));
    }

    #[test]
    fn undeclared_variable_warns_and_is_null() {
        let (v, warnings) = eval_src_with_warnings("undeclaredName");
        assert!(matches!(v, Value::Null));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::NoVariableFound);
    }

    #[test]
    fn missing_context_key_is_silent() {
        let (v, warnings) = eval_src_with_warnings(r#"{a: 1}.b"#);
        assert!(matches!(v, Value::Null));
        assert!(warnings.is_empty());
    }
}
