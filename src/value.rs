//! The FEEL value model
//!
//! A [`Value`] is the universal result type of evaluation: a tagged union
//! over null, boolean, arbitrary-precision number, string, the four
//! temporal kinds, two duration kinds, list, context, range, function and
//! error. All variants are immutable once constructed (§3.1 of the spec).

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::Expr;
use crate::environment::Environment;

/// One bound of a [`Range`].
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// No constraint on this side (arises from `< v`, `> v`, … in unary-test position).
    Unbounded,
    Closed(Box<Value>),
    Open(Box<Value>),
}

impl Bound {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Bound::Unbounded => None,
            Bound::Closed(v) | Bound::Open(v) => Some(v),
        }
    }
}

/// An interval over an ordered kind (§3.1 "Range").
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lower: Bound,
    pub upper: Bound,
}

impl Range {
    /// A range is well-formed when both bounds are present and `lower <= upper`.
    /// Operations on an ill-formed range yield `Null` (§3.1 invariant).
    pub fn is_well_formed(&self) -> bool {
        match (self.lower.value(), self.upper.value()) {
            (Some(l), Some(u)) => matches!(value_cmp(l, u), Some(Ordering::Less) | Some(Ordering::Equal)),
            _ => true,
        }
    }
}

/// A closure's captured environment plus parameter list, or a native hook.
#[derive(Clone)]
pub enum FunctionBody {
    Interpreted {
        body: Rc<Expr>,
        closure: Environment,
    },
    Native(Rc<dyn Fn(&[Value]) -> Value>),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Interpreted { .. } => write!(f, "Interpreted(..)"),
            FunctionBody::Native(_) => write!(f, "Native(..)"),
        }
    }
}

/// A first-class function value: parameter names, a body (AST or native
/// closure), and a has-var-args flag (§3.1 "Function").
#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub var_args: bool,
}

/// The universal value domain of FEEL evaluation (§3.1).
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    String(String),
    Date(NaiveDate),
    LocalTime(NaiveTime),
    ZonedTime(NaiveTime, FixedOffset),
    LocalDateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    /// Signed, normalized (years, months) — e.g. `P1Y2M` is `(1, 2)`.
    YearMonthDuration(i64),
    /// Signed nanosecond count.
    DayTimeDuration(ChronoDuration),
    List(Vec<Value>),
    /// Ordered (name, value) pairs with unique names (§3.1 "Context").
    Context(Vec<(String, Value)>),
    Range(Box<Range>),
    Function(Rc<FunctionValue>),
    /// A surfaced evaluation failure, distinct from `Null` (§3.1).
    Error(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn number(d: Decimal) -> Value {
        Value::Number(d)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lookup by name in a `Context`; `None` for anything else (§4.3.5).
    pub fn context_get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Context(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::LocalTime(_) => "time",
            Value::ZonedTime(_, _) => "time",
            Value::LocalDateTime(_) => "date and time",
            Value::ZonedDateTime(_) => "date and time",
            Value::YearMonthDuration(_) => "years and months duration",
            Value::DayTimeDuration(_) => "days and time duration",
            Value::List(_) => "list",
            Value::Context(_) => "context",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::LocalTime(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::ZonedTime(t, off) => write!(f, "{}{}", t.format("%H:%M:%S"), off),
            Value::LocalDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::ZonedDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            Value::YearMonthDuration(months) => write!(f, "{}", format_year_month_duration(*months)),
            Value::DayTimeDuration(d) => write!(f, "{}", format_day_time_duration(d)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Context(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Range(r) => {
                match &r.lower {
                    Bound::Closed(_) | Bound::Unbounded => write!(f, "[")?,
                    Bound::Open(_) => write!(f, "(")?,
                }
                match r.lower.value() {
                    Some(v) => write!(f, "{v}")?,
                    None => write!(f, "-")?,
                }
                write!(f, "..")?;
                match r.upper.value() {
                    Some(v) => write!(f, "{v}")?,
                    None => write!(f, "-")?,
                }
                match &r.upper {
                    Bound::Closed(_) | Bound::Unbounded => write!(f, "]"),
                    Bound::Open(_) => write!(f, ")"),
                }
            }
            Value::Function(_) => write!(f, "function"),
            Value::Error(msg) => write!(f, "error(\"{msg}\")"),
        }
    }
}

fn format_year_month_duration(months: i64) -> String {
    let sign = if months < 0 { "-" } else { "" };
    let months = months.abs();
    format!("{sign}P{}Y{}M", months / 12, months % 12)
}

fn format_day_time_duration(d: &ChronoDuration) -> String {
    let sign = if d.num_nanoseconds().unwrap_or(0) < 0 { "-" } else { "" };
    let secs_total = d.num_seconds().abs();
    let days = secs_total / 86_400;
    let hours = (secs_total % 86_400) / 3600;
    let minutes = (secs_total % 3600) / 60;
    let seconds = secs_total % 60;
    format!("{sign}P{days}DT{hours}H{minutes}M{seconds}S")
}

/// The wire representation a [`Value`] serializes through. `Range`,
/// `Function` and `Error` have no JSON counterpart and are rejected at
/// the `Serialize`/`Deserialize` boundary rather than silently dropped —
/// an embedder round-tripping a `Value` through `serde_json` only ever
/// deals in the structural, data-only subset (§3.1 supplement).
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
enum ValueWire {
    Null,
    Bool(bool),
    Number(Decimal),
    String(String),
    Date(NaiveDate),
    LocalTime(NaiveTime),
    ZonedTime(NaiveTime, FixedOffset),
    LocalDateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    YearMonthDuration(i64),
    DayTimeDurationNanos(i64),
    List(Vec<Value>),
    Context(Vec<(String, Value)>),
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Value::Null => ValueWire::Null,
            Value::Bool(b) => ValueWire::Bool(*b),
            Value::Number(n) => ValueWire::Number(*n),
            Value::String(s) => ValueWire::String(s.clone()),
            Value::Date(d) => ValueWire::Date(*d),
            Value::LocalTime(t) => ValueWire::LocalTime(*t),
            Value::ZonedTime(t, off) => ValueWire::ZonedTime(*t, *off),
            Value::LocalDateTime(dt) => ValueWire::LocalDateTime(*dt),
            Value::ZonedDateTime(dt) => ValueWire::ZonedDateTime(*dt),
            Value::YearMonthDuration(m) => ValueWire::YearMonthDuration(*m),
            Value::DayTimeDuration(d) => ValueWire::DayTimeDurationNanos(d.num_nanoseconds().unwrap_or(0)),
            Value::List(items) => ValueWire::List(items.clone()),
            Value::Context(entries) => ValueWire::Context(entries.clone()),
            Value::Range(_) => return Err(serde::ser::Error::custom("a Range value has no JSON representation")),
            Value::Function(_) => return Err(serde::ser::Error::custom("a Function value has no JSON representation")),
            Value::Error(_) => return Err(serde::ser::Error::custom("an Error value has no JSON representation")),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match ValueWire::deserialize(deserializer)? {
            ValueWire::Null => Value::Null,
            ValueWire::Bool(b) => Value::Bool(b),
            ValueWire::Number(n) => Value::Number(n),
            ValueWire::String(s) => Value::String(s),
            ValueWire::Date(d) => Value::Date(d),
            ValueWire::LocalTime(t) => Value::LocalTime(t),
            ValueWire::ZonedTime(t, off) => Value::ZonedTime(t, off),
            ValueWire::LocalDateTime(dt) => Value::LocalDateTime(dt),
            ValueWire::ZonedDateTime(dt) => Value::ZonedDateTime(dt),
            ValueWire::YearMonthDuration(m) => Value::YearMonthDuration(m),
            ValueWire::DayTimeDurationNanos(n) => Value::DayTimeDuration(ChronoDuration::nanoseconds(n)),
            ValueWire::List(items) => Value::List(items),
            ValueWire::Context(entries) => Value::Context(entries),
        })
    }
}

/// Converts a [`Value`] back out to JSON via a mapper chain, for the
/// handful of call sites (the engine façade) that need the conversion
/// without importing `crate::mapper` directly into every module.
pub trait ToJson {
    fn to_json(&self, mapper: &crate::mapper::MapperChain) -> serde_json::Value;
}

impl ToJson for Value {
    fn to_json(&self, mapper: &crate::mapper::MapperChain) -> serde_json::Value {
        mapper.from_internal(self)
    }
}

/// FEEL equality (§4.3.1). Returns `None` when the comparison is Null
/// (distinct kinds, with the `Null = Null` and `Null = x` concessions).
pub fn value_equal(a: &Value, b: &Value) -> Value {
    use Value::*;
    match (a, b) {
        (Null, Null) => Bool(true),
        (Null, _) | (_, Null) => Bool(false),
        (Bool(x), Bool(y)) => Bool(x == y),
        (Number(x), Number(y)) => Bool(x == y),
        (String(x), String(y)) => Bool(x == y),
        (Date(x), Date(y)) => Bool(x == y),
        (LocalTime(x), LocalTime(y)) => Bool(x == y),
        (ZonedTime(x, ox), ZonedTime(y, oy)) => Bool(x == y && ox == oy),
        (LocalDateTime(x), LocalDateTime(y)) => Bool(x == y),
        (ZonedDateTime(x), ZonedDateTime(y)) => Bool(x == y),
        (YearMonthDuration(x), YearMonthDuration(y)) => Bool(x == y),
        (DayTimeDuration(x), DayTimeDuration(y)) => Bool(x == y),
        (List(xs), List(ys)) => {
            if xs.len() != ys.len() {
                return Bool(false);
            }
            for (x, y) in xs.iter().zip(ys.iter()) {
                match value_equal(x, y) {
                    Bool(true) => continue,
                    _ => return Bool(false),
                }
            }
            Bool(true)
        }
        (Context(xs), Context(ys)) => {
            if xs.len() != ys.len() {
                return Bool(false);
            }
            for (k, v) in xs {
                match ys.iter().find(|(k2, _)| k2 == k) {
                    Some((_, v2)) => match value_equal(v, v2) {
                        Bool(true) => continue,
                        _ => return Bool(false),
                    },
                    None => return Bool(false),
                }
            }
            Bool(true)
        }
        (Range(x), Range(y)) => Bool(x == y),
        _ => Null,
    }
}

/// FEEL ordering (§4.3.1). `None` when the two values are not comparable
/// (different kinds, any Null operand, or unordered kinds such as mixed
/// duration families).
pub fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::*;
    match (a, b) {
        (Number(x), Number(y)) => x.partial_cmp(y),
        (String(x), String(y)) => Some(x.as_str().cmp(y.as_str())),
        (Date(x), Date(y)) => Some(x.cmp(y)),
        (LocalTime(x), LocalTime(y)) => Some(x.cmp(y)),
        (LocalDateTime(x), LocalDateTime(y)) => Some(x.cmp(y)),
        (ZonedDateTime(x), ZonedDateTime(y)) => Some(x.cmp(y)),
        (YearMonthDuration(x), YearMonthDuration(y)) => Some(x.cmp(y)),
        (DayTimeDuration(x), DayTimeDuration(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_structural_values_through_json() {
        let value = Value::Context(vec![
            ("name".to_string(), Value::String("Ada".to_string())),
            ("tags".to_string(), Value::List(vec![Value::Number(Decimal::from(1)), Value::Bool(true), Value::Null])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert!(matches!(value_equal(&value, &back), Value::Bool(true)));
    }

    #[test]
    fn function_values_refuse_to_serialize() {
        let f = Value::Function(Rc::new(FunctionValue {
            params: vec![],
            body: FunctionBody::Native(Rc::new(|_| Value::Null)),
            var_args: false,
        }));
        assert!(serde_json::to_string(&f).is_err());
    }
}
