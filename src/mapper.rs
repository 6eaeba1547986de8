//! Pluggable translation between `serde_json::Value` (the engine's public
//! input/output shape) and the internal [`Value`] domain (§6).
//!
//! A [`MapperChain`] tries each registered [`ValueMapper`] in order and
//! keeps the first answer that isn't `None`, falling back to
//! [`DefaultValueMapper`] last — this is how a caller can teach the
//! engine to turn, say, a `{"$date": "..."}` wrapper into a native
//! `Value::Date` without forking the evaluator.

use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::str::FromStr;

use crate::value::Value;

/// Converts between the engine's internal value domain and JSON.
pub trait ValueMapper {
    /// Attempt to interpret `json` as an internal value. `None` defers
    /// to the next mapper in the chain.
    fn to_internal(&self, json: &Json) -> Option<Value>;

    /// Attempt to render `value` back out as JSON. `None` defers to the
    /// next mapper in the chain.
    fn from_internal(&self, value: &Value) -> Option<Json>;
}

/// The baseline mapping: numbers, strings, booleans, null, arrays and
/// objects translate structurally; everything else (dates, durations,
/// functions, ranges) is out of scope and returned as `None` so a more
/// specific mapper — or the engine's final string fallback — can take it.
pub struct DefaultValueMapper;

impl ValueMapper for DefaultValueMapper {
    fn to_internal(&self, json: &Json) -> Option<Value> {
        match json {
            Json::Null => Some(Value::Null),
            Json::Bool(b) => Some(Value::Bool(*b)),
            Json::Number(n) => Decimal::from_str(&n.to_string()).ok().map(Value::Number),
            Json::String(s) => Some(Value::String(s.clone())),
            Json::Array(items) => items.iter().map(|v| self.to_internal(v)).collect::<Option<Vec<_>>>().map(Value::List),
            Json::Object(entries) => entries
                .iter()
                .map(|(k, v)| self.to_internal(v).map(|v| (k.clone(), v)))
                .collect::<Option<Vec<_>>>()
                .map(Value::Context),
        }
    }

    fn from_internal(&self, value: &Value) -> Option<Json> {
        match value {
            Value::Null => Some(Json::Null),
            Value::Bool(b) => Some(Json::Bool(*b)),
            Value::Number(n) => serde_json::Number::from_str(&n.to_string()).ok().map(Json::Number),
            Value::String(s) => Some(Json::String(s.clone())),
            Value::List(items) => items.iter().map(|v| self.from_internal(v)).collect::<Option<Vec<_>>>().map(Json::Array),
            Value::Context(entries) => entries
                .iter()
                .map(|(k, v)| self.from_internal(v).map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Json::Object),
            // Temporal kinds, ranges and functions fall back to their
            // FEEL textual form via the engine's Display-based fallback.
            _ => None,
        }
    }
}

/// An ordered sequence of mappers, tried front to back.
pub struct MapperChain {
    mappers: Vec<Box<dyn ValueMapper>>,
}

impl MapperChain {
    pub fn new() -> Self {
        MapperChain { mappers: vec![Box::new(DefaultValueMapper)] }
    }

    /// Register `mapper` ahead of the chain's current entries (including
    /// the default one), so it gets first refusal.
    pub fn push_front(&mut self, mapper: Box<dyn ValueMapper>) {
        self.mappers.insert(0, mapper);
    }

    pub fn to_internal(&self, json: &Json) -> Option<Value> {
        self.mappers.iter().find_map(|m| m.to_internal(json))
    }

    pub fn from_internal(&self, value: &Value) -> Json {
        self.mappers.iter().find_map(|m| m.from_internal(value)).unwrap_or_else(|| Json::String(value.to_string()))
    }
}

impl Default for MapperChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_structural_json() {
        let mapper = MapperChain::new();
        let json = serde_json::json!({"a": 1, "b": [true, null, "x"]});
        let internal = mapper.to_internal(&json).unwrap();
        assert!(matches!(internal, Value::Context(_)));
        let back = mapper.from_internal(&internal);
        assert_eq!(back, json);
    }

    #[test]
    fn unsupported_kinds_fall_back_to_display() {
        let mapper = MapperChain::new();
        let date = Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(mapper.from_internal(&date), Json::String("2024-01-01".to_string()));
    }

    struct DateTaggedMapper;
    impl ValueMapper for DateTaggedMapper {
        fn to_internal(&self, json: &Json) -> Option<Value> {
            let obj = json.as_object()?;
            let s = obj.get("$date")?.as_str()?;
            crate::temporal::parse_date(s)
        }
        fn from_internal(&self, _value: &Value) -> Option<Json> {
            None
        }
    }

    #[test]
    fn custom_mapper_takes_priority() {
        let mut chain = MapperChain::new();
        chain.push_front(Box::new(DateTaggedMapper));
        let json = serde_json::json!({"$date": "2024-03-01"});
        assert!(matches!(chain.to_internal(&json), Some(Value::Date(_))));
    }
}
