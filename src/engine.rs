//! The public entry point: parse-then-evaluate orchestration, an
//! LRU cache over parsed ASTs, and the tiered result/warning shape (§6, §7).
//!
//! Grounded on the teacher's `Engine` façade: an `Arc<Mutex<LruCache<...>>>`
//! over parsed artifacts keyed on source text, an options struct with a
//! `Default` impl, and a single compile-then-run entry point. The
//! FHIR-specific machinery (type registry, resource resolver, the async
//! `with_fhir_version` constructor) has no FEEL counterpart and is dropped.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value as Json;

use crate::ast::Expr;
use crate::builtins;
use crate::environment::Environment;
use crate::error::Result;
use crate::interpreter;
use crate::mapper::MapperChain;
use crate::parser::Parser;
use crate::value::Value;

/// Tuning knobs for an [`Engine`] instance.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// How many distinct source strings' parsed ASTs to keep cached.
    pub cache_capacity: NonZeroUsize,
    /// If `true`, every surfaced [`Warning`] is also logged at `trace`
    /// level as it's produced.
    pub trace: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { cache_capacity: NonZeroUsize::new(256).unwrap(), trace: false }
    }
}

/// The kind of thing a [`Warning`] is reporting, so a caller can filter
/// or aggregate without parsing the message text (§6, §7 tier 2).
///
/// The interpreter itself only ever constructs [`WarningKind::NoVariableFound`],
/// [`WarningKind::AssertionFailure`] and [`WarningKind::FunctionInvocationFailure`] —
/// see `interpreter.rs`'s module doc for why a plain missing context
/// entry or an unresolved function name stay silent (§4.3.5, §4.3.9).
/// [`WarningKind::NoContextEntryFound`] and [`WarningKind::NoFunctionFound`]
/// are part of the warning vocabulary for host-bridge embedders (§1)
/// that plug in their own name resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// A reference to a variable that was never declared in the context
    /// or the built-in registry.
    NoVariableFound,
    /// A qualified lookup found its base but not the named entry.
    NoContextEntryFound,
    /// A function invocation's name resolved to nothing at all.
    NoFunctionFound,
    /// A built-in returned `Value::Error` — reported, then downgraded to `Null`.
    FunctionInvocationFailure,
    /// A named-argument call left a declared parameter unbound.
    AssertionFailure,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

/// A successful evaluation: the result value plus anything downgraded
/// to a warning along the way. `value` is the internal [`Value`]
/// domain, not JSON — callers that need JSON convert explicitly via
/// [`Engine::to_json`] or [`crate::value::ToJson`].
#[derive(Clone, Debug, PartialEq)]
pub struct Success {
    pub value: Value,
    pub warnings: Vec<Warning>,
}

/// A fatal failure — syntax error or an internal invariant violation
/// (§7 tier 3). Domain mismatches never reach this; they become `Null`
/// plus a [`Warning`] inside [`Success`] instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub message: String,
    pub warnings: Vec<Warning>,
}

pub type EvaluateResult = std::result::Result<Success, Failure>;

/// The engine façade: owns a parse cache, the built-in registry's root
/// scope, and the value-mapper chain used to translate in and out of JSON.
pub struct Engine {
    cache: Arc<Mutex<LruCache<String, Arc<Expr>>>>,
    unary_test_cache: Arc<Mutex<LruCache<String, Arc<Expr>>>>,
    root_env: Environment,
    mapper: MapperChain,
    options: EngineOptions,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(options.cache_capacity))),
            unary_test_cache: Arc::new(Mutex::new(LruCache::new(options.cache_capacity))),
            root_env: builtins::install(&Environment::root()),
            mapper: MapperChain::new(),
            options,
        }
    }

    /// Register an additional [`crate::mapper::ValueMapper`] ahead of the
    /// default one, so it gets first refusal on each JSON value.
    pub fn push_mapper(&mut self, mapper: Box<dyn crate::mapper::ValueMapper>) {
        self.mapper.push_front(mapper);
    }

    /// Convert an evaluation result back to JSON through this engine's
    /// mapper chain, for callers that want the JSON boundary explicitly.
    pub fn to_json(&self, value: &Value) -> Json {
        self.mapper.from_internal(value)
    }

    fn parse_cached(&self, source: &str) -> Result<Arc<Expr>> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(source) {
                return Ok(cached.clone());
            }
        }
        let expr = Parser::new(source.to_string()).parse()?;
        let expr = Arc::new(expr);
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).put(source.to_string(), expr.clone());
        Ok(expr)
    }

    fn parse_unary_tests_cached(&self, source: &str) -> Result<Arc<Expr>> {
        {
            let mut cache = self.unary_test_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(source) {
                return Ok(cached.clone());
            }
        }
        let expr = Parser::new(source.to_string()).parse_unary_tests()?;
        let expr = Arc::new(expr);
        self.unary_test_cache.lock().unwrap_or_else(|e| e.into_inner()).put(source.to_string(), expr.clone());
        Ok(expr)
    }

    fn bind_context(&self, context: &Json) -> Environment {
        match self.mapper.to_internal(context) {
            Some(Value::Context(entries)) => {
                let mut bindings = std::collections::HashMap::with_capacity(entries.len());
                for (k, v) in entries {
                    bindings.insert(k, v);
                }
                self.root_env.push(bindings)
            }
            _ => self.root_env.clone(),
        }
    }

    fn drain_warnings(&self, cell: RefCell<Vec<Warning>>) -> Vec<Warning> {
        let warnings = cell.into_inner();
        if self.options.trace {
            for w in &warnings {
                log::trace!("{:?}: {}", w.kind, w.message);
            }
        }
        warnings
    }

    /// Parse and evaluate `source` as a FEEL expression against `context`.
    pub fn evaluate_expression(&self, source: &str, context: &Json) -> EvaluateResult {
        let expr = match self.parse_cached(source) {
            Ok(expr) => expr,
            Err(e) => return Err(Failure { message: e.to_string(), warnings: Vec::new() }),
        };
        let env = self.bind_context(context);
        let warnings = RefCell::new(Vec::new());
        let value = interpreter::evaluate(&expr, &env, &Value::Null, &warnings);
        Ok(Success { value, warnings: self.drain_warnings(warnings) })
    }

    /// Parse and evaluate `source` as a unary-test expression, matching
    /// `input` against `context`'s bound variables.
    pub fn evaluate_unary_tests(&self, source: &str, input: &Json, context: &Json) -> EvaluateResult {
        let expr = match self.parse_unary_tests_cached(source) {
            Ok(expr) => expr,
            Err(e) => return Err(Failure { message: e.to_string(), warnings: Vec::new() }),
        };
        let env = self.bind_context(context);
        let input_value = self.mapper.to_internal(input).unwrap_or(Value::Null);
        let warnings = RefCell::new(Vec::new());
        let value = interpreter::match_unary_test(&expr, &env, &input_value, &warnings);
        Ok(Success { value, warnings: self.drain_warnings(warnings) })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_expression_against_context() {
        let engine = Engine::new();
        let result = engine.evaluate_expression("age >= 18", &serde_json::json!({"age": 21})).unwrap();
        assert!(matches!(result.value, Value::Bool(true)));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn parse_errors_are_fatal() {
        let engine = Engine::new();
        let result = engine.evaluate_expression("1 +", &serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn unary_test_matches_input() {
        let engine = Engine::new();
        let result = engine.evaluate_unary_tests("[1..10]", &serde_json::json!(5), &serde_json::json!({})).unwrap();
        assert!(matches!(result.value, Value::Bool(true)));
    }

    #[test]
    fn repeated_parses_hit_the_cache() {
        let engine = Engine::new();
        for _ in 0..3 {
            let result = engine.evaluate_expression("1 + 1", &serde_json::json!({})).unwrap();
            assert!(matches!(result.value, Value::Number(n) if n == rust_decimal::Decimal::from(2)));
        }
    }

    #[test]
    fn undefined_reference_resolves_to_null_with_warning() {
        let engine = Engine::new();
        let result = engine.evaluate_expression("undeclaredName", &serde_json::json!({})).unwrap();
        assert!(matches!(result.value, Value::Null));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::NoVariableFound);
    }

    #[test]
    fn builtin_failure_downgrades_to_null_with_warning() {
        let engine = Engine::new();
        let result = engine.evaluate_expression(r#"number("not a number")"#, &serde_json::json!({})).unwrap();
        assert!(matches!(result.value, Value::Null));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::FunctionInvocationFailure);
    }

    #[test]
    fn to_json_converts_through_the_mapper() {
        let engine = Engine::new();
        let result = engine.evaluate_expression("1 + 1", &serde_json::json!({})).unwrap();
        assert_eq!(engine.to_json(&result.value), serde_json::json!(2));
    }
}
