#![allow(dead_code)]

use std::sync::OnceLock;

use feel_lang::{Engine, Value};
use serde_json::Value as Json;

static ENGINE: OnceLock<Engine> = OnceLock::new();

pub fn engine() -> &'static Engine {
    ENGINE.get_or_init(Engine::new)
}

pub fn eval(src: &str) -> Value {
    eval_with(src, &serde_json::json!({}))
}

pub fn eval_with(src: &str, context: &Json) -> Value {
    engine().evaluate_expression(src, context).unwrap().value
}

pub fn test_unary(src: &str, input: Json) -> Value {
    engine().evaluate_unary_tests(src, &input, &serde_json::json!({})).unwrap().value
}
