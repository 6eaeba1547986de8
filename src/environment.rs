//! Lexical environment: a stack of scopes (§3.2)
//!
//! The bottom scope holds built-ins; above it sit the user-supplied
//! context variables; iteration and filter predicates push transient
//! scopes on top. Lookup walks top to bottom. Scopes are linked by `Rc`
//! so a closure can share its defining environment cheaply and scope
//! nodes are released once the last reference drops (§9 "Closures") —
//! cycles are impossible because a scope only ever points at an older,
//! outer scope.

use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

struct ScopeNode {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A persistent, shared scope chain.
#[derive(Clone)]
pub struct Environment(Rc<ScopeNode>);

impl Environment {
    /// The empty, bottom-most scope.
    pub fn root() -> Self {
        Environment(Rc::new(ScopeNode { bindings: HashMap::new(), parent: None }))
    }

    /// Push a new scope on top of `self` with the given bindings.
    pub fn push(&self, bindings: HashMap<String, Value>) -> Self {
        Environment(Rc::new(ScopeNode { bindings, parent: Some(self.clone()) }))
    }

    /// Push a scope with a single binding — the common case for iteration
    /// and `let`-like constructs.
    pub fn push_one(&self, name: impl Into<String>, value: Value) -> Self {
        let mut bindings = HashMap::with_capacity(1);
        bindings.insert(name.into(), value);
        self.push(bindings)
    }

    /// Walk the scope chain top to bottom for `name`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut node = self;
        loop {
            if let Some(v) = node.0.bindings.get(name) {
                return Some(v.clone());
            }
            match &node.0.parent {
                Some(parent) => node = parent,
                None => return None,
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}
