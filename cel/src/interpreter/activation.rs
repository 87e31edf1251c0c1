//! Variable bindings supplied to an evaluation. A stack of mappings:
//! the bottom is host-supplied, comprehensions push a child frame
//! binding `iter_var`/`accu_var` that shadows nothing outside the
//! comprehension's own frame (spec §4.2 "lifecycles").

use crate::common::value::Value;
use crate::interpreter::unknown::AttributePattern;
use hashbrown::HashMap;
use std::sync::Arc;

pub trait Activation: Sync {
    /// Resolves a top-level variable. `None` means "no such attribute".
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Attribute patterns marking parts of the activation unknown.
    /// Empty for a plain (non-partial) activation.
    fn unknown_patterns(&self) -> &[AttributePattern] {
        &[]
    }
}

#[derive(Debug, Default, Clone)]
pub struct MapActivation {
    vars: HashMap<Arc<str>, Value>,
}

impl MapActivation {
    pub fn new() -> Self {
        MapActivation { vars: HashMap::new() }
    }

    pub fn bind(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.vars.insert(name.into(), value);
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

/// A single comprehension-frame binding layered over a parent
/// activation. `name` shadows any binding of the same name in `parent`
/// for the lifetime of the loop.
pub struct ChildActivation<'a> {
    parent: &'a dyn Activation,
    name: Arc<str>,
    value: Value,
}

impl<'a> ChildActivation<'a> {
    pub fn new(parent: &'a dyn Activation, name: Arc<str>, value: Value) -> Self {
        ChildActivation { parent, name, value }
    }
}

impl<'a> Activation for ChildActivation<'a> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if name == self.name.as_ref() {
            Some(self.value.clone())
        } else {
            self.parent.resolve(name)
        }
    }

    fn unknown_patterns(&self) -> &[AttributePattern] {
        self.parent.unknown_patterns()
    }
}

/// Wraps a base activation with a set of attribute patterns declaring
/// parts of it unknown, for partial evaluation (spec §4.6).
pub struct PartialActivation<'a> {
    base: &'a dyn Activation,
    patterns: Vec<AttributePattern>,
}

impl<'a> PartialActivation<'a> {
    pub fn new(base: &'a dyn Activation, patterns: Vec<AttributePattern>) -> Self {
        PartialActivation { base, patterns }
    }
}

impl<'a> Activation for PartialActivation<'a> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.base.resolve(name)
    }

    fn unknown_patterns(&self) -> &[AttributePattern] {
        &self.patterns
    }
}
