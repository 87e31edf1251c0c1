//! Attributes: a variable plus a chain of field/index qualifiers,
//! computed once at plan time for any expression that is a pure
//! select/index chain rooted at an identifier. Attributes are what
//! partial evaluation matches [`crate::interpreter::unknown::AttributePattern`]s
//! against (spec §4.6) instead of matching on the raw AST.

use crate::common::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    Field(Arc<str>),
    /// An index whose key was constant-foldable at plan time. Dynamic
    /// index expressions are not represented as attributes; the
    /// planner falls back to an ordinary `_[_]` call plan for those.
    Index(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub var: Arc<str>,
    pub qualifiers: Vec<Qualifier>,
}

impl Attribute {
    pub fn root(var: impl Into<Arc<str>>) -> Self {
        Attribute { var: var.into(), qualifiers: Vec::new() }
    }

    pub fn with_field(mut self, name: impl Into<Arc<str>>) -> Self {
        self.qualifiers.push(Qualifier::Field(name.into()));
        self
    }

    pub fn with_index(mut self, key: Value) -> Self {
        self.qualifiers.push(Qualifier::Index(key));
        self
    }
}
