//! The checker's per-node reference annotations.

use crate::common::value::Value;
use std::sync::Arc;

/// Recorded for every resolved identifier/call node. `overload_ids` is
/// empty for a plain variable/field reference; `value` captures folded
/// constants and resolved enum values.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: Arc<str>,
    pub overload_ids: Vec<Arc<str>>,
    pub value: Option<Value>,
}

impl Reference {
    pub fn ident(name: impl Into<Arc<str>>) -> Self {
        Reference {
            name: name.into(),
            overload_ids: Vec::new(),
            value: None,
        }
    }

    pub fn call(name: impl Into<Arc<str>>, overload_ids: Vec<Arc<str>>) -> Self {
        Reference {
            name: name.into(),
            overload_ids,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}
