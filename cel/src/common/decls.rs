//! Declaration shapes held by the environment's scope stack.

use crate::types::CelType;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: Arc<str>,
    pub cel_type: CelType,
}

impl VariableDecl {
    pub fn new(name: impl Into<Arc<str>>, cel_type: CelType) -> Self {
        VariableDecl {
            name: name.into(),
            cel_type,
        }
    }
}
