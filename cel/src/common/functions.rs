//! Function declarations and the host function-binding contract.

use crate::common::value::Value;
use crate::types::CelType;
use std::fmt;
use std::sync::Arc;

/// The function-binding contract of spec §6: a fixed-arity slice of
/// already-evaluated argument values in, one value out. Implementations
/// must never panic; a mismatched runtime kind is reported as a
/// `Value::Error` ("no such overload"), never a Rust panic or abort.
pub type FunctionOp = dyn Fn(&[Value]) -> Value + Send + Sync;

#[derive(Clone)]
pub struct OverloadDecl {
    pub id: Arc<str>,
    pub arg_types: Vec<CelType>,
    pub result_type: CelType,
    pub member_function: bool,
    pub implementation: Option<Arc<FunctionOp>>,
}

impl fmt::Debug for OverloadDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverloadDecl")
            .field("id", &self.id)
            .field("arg_types", &self.arg_types)
            .field("result_type", &self.result_type)
            .field("member_function", &self.member_function)
            .field("implementation", &self.implementation.is_some())
            .finish()
    }
}

impl OverloadDecl {
    pub fn new(
        id: impl Into<Arc<str>>,
        arg_types: Vec<CelType>,
        result_type: CelType,
        member_function: bool,
    ) -> Self {
        OverloadDecl {
            id: id.into(),
            arg_types,
            result_type,
            member_function,
            implementation: None,
        }
    }

    pub fn with_implementation(
        mut self,
        f: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.implementation = Some(Arc::new(f));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Arc<str>,
    pub overloads: Vec<OverloadDecl>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<Arc<str>>, overloads: Vec<OverloadDecl>) -> Self {
        FunctionDecl {
            name: name.into(),
            overloads,
        }
    }

    /// Overlapping overload: same overload id already present, or an
    /// identical arity+argument-type signature for a differently named
    /// overload id.
    pub fn add_overload(&mut self, overload: OverloadDecl) -> Result<(), String> {
        for existing in &self.overloads {
            if existing.id == overload.id {
                return Err(format!("overlapping overload: {}", overload.id));
            }
            if existing.arg_types == overload.arg_types
                && existing.member_function == overload.member_function
            {
                return Err(format!(
                    "overlapping overload: {} and {} have identical signatures",
                    existing.id, overload.id
                ));
            }
        }
        self.overloads.push(overload);
        Ok(())
    }
}
