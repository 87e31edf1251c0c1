//! Rust-level error types for the embedding API.
//!
//! These are distinct from CEL's in-language error *value*
//! ([`crate::common::value::CelErrorValue`]), which is data that flows
//! through evaluation like any other [`crate::common::value::Value`].
//! `CompileError` and `EvalError` only ever surface host-side misuse:
//! a parse/check failure, or a `Program` driven with an activation it
//! cannot make sense of.

use crate::diagnostic::Diagnostic;
use thiserror::Error;

/// Returned by [`crate::env::Environment::compile`] when parsing or
/// checking produced at least one error-severity diagnostic.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}", format_diagnostics(.0))]
pub struct CompileError(pub Vec<Diagnostic>);

fn format_diagnostics(diags: &[Diagnostic]) -> String {
    match diags.first() {
        Some(first) if diags.len() == 1 => first.to_string(),
        Some(first) => format!("{first} (and {} more)", diags.len() - 1),
        None => "compilation failed with no diagnostics".to_string(),
    }
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

/// Host-side evaluation misuse: never returned for ordinary CEL
/// failures (those are [`crate::common::value::Value::Error`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("activation is missing required variable `{0}`")]
    MissingVariable(String),
    #[error("program was built against a different type registry than the activation")]
    RegistryMismatch,
    #[error("recursion limit exceeded during evaluation")]
    RecursionLimit,
}
