//! The configuration surface (spec §6 `new_environment(options…)`):
//! container, declarations, registered types, and evaluation options,
//! built once and then compiled against many expressions.

use crate::checker::scope::DeclEnv;
use crate::checker::{CheckedAst, Checker};
use crate::common::decls::VariableDecl;
use crate::common::error::CompileError;
use crate::common::functions::{FunctionDecl, OverloadDecl};
use crate::diagnostic::Diagnostic;
use crate::functions;
use crate::parser;
use crate::planner::Planner;
use crate::program::Program;
use crate::registry::{TypeDescriptor, TypeRegistry, TypeRegistryBuilder};
use crate::source::Source;
use crate::types::CelType;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Evaluation options (spec §6). `PARTIAL_EVAL` and `TRACK_STATE`
    /// both enable per-node state recording; `PARTIAL_EVAL` additionally
    /// tells the interpreter to consult the activation's unknown
    /// attribute patterns.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EvalOptions: u8 {
        const OPTIMIZE        = 0b0001;
        const EXHAUSTIVE_EVAL = 0b0010;
        const TRACK_STATE     = 0b0100;
        const PARTIAL_EVAL    = 0b1000;
    }
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions::empty()
    }
}

/// A fully configured environment: declarations, registered types, and
/// evaluation options. Pure and immutable once built; safe to share
/// across threads and reuse for any number of `compile` calls.
#[derive(Debug, Clone)]
pub struct Environment {
    base_env: DeclEnv,
    registry: TypeRegistry,
    options: EvalOptions,
}

impl Environment {
    pub fn builder() -> EnvBuilder {
        EnvBuilder::new()
    }

    pub fn options(&self) -> EvalOptions {
        self.options
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Parses, checks, and plans `source`, producing a reusable
    /// [`Program`]. Each call checks against a fresh clone of the
    /// environment's base declarations, so compiling never mutates
    /// shared state.
    pub fn compile(&self, source: &Source) -> Result<Program, CompileError> {
        let ast = parser::parse(source).map_err(CompileError)?;
        let mut env = self.base_env.clone();
        let (checked, diagnostics) = Checker::check(ast, &mut env, &self.registry, Some(source));
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(CompileError(diagnostics));
        }
        let plan = Planner::plan(&checked, &env, self.options);
        Ok(Program::new(plan, checked, self.options))
    }

    /// Reconstructs a pruned AST from a checked AST and the per-node
    /// state a partial evaluation recorded (spec §4.6).
    pub fn residual_ast(&self, checked: &CheckedAst, state: &crate::interpreter::EvalState) -> crate::ast::Ast {
        crate::interpreter::residual::residual_ast(&checked.ast, state)
    }
}

#[derive(Debug, Default)]
pub struct EnvBuilder {
    container: Arc<str>,
    variables: Vec<VariableDecl>,
    functions: Vec<FunctionDecl>,
    registry: TypeRegistryBuilder,
    options: EvalOptions,
}

impl EnvBuilder {
    pub fn new() -> Self {
        EnvBuilder::default()
    }

    pub fn container(mut self, name: impl Into<Arc<str>>) -> Self {
        self.container = name.into();
        self
    }

    pub fn add_variable(mut self, name: impl Into<Arc<str>>, cel_type: CelType) -> Self {
        self.variables.push(VariableDecl::new(name, cel_type));
        self
    }

    pub fn add_type(self, descriptor: TypeDescriptor) -> Self {
        self.register_type(descriptor)
    }

    pub fn register_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.registry.register_type(descriptor);
        self
    }

    pub fn register_enum_value(mut self, qualified_name: impl Into<Arc<str>>, value: i64) -> Self {
        self.registry.register_enum_value(qualified_name, value);
        self
    }

    pub fn add_function(mut self, decl: FunctionDecl) -> Self {
        self.functions.push(decl);
        self
    }

    pub fn add_overload(mut self, name: impl Into<Arc<str>>, overload: OverloadDecl) -> Self {
        self.functions.push(FunctionDecl::new(name, vec![overload]));
        self
    }

    pub fn eval_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Environment {
        let mut base_env = DeclEnv::new(self.container);
        functions::install_standard_declarations(&mut base_env);
        for v in self.variables {
            base_env.declare_var(v).expect("caller-supplied variable declarations must not collide");
        }
        for f in self.functions {
            base_env.declare_function(f).expect("caller-supplied function declarations must not collide with the standard library");
        }
        Environment { base_env, registry: self.registry.build(), options: self.options }
    }
}
