//! A parser, type checker, planner, and interpreter for the Common
//! Expression Language (CEL): a small, side-effect-free expression
//! language for evaluating boolean and computational expressions
//! against host-supplied variables.
//!
//! ```
//! use cel::{Environment, Source};
//! use cel::interpreter::activation::MapActivation;
//!
//! let env = Environment::builder()
//!     .add_variable("name", cel::types::CelType::String)
//!     .build();
//! let program = env.compile(&Source::from("'hello ' + name")).unwrap();
//! let activation = MapActivation::new().bind("name", "world");
//! assert_eq!(program.eval(&activation).to_string(), "\"hello world\"");
//! ```

pub mod ast;
pub mod checker;
pub mod common;
pub mod diagnostic;
pub mod env;
pub mod functions;
pub mod interpreter;
pub mod parser;
pub mod planner;
pub mod program;
pub mod registry;
pub mod source;
pub mod types;
pub mod unparse;

pub use common::error::{CompileError, EvalError};
pub use common::value::Value;
pub use diagnostic::Diagnostic;
pub use env::{EnvBuilder, EvalOptions, Environment};
pub use program::Program;
pub use source::Source;
pub use types::CelType;
