//! A compiled, reusable expression: the result of [`crate::env::Environment::compile`].
//! Pure and side-effect free; the same `Program` may be evaluated
//! against any number of activations, including concurrently.

use crate::checker::CheckedAst;
use crate::common::value::Value;
use crate::env::EvalOptions;
use crate::interpreter::activation::Activation;
use crate::interpreter::{EvalState, Interpreter};
use crate::planner::Plan;

/// The outcome of one evaluation: the result value plus, when
/// `TrackState`/`PartialEval` were set, the per-node state needed for
/// residual reconstruction.
pub struct EvalDetails {
    pub state: EvalState,
}

pub struct Program {
    plan: Plan,
    checked: CheckedAst,
    options: EvalOptions,
}

impl Program {
    pub(crate) fn new(plan: Plan, checked: CheckedAst, options: EvalOptions) -> Self {
        Program { plan, checked, options }
    }

    pub fn checked_ast(&self) -> &CheckedAst {
        &self.checked
    }

    /// Evaluates against `activation`, discarding per-node state.
    pub fn eval(&self, activation: &dyn Activation) -> Value {
        Interpreter::eval(&self.plan, activation, self.options)
    }

    /// Evaluates against `activation` and also returns the evaluation
    /// details needed to call [`crate::env::Environment::residual_ast`]
    /// afterward.
    pub fn eval_with_details(&self, activation: &dyn Activation) -> (Value, EvalDetails) {
        let (value, state) = Interpreter::eval_tracked(&self.plan, activation, self.options);
        (value, EvalDetails { state })
    }
}
