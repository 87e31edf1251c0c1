//! Tree-walking evaluation of a [`Plan`] against an [`Activation`]
//! (spec §4.6): short-circuit logic, comprehension frames, call
//! dispatch, and (when `TrackState`/`PartialEval` are set) per-node
//! state recording for residual reconstruction.

pub mod activation;
pub mod residual;
pub mod unknown;

use crate::ast::NodeId;
use crate::common::value::{Comparer, Container, Indexer, Value};
use crate::env::EvalOptions;
use crate::functions;
use crate::planner::attribute::{Attribute, Qualifier};
use crate::planner::{ComprehensionPlan, Plan, PlanKind};
use crate::registry::CelStruct;
use crate::types::CelType;
use activation::{Activation, ChildActivation};
use hashbrown::HashMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::sync::Arc;
use unknown::AttributePattern;

/// Per-node evaluation results, recorded when `TrackState` or
/// `PartialEval` is set. The residual pass consults this to decide
/// which nodes collapse to literals.
#[derive(Debug, Default)]
pub struct EvalState {
    values: HashMap<NodeId, Value>,
}

impl EvalState {
    pub fn get(&self, id: NodeId) -> Option<&Value> {
        self.values.get(&id)
    }
}

pub struct Interpreter<'a> {
    activation: &'a dyn Activation,
    options: EvalOptions,
    state: RefCell<EvalState>,
}

impl<'a> Interpreter<'a> {
    pub fn new(activation: &'a dyn Activation, options: EvalOptions) -> Self {
        Interpreter { activation, options, state: RefCell::new(EvalState::default()) }
    }

    /// Evaluates `plan` and returns the result. Use [`Self::eval_tracked`]
    /// when the recorded per-node state (needed for residual
    /// reconstruction) is also wanted.
    pub fn eval(plan: &Plan, activation: &dyn Activation, options: EvalOptions) -> Value {
        let interp = Interpreter::new(activation, options);
        interp.eval_plan(plan)
    }

    pub fn eval_tracked(plan: &Plan, activation: &dyn Activation, options: EvalOptions) -> (Value, EvalState) {
        let interp = Interpreter::new(activation, options | EvalOptions::TRACK_STATE);
        let result = interp.eval_plan(plan);
        (result, interp.state.into_inner())
    }

    fn track(&self, id: NodeId, value: &Value) {
        if self.options.intersects(EvalOptions::TRACK_STATE | EvalOptions::PARTIAL_EVAL) {
            self.state.borrow_mut().values.insert(id, value.clone());
        }
    }

    fn exhaustive(&self) -> bool {
        self.options.contains(EvalOptions::EXHAUSTIVE_EVAL)
    }

    fn eval_plan(&self, plan: &Plan) -> Value {
        let value = self.eval_kind(plan.id, &plan.kind);
        self.track(plan.id, &value);
        value
    }

    fn eval_kind(&self, id: NodeId, kind: &PlanKind) -> Value {
        match kind {
            PlanKind::Const(v) => v.clone(),
            PlanKind::Attr(attr) => self.resolve_attribute(id, attr),
            PlanKind::Has(attr) => self.eval_has(attr),
            PlanKind::HasDynamic(base, field) => {
                let base_v = self.eval_plan(base);
                eval_has_on_value(&base_v, field)
            }
            PlanKind::Select(base, field) => {
                let base_v = self.eval_plan(base);
                select_field(&base_v, field)
            }
            PlanKind::Index(base, key) => {
                let base_v = self.eval_plan(base);
                let key_v = self.eval_plan(key);
                base_v.cel_index(&key_v)
            }
            PlanKind::Call { function, target, args, overloads } => self.eval_call(function, target, args, overloads),
            PlanKind::And(l, r) => self.eval_and(l, r),
            PlanKind::Or(l, r) => self.eval_or(l, r),
            PlanKind::Not(inner) => !&self.eval_plan(inner),
            PlanKind::Neg(inner) => -&self.eval_plan(inner),
            PlanKind::In(item, container) => {
                let item_v = self.eval_plan(item);
                let container_v = self.eval_plan(container);
                container_v.cel_contains(&item_v)
            }
            PlanKind::Ternary(c, t, f) => self.eval_ternary(c, t, f),
            PlanKind::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let v = self.eval_plan(item);
                    if v.is_error() || v.is_unknown() {
                        return v;
                    }
                    out.push(v);
                }
                Value::List(Arc::new(out))
            }
            PlanKind::Map(entries) => self.eval_map(entries),
            PlanKind::Struct { type_name, fields } => self.eval_struct(type_name, fields),
            PlanKind::Comprehension(c) => self.eval_comprehension(c),
        }
    }

    fn resolve_attribute(&self, id: NodeId, attr: &Attribute) -> Value {
        if attr.var.is_empty() {
            return Value::no_such_attribute("<unresolved>");
        }
        if self.activation.unknown_patterns().iter().any(|p| p.matches(attr)) {
            return Value::Unknown(crate::common::value::UnknownSet::single(id));
        }
        let Some(mut value) = self.activation.resolve(&attr.var) else {
            return Value::no_such_attribute(&attr.var);
        };
        for q in &attr.qualifiers {
            if value.is_error() || value.is_unknown() {
                return value;
            }
            value = match q {
                Qualifier::Field(name) => select_field(&value, name),
                Qualifier::Index(key) => value.cel_index(key),
            };
        }
        value
    }

    fn eval_has(&self, attr: &Attribute) -> Value {
        let Some((last, prefix)) = attr.qualifiers.split_last() else {
            return Value::error("invalid_argument: has() requires a field selection");
        };
        let Qualifier::Field(field) = last else {
            return Value::error("invalid_argument: has() requires a field selection");
        };
        let prefix_attr = Attribute { var: attr.var.clone(), qualifiers: prefix.to_vec() };
        // has() itself is not tracked against a real node id for unknown
        // purposes beyond the prefix resolution below.
        let base = self.resolve_attribute(u64::MAX, &prefix_attr);
        eval_has_on_value(&base, field)
    }

    fn eval_and(&self, l: &Plan, r: &Plan) -> Value {
        let lv = self.eval_plan(l);
        if let Value::Bool(false) = lv {
            if self.exhaustive() {
                self.eval_plan(r);
            }
            return Value::Bool(false);
        }
        if let Value::Bool(true) = lv {
            return self.eval_plan(r);
        }
        let rv = self.eval_plan(r);
        if let Value::Bool(false) = rv {
            return Value::Bool(false);
        }
        lv
    }

    fn eval_or(&self, l: &Plan, r: &Plan) -> Value {
        let lv = self.eval_plan(l);
        if let Value::Bool(true) = lv {
            if self.exhaustive() {
                self.eval_plan(r);
            }
            return Value::Bool(true);
        }
        if let Value::Bool(false) = lv {
            return self.eval_plan(r);
        }
        let rv = self.eval_plan(r);
        if let Value::Bool(true) = rv {
            return Value::Bool(true);
        }
        lv
    }

    fn eval_ternary(&self, c: &Plan, t: &Plan, f: &Plan) -> Value {
        let cv = self.eval_plan(c);
        match cv {
            Value::Bool(true) => {
                let tv = self.eval_plan(t);
                if self.exhaustive() {
                    self.eval_plan(f);
                }
                tv
            }
            Value::Bool(false) => {
                let fv = self.eval_plan(f);
                if self.exhaustive() {
                    self.eval_plan(t);
                }
                fv
            }
            other => other, // error/unknown in the condition propagates directly
        }
    }

    fn eval_map(&self, entries: &[(Plan, Plan)]) -> Value {
        use crate::common::value::{MapKey, ValueMap};
        let mut m = ValueMap::new();
        for (k, v) in entries {
            let kv = self.eval_plan(k);
            if kv.is_error() || kv.is_unknown() {
                return kv;
            }
            let vv = self.eval_plan(v);
            if vv.is_error() || vv.is_unknown() {
                return vv;
            }
            let key = match kv {
                Value::Bool(b) => MapKey::Bool(b),
                Value::Int(i) => MapKey::Int(i),
                Value::UInt(u) => MapKey::UInt(u),
                Value::String(s) => MapKey::String(s),
                other => return Value::error(format!("invalid_argument: unsupported map key type {}", other.cel_type())),
            };
            m.insert(key, vv);
        }
        Value::Map(Arc::new(m))
    }

    fn eval_struct(&self, type_name: &Arc<str>, fields: &[(Arc<str>, Plan)]) -> Value {
        let mut map = hashbrown::HashMap::new();
        for (name, plan) in fields {
            let v = self.eval_plan(plan);
            if v.is_error() || v.is_unknown() {
                return v;
            }
            map.insert(name.clone(), v);
        }
        Value::Struct(Arc::new(crate::registry::DynStruct::new(type_name.clone(), map)))
    }

    fn eval_call(&self, function: &str, target: &Option<Box<Plan>>, args: &[Plan], overloads: &[crate::common::functions::OverloadDecl]) -> Value {
        let target_v = target.as_ref().map(|t| self.eval_plan(t));
        let mut full_args: Vec<Value> = Vec::with_capacity(args.len() + 1);
        if let Some(t) = &target_v {
            full_args.push(t.clone());
        }
        for a in args {
            full_args.push(self.eval_plan(a));
        }
        if let Some(v) = crate::common::value::propagate(&full_args.iter().collect::<Vec<_>>()) {
            return v;
        }

        if let Some(v) = dispatch_native_operator(function, &full_args) {
            return v;
        }

        if let Some(overload) = select_overload(overloads, &full_args) {
            if let Some(imp) = &overload.implementation {
                return imp(&full_args);
            }
        }

        if let Some(v) = functions::call_builtin(function, "", &full_args) {
            return v;
        }

        Value::no_such_overload(function)
    }

    fn eval_comprehension(&self, c: &ComprehensionPlan) -> Value {
        let range = self.eval_plan(&c.iter_range);
        if range.is_error() || range.is_unknown() {
            return range;
        }
        let Some(items) = crate::common::value::Iterable::cel_iter(&range) else {
            return Value::error(format!("invalid_argument: cannot iterate over {}", range.cel_type()));
        };

        let mut accu = self.eval_plan(&c.accu_init);
        for item in items {
            let iter_activation = ChildActivation::new(self.activation, c.iter_var.clone(), item);
            let loop_activation = ChildActivation::new(&iter_activation, c.accu_var.clone(), accu.clone());
            let inner = Interpreter { activation: &loop_activation, options: self.options, state: RefCell::new(EvalState::default()) };

            // Only a decided `false` ends the loop early; an error or
            // unknown condition (e.g. `!@accu` over an errored accu)
            // keeps iterating so a later element can still decide.
            if let Value::Bool(false) = inner.eval_plan(&c.loop_condition) {
                break;
            }
            accu = inner.eval_plan(&c.loop_step);
        }

        let result_activation = ChildActivation::new(self.activation, c.accu_var.clone(), accu);
        let inner = Interpreter { activation: &result_activation, options: self.options, state: RefCell::new(EvalState::default()) };
        inner.eval_plan(&c.result)
    }
}

fn eval_has_on_value(base: &Value, field: &str) -> Value {
    match base {
        Value::Map(m) => Value::Bool(m.contains_key(&Value::String(Arc::from(field)))),
        Value::Struct(s) => Value::Bool(s.field(field).is_some()),
        Value::Error(_) | Value::Unknown(_) => base.clone(),
        other => Value::error(format!("invalid_argument: has() requires a message or map, got {}", other.cel_type())),
    }
}

fn select_field(base: &Value, field: &str) -> Value {
    match base {
        Value::Map(m) => m.get(&Value::String(Arc::from(field))).cloned().unwrap_or_else(|| Value::no_such_key(&Value::String(Arc::from(field)))),
        Value::Struct(s) => s.field(field).unwrap_or_else(|| Value::no_such_attribute(field)),
        Value::Error(_) | Value::Unknown(_) => base.clone(),
        other => Value::error(format!("invalid_argument: cannot select field '{field}' on {}", other.cel_type())),
    }
}

/// The standard operators dispatched directly against `Value`'s own
/// arithmetic/comparison traits rather than through a registry lookup
/// (see `functions` module docs for the rationale).
fn dispatch_native_operator(function: &str, args: &[Value]) -> Option<Value> {
    if args.len() != 2 {
        return None;
    }
    let (a, b) = (&args[0], &args[1]);
    Some(match function {
        "_+_" => a + b,
        "_-_" => a - b,
        "_*_" => a * b,
        "_/_" => a / b,
        "_%_" => a % b,
        "_==_" => a.cel_eq(b),
        "_!=_" => a.cel_ne(b),
        "_<_" => cmp_to_bool(a.cel_cmp(b), Ordering::is_lt, function),
        "_<=_" => cmp_to_bool(a.cel_cmp(b), Ordering::is_le, function),
        "_>_" => cmp_to_bool(a.cel_cmp(b), Ordering::is_gt, function),
        "_>=_" => cmp_to_bool(a.cel_cmp(b), Ordering::is_ge, function),
        _ => return None,
    })
}

fn cmp_to_bool(ord: Option<Ordering>, pick: impl Fn(Ordering) -> bool, function: &str) -> Value {
    match ord {
        Some(o) => Value::Bool(pick(o)),
        None => Value::no_such_overload(function),
    }
}

/// Picks the overload whose declared argument types accept the
/// runtime values, used for registry-routed calls (custom host
/// functions; the checker already narrowed `overloads` to the
/// statically-resolved candidates, so this is usually a singleton).
fn select_overload<'a>(overloads: &'a [crate::common::functions::OverloadDecl], args: &[Value]) -> Option<&'a crate::common::functions::OverloadDecl> {
    overloads.iter().find(|o| o.arg_types.len() == args.len() && o.arg_types.iter().zip(args).all(|(t, v)| value_matches_type(v, t)))
}

fn value_matches_type(v: &Value, t: &CelType) -> bool {
    matches!(t, CelType::Dyn | CelType::TypeParam(_)) || v.cel_type().unify(t, &mut HashMap::new())
}
