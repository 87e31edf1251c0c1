//! Compiles a [`CheckedAst`] into a [`Plan`] tree the interpreter
//! walks directly. Planning resolves every call's candidate overloads
//! once (instead of per-evaluation), collapses select/constant-index
//! chains into [`Attribute`]s so partial evaluation can match
//! [`crate::interpreter::unknown::AttributePattern`]s against them,
//! and (when [`crate::env::EvalOptions::OPTIMIZE`] is set) folds
//! constant subexpressions of the native operators.

pub mod attribute;

use crate::ast::{ComprehensionExpr, Expr, IdedExpr, LiteralKind, NodeId};
use crate::checker::scope::DeclEnv;
use crate::checker::CheckedAst;
use crate::common::functions::OverloadDecl;
use crate::common::value::Value;
use crate::env::EvalOptions;
use attribute::Attribute;
use std::sync::Arc;

/// A planned node. `id` is the originating AST node id, carried
/// through so the interpreter can record per-node evaluation state
/// (for `TrackState`/partial eval) and so `Unknown` values can name
/// the node responsible.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: NodeId,
    pub kind: PlanKind,
}

impl Plan {
    fn new(id: NodeId, kind: PlanKind) -> Self {
        Plan { id, kind }
    }
}

#[derive(Debug, Clone)]
pub enum PlanKind {
    Const(Value),
    Attr(Attribute),
    /// `has(attribute)`, when the operand collapsed to an attribute chain.
    Has(Attribute),
    /// `has(expr.field)` where `expr` is not attribute-rooted (e.g. the
    /// result of a function call).
    HasDynamic(Box<Plan>, Arc<str>),
    Select(Box<Plan>, Arc<str>),
    Index(Box<Plan>, Box<Plan>),
    Call {
        function: Arc<str>,
        target: Option<Box<Plan>>,
        args: Vec<Plan>,
        overloads: Vec<OverloadDecl>,
    },
    And(Box<Plan>, Box<Plan>),
    Or(Box<Plan>, Box<Plan>),
    Not(Box<Plan>),
    Neg(Box<Plan>),
    In(Box<Plan>, Box<Plan>),
    Ternary(Box<Plan>, Box<Plan>, Box<Plan>),
    List(Vec<Plan>),
    Map(Vec<(Plan, Plan)>),
    Struct {
        type_name: Arc<str>,
        fields: Vec<(Arc<str>, Plan)>,
    },
    Comprehension(Box<ComprehensionPlan>),
}

#[derive(Debug, Clone)]
pub struct ComprehensionPlan {
    pub iter_var: Arc<str>,
    pub iter_range: Plan,
    pub accu_var: Arc<str>,
    pub accu_init: Plan,
    pub loop_condition: Plan,
    pub loop_step: Plan,
    pub result: Plan,
}

pub struct Planner<'a> {
    checked: &'a CheckedAst,
    env: &'a DeclEnv,
    optimize: bool,
}

impl<'a> Planner<'a> {
    pub fn plan(checked: &'a CheckedAst, env: &'a DeclEnv, options: EvalOptions) -> Plan {
        let planner = Planner { checked, env, optimize: options.contains(EvalOptions::OPTIMIZE) };
        let plan = planner.plan_expr(&checked.ast.root);
        if planner.optimize {
            fold_constants(plan)
        } else {
            plan
        }
    }

    fn plan_expr(&self, e: &IdedExpr) -> Plan {
        let kind = match &e.expr {
            Expr::Literal(lit) => PlanKind::Const(literal_value(lit)),
            Expr::Ident(_) => return self.plan_ident(e.id),
            Expr::Select(s) => return self.plan_select(e.id, s),
            Expr::Call(c) => return self.plan_call(e.id, c),
            Expr::List(l) => PlanKind::List(l.elements.iter().map(|e| self.plan_expr(e)).collect()),
            Expr::Map(m) => PlanKind::Map(
                m.entries
                    .iter()
                    .map(|entry| (self.plan_expr(&entry.key), self.plan_expr(&entry.value)))
                    .collect(),
            ),
            Expr::Struct(s) => PlanKind::Struct {
                type_name: s.message_name.clone(),
                fields: s.fields.iter().map(|f| (f.name.clone(), self.plan_expr(&f.value))).collect(),
            },
            Expr::Comprehension(c) => return self.plan_comprehension(e.id, c),
        };
        Plan::new(e.id, kind)
    }

    fn plan_ident(&self, id: NodeId) -> Plan {
        let kind = match self.checked.references.get(&id) {
            Some(reference) => match &reference.value {
                Some(v) => PlanKind::Const(v.clone()),
                None => PlanKind::Attr(Attribute::root(reference.name.clone())),
            },
            None => PlanKind::Attr(Attribute::root("")), // unresolved; checker already emitted a diagnostic
        };
        Plan::new(id, kind)
    }

    fn plan_select(&self, id: NodeId, s: &crate::ast::SelectExpr) -> Plan {
        if let Some(reference) = self.checked.references.get(&id) {
            // The checker collapsed this (and its operand chain) into a
            // container-qualified reference; treat it exactly like an ident.
            let kind = match &reference.value {
                Some(v) => PlanKind::Const(v.clone()),
                None => PlanKind::Attr(Attribute::root(reference.name.clone())),
            };
            return Plan::new(id, kind);
        }
        let operand = self.plan_expr(&s.operand);
        if s.test_only {
            let kind = match operand.kind {
                PlanKind::Attr(attr) => PlanKind::Has(attr.with_field(s.field.clone())),
                _ => PlanKind::HasDynamic(Box::new(operand), s.field.clone()),
            };
            return Plan::new(id, kind);
        }
        let kind = match operand.kind {
            PlanKind::Attr(attr) => PlanKind::Attr(attr.with_field(s.field.clone())),
            _ => PlanKind::Select(Box::new(operand), s.field.clone()),
        };
        Plan::new(id, kind)
    }

    fn plan_call(&self, id: NodeId, c: &crate::ast::CallExpr) -> Plan {
        let target = c.target.as_ref().map(|t| Box::new(self.plan_expr(t)));
        let args: Vec<Plan> = c.args.iter().map(|a| self.plan_expr(a)).collect();

        let kind = match c.function.as_ref() {
            "_&&_" => {
                let mut args = args;
                let r = args.pop().unwrap();
                let l = args.pop().unwrap();
                PlanKind::And(Box::new(l), Box::new(r))
            }
            "_||_" => {
                let mut args = args;
                let r = args.pop().unwrap();
                let l = args.pop().unwrap();
                PlanKind::Or(Box::new(l), Box::new(r))
            }
            "!_" => PlanKind::Not(Box::new(args.into_iter().next().unwrap())),
            "-_" => PlanKind::Neg(Box::new(args.into_iter().next().unwrap())),
            "@in" => {
                let mut args = args;
                let r = args.pop().unwrap();
                let l = args.pop().unwrap();
                PlanKind::In(Box::new(l), Box::new(r))
            }
            "_?_:_" => {
                let mut args = args;
                let c3 = args.pop().unwrap();
                let c2 = args.pop().unwrap();
                let c1 = args.pop().unwrap();
                PlanKind::Ternary(Box::new(c1), Box::new(c2), Box::new(c3))
            }
            "_[_]" => {
                let mut args = args;
                let key = args.pop().unwrap();
                let base = args.pop().unwrap();
                match (base.kind, key) {
                    (PlanKind::Attr(attr), Plan { kind: PlanKind::Const(k), .. }) => PlanKind::Attr(attr.with_index(k)),
                    (base_kind, key) => PlanKind::Index(Box::new(Plan::new(base.id, base_kind)), Box::new(key)),
                }
            }
            _ => {
                let overloads = self.resolve_overloads(&c.function, id, target.is_some());
                PlanKind::Call { function: c.function.clone(), target, args, overloads }
            }
        };
        Plan::new(id, kind)
    }

    fn resolve_overloads(&self, function: &str, id: NodeId, is_member: bool) -> Vec<OverloadDecl> {
        let decl = if is_member {
            self.env.resolve_function_exact(function)
        } else {
            self.env.resolve_function(function).map(|(_, d)| d)
        };
        let Some(decl) = decl else { return Vec::new() };
        let Some(reference) = self.checked.references.get(&id) else { return decl.overloads.clone() };
        decl.overloads
            .iter()
            .filter(|o| reference.overload_ids.iter().any(|want| want.as_ref() == o.id.as_ref()))
            .cloned()
            .collect()
    }

    fn plan_comprehension(&self, id: NodeId, c: &ComprehensionExpr) -> Plan {
        let kind = PlanKind::Comprehension(Box::new(ComprehensionPlan {
            iter_var: c.iter_var.clone(),
            iter_range: self.plan_expr(&c.iter_range),
            accu_var: c.accu_var.clone(),
            accu_init: self.plan_expr(&c.accu_init),
            loop_condition: self.plan_expr(&c.loop_condition),
            loop_step: self.plan_expr(&c.loop_step),
            result: self.plan_expr(&c.result),
        }));
        Plan::new(id, kind)
    }
}

fn literal_value(lit: &LiteralKind) -> Value {
    match lit {
        LiteralKind::Null => Value::Null,
        LiteralKind::Bool(b) => Value::Bool(*b),
        LiteralKind::Int(i) => Value::Int(*i),
        LiteralKind::UInt(u) => Value::UInt(*u),
        LiteralKind::Double(d) => Value::Double(*d),
        LiteralKind::String(s) => Value::String(s.clone()),
        LiteralKind::Bytes(b) => Value::Bytes(b.clone()),
    }
}

/// Folds the native operators (arithmetic, logical, comparison) over
/// constant operands. Calls through the registry (custom host
/// functions) are never folded: their implementations may be
/// non-deterministic or capture host state, and folding would change
/// how often they're invoked.
fn fold_constants(plan: Plan) -> Plan {
    let Plan { id, kind } = plan;
    let kind = match kind {
        PlanKind::Not(inner) => match fold_constants(*inner) {
            Plan { kind: PlanKind::Const(v), .. } => PlanKind::Const(!&v),
            folded => PlanKind::Not(Box::new(folded)),
        },
        PlanKind::Neg(inner) => match fold_constants(*inner) {
            Plan { kind: PlanKind::Const(v), .. } => PlanKind::Const(-&v),
            folded => PlanKind::Neg(Box::new(folded)),
        },
        PlanKind::And(l, r) => {
            let (l, r) = (fold_constants(*l), fold_constants(*r));
            match (&l.kind, &r.kind) {
                (PlanKind::Const(Value::Bool(false)), _) | (_, PlanKind::Const(Value::Bool(false))) => PlanKind::Const(Value::Bool(false)),
                (PlanKind::Const(Value::Bool(true)), PlanKind::Const(Value::Bool(true))) => PlanKind::Const(Value::Bool(true)),
                _ => PlanKind::And(Box::new(l), Box::new(r)),
            }
        }
        PlanKind::Or(l, r) => {
            let (l, r) = (fold_constants(*l), fold_constants(*r));
            match (&l.kind, &r.kind) {
                (PlanKind::Const(Value::Bool(true)), _) | (_, PlanKind::Const(Value::Bool(true))) => PlanKind::Const(Value::Bool(true)),
                (PlanKind::Const(Value::Bool(false)), PlanKind::Const(Value::Bool(false))) => PlanKind::Const(Value::Bool(false)),
                _ => PlanKind::Or(Box::new(l), Box::new(r)),
            }
        }
        PlanKind::Ternary(c, t, f) => match fold_constants(*c) {
            Plan { kind: PlanKind::Const(Value::Bool(true)), .. } => return fold_constants(*t),
            Plan { kind: PlanKind::Const(Value::Bool(false)), .. } => return fold_constants(*f),
            folded => PlanKind::Ternary(Box::new(folded), Box::new(fold_constants(*t)), Box::new(fold_constants(*f))),
        },
        PlanKind::Call { function, target, args, overloads } => {
            let args: Vec<Plan> = args.into_iter().map(fold_constants).collect();
            if target.is_none() && args.iter().all(|a| matches!(a.kind, PlanKind::Const(_))) {
                if let Some(folded) = fold_native_call(&function, &args) {
                    return Plan::new(id, PlanKind::Const(folded));
                }
            }
            PlanKind::Call { function, target, args, overloads }
        }
        PlanKind::List(items) => PlanKind::List(items.into_iter().map(fold_constants).collect()),
        PlanKind::Map(entries) => PlanKind::Map(entries.into_iter().map(|(k, v)| (fold_constants(k), fold_constants(v))).collect()),
        PlanKind::Select(base, field) => PlanKind::Select(Box::new(fold_constants(*base)), field),
        PlanKind::Index(base, key) => PlanKind::Index(Box::new(fold_constants(*base)), Box::new(fold_constants(*key))),
        PlanKind::In(item, container) => PlanKind::In(Box::new(fold_constants(*item)), Box::new(fold_constants(*container))),
        PlanKind::HasDynamic(base, field) => PlanKind::HasDynamic(Box::new(fold_constants(*base)), field),
        other => other,
    };
    Plan::new(id, kind)
}

fn fold_native_call(function: &str, args: &[Plan]) -> Option<Value> {
    let values: Vec<&Value> = args
        .iter()
        .map(|a| match &a.kind {
            PlanKind::Const(v) => v,
            _ => unreachable!(),
        })
        .collect();
    Some(match (function, values.as_slice()) {
        ("_+_", [a, b]) => &**a + &**b,
        ("_-_", [a, b]) => &**a - &**b,
        ("_*_", [a, b]) => &**a * &**b,
        ("_/_", [a, b]) => &**a / &**b,
        ("_%_", [a, b]) => &**a % &**b,
        ("_==_", [a, b]) => a.cel_eq(b),
        ("_!=_", [a, b]) => a.cel_ne(b),
        _ => return None,
    })
}
