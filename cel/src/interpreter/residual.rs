//! Residual AST reconstruction (spec §4.6): given recorded per-node
//! evaluation state, replaces every node whose id resolved to a
//! concrete scalar with a literal and leaves `Unknown` nodes (and
//! their subtrees) untouched, preserving node ids throughout so a
//! subsequent parse/check/plan pass over the residual still lines up
//! with any state collected from it.
//!
//! `_&&_`/`_||_` get special handling: short-circuit evaluation means
//! the decided-but-unresolved side of a partial `&&`/`||` carries an
//! absorbing or identity boolean, and the residual should drop it the
//! same way `true && X`/`X && true` both reduce to `X` algebraically,
//! rather than keeping the whole (still partially unknown) call intact.

use crate::ast::{Ast, CallExpr, ComprehensionExpr, Expr, IdedExpr, LiteralKind, ListExpr, MapEntry, MapExpr, NodeId, SelectExpr, StructExpr, StructFieldInit};
use crate::common::value::Value;
use crate::interpreter::EvalState;

pub fn residual_ast(ast: &Ast, state: &EvalState) -> Ast {
    Ast { root: residualize(&ast.root, state), source_info: ast.source_info.clone() }
}

fn residualize(e: &IdedExpr, state: &EvalState) -> IdedExpr {
    if let Expr::Call(c) = &e.expr {
        if c.target.is_none() && c.args.len() == 2 && (c.function.as_ref() == "_&&_" || c.function.as_ref() == "_||_") {
            return residualize_logical(e.id, &c.function, &c.args[0], &c.args[1], state);
        }
    }
    if let Some(v) = state.get(e.id) {
        if v.is_unknown() {
            return e.clone();
        }
        if !v.is_error() {
            if let Some(lit) = value_to_literal(v) {
                return IdedExpr::new(e.id, Expr::Literal(lit));
            }
        }
    }
    let expr = match &e.expr {
        Expr::Literal(_) | Expr::Ident(_) => return e.clone(),
        Expr::Select(s) => Expr::Select(Box::new(SelectExpr {
            operand: residualize(&s.operand, state),
            field: s.field.clone(),
            test_only: s.test_only,
        })),
        Expr::Call(c) => Expr::Call(Box::new(CallExpr {
            target: c.target.as_ref().map(|t| Box::new(residualize(t, state))),
            function: c.function.clone(),
            args: c.args.iter().map(|a| residualize(a, state)).collect(),
        })),
        Expr::List(l) => Expr::List(ListExpr { elements: l.elements.iter().map(|el| residualize(el, state)).collect() }),
        Expr::Map(m) => Expr::Map(MapExpr {
            entries: m
                .entries
                .iter()
                .map(|entry| MapEntry { id: entry.id, key: residualize(&entry.key, state), value: residualize(&entry.value, state) })
                .collect(),
        }),
        Expr::Struct(s) => Expr::Struct(Box::new(StructExpr {
            message_name: s.message_name.clone(),
            fields: s
                .fields
                .iter()
                .map(|f| StructFieldInit { id: f.id, name: f.name.clone(), value: residualize(&f.value, state) })
                .collect(),
        })),
        Expr::Comprehension(c) => Expr::Comprehension(Box::new(ComprehensionExpr {
            iter_var: c.iter_var.clone(),
            iter_range: residualize(&c.iter_range, state),
            accu_var: c.accu_var.clone(),
            accu_init: residualize(&c.accu_init, state),
            loop_condition: residualize(&c.loop_condition, state),
            loop_step: residualize(&c.loop_step, state),
            result: residualize(&c.result, state),
        })),
    };
    IdedExpr::new(e.id, expr)
}

/// Residualizes both operands independently, then folds the boolean
/// algebra: for `_&&_` a literal `false` side absorbs to `false` and a
/// literal `true` side drops out in favor of the other operand;
/// symmetric for `_||_` with `true` absorbing and `false` dropping out.
fn residualize_logical(id: NodeId, function: &str, left: &IdedExpr, right: &IdedExpr, state: &EvalState) -> IdedExpr {
    let l = residualize(left, state);
    let r = residualize(right, state);
    let absorbing = function == "_||_";
    if literal_bool(&l) == Some(absorbing) || literal_bool(&r) == Some(absorbing) {
        return IdedExpr::new(id, Expr::Literal(LiteralKind::Bool(absorbing)));
    }
    if literal_bool(&l) == Some(!absorbing) {
        return r;
    }
    if literal_bool(&r) == Some(!absorbing) {
        return l;
    }
    IdedExpr::new(
        id,
        Expr::Call(Box::new(CallExpr {
            target: None,
            function: function.into(),
            args: vec![l, r],
        })),
    )
}

fn literal_bool(e: &IdedExpr) -> Option<bool> {
    match &e.expr {
        Expr::Literal(LiteralKind::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Scalar values round-trip as literals; lists/maps/structs have no
/// literal AST form and keep their residualized structural shape
/// instead of collapsing to a single node.
fn value_to_literal(v: &Value) -> Option<LiteralKind> {
    match v {
        Value::Null => Some(LiteralKind::Null),
        Value::Bool(b) => Some(LiteralKind::Bool(*b)),
        Value::Int(i) => Some(LiteralKind::Int(*i)),
        Value::UInt(u) => Some(LiteralKind::UInt(*u)),
        Value::Double(d) => Some(LiteralKind::Double(*d)),
        Value::String(s) => Some(LiteralKind::String(s.clone())),
        Value::Bytes(b) => Some(LiteralKind::Bytes(b.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    fn ident(id: NodeId, name: &str) -> IdedExpr {
        IdedExpr::new(id, Expr::Ident(name.into()))
    }

    fn literal_true(id: NodeId) -> IdedExpr {
        IdedExpr::new(id, Expr::Literal(LiteralKind::Bool(true)))
    }

    fn literal_false(id: NodeId) -> IdedExpr {
        IdedExpr::new(id, Expr::Literal(LiteralKind::Bool(false)))
    }

    #[test]
    fn true_and_x_drops_the_decided_side() {
        let state = EvalState::default();
        let residual = residualize_logical(1, "_&&_", &literal_true(2), &ident(3, "x"), &state);
        assert_eq!(residual, ident(3, "x"));
    }

    #[test]
    fn false_and_x_absorbs_to_false_without_inspecting_x() {
        let state = EvalState::default();
        let residual = residualize_logical(1, "_&&_", &literal_false(2), &ident(3, "x"), &state);
        assert_eq!(residual, literal_false(1));
    }

    #[test]
    fn false_or_x_drops_the_decided_side() {
        let state = EvalState::default();
        let residual = residualize_logical(1, "_||_", &literal_false(2), &ident(3, "x"), &state);
        assert_eq!(residual, ident(3, "x"));
    }
}
