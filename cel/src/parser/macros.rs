//! Desugaring for the receiver-style macros (`has`, `all`, `exists`,
//! `exists_one`, `filter`, `map`) into [`ComprehensionExpr`] nodes (or,
//! for `has`, a test-only [`SelectExpr`]). These are expanded during
//! parsing, not retained as a distinct AST node kind; the original
//! call shape is preserved in [`crate::ast::SourceInfo::macro_calls`]
//! so the unparser can print it back.

use crate::ast::{ComprehensionExpr, Expr, IdGen, IdedExpr, LiteralKind, SelectExpr};

/// The accumulator variable name used by every expanded comprehension.
/// Shadowing it is harmless: CEL macros never expose it to user code,
/// and nested macros each get their own parser-assigned node ids even
/// though the name repeats textually.
const ACCUMULATOR_VAR: &str = "__result__";

pub enum Macro {
    Has,
    All,
    Exists,
    ExistsOne,
    Filter,
    Map2,
    Map3,
}

/// Recognizes a call shape as one of the built-in macros. `has` is a
/// global (non-member) one-argument call; the rest are member calls
/// with two or three arguments.
pub fn recognize(function: &str, has_target: bool, arg_count: usize) -> Option<Macro> {
    match (function, has_target, arg_count) {
        ("has", false, 1) => Some(Macro::Has),
        ("all", true, 2) => Some(Macro::All),
        ("exists", true, 2) => Some(Macro::Exists),
        ("exists_one", true, 2) => Some(Macro::ExistsOne),
        ("filter", true, 2) => Some(Macro::Filter),
        ("map", true, 2) => Some(Macro::Map2),
        ("map", true, 3) => Some(Macro::Map3),
        _ => None,
    }
}

fn lit(idgen: &mut IdGen, kind: LiteralKind) -> IdedExpr {
    IdedExpr::new(idgen.next_id(), Expr::Literal(kind))
}

fn ident(idgen: &mut IdGen, name: &str) -> IdedExpr {
    IdedExpr::new(idgen.next_id(), Expr::Ident(name.into()))
}

fn call(idgen: &mut IdGen, function: &str, args: Vec<IdedExpr>) -> IdedExpr {
    IdedExpr::new(
        idgen.next_id(),
        Expr::Call(Box::new(crate::ast::CallExpr {
            target: None,
            function: function.into(),
            args,
        })),
    )
}

/// Expands `has(operand.field)`. Fails if the argument isn't itself a
/// plain field selection.
pub fn expand_has(mut args: Vec<IdedExpr>) -> Result<Expr, String> {
    let arg = args.pop().unwrap();
    match arg.expr {
        Expr::Select(s) if !s.test_only => Ok(Expr::Select(Box::new(SelectExpr {
            operand: s.operand,
            field: s.field,
            test_only: true,
        }))),
        _ => Err("has() requires a field selection argument".to_string()),
    }
}

fn iter_var_name(arg: &IdedExpr) -> Result<std::sync::Arc<str>, String> {
    match &arg.expr {
        Expr::Ident(name) => Ok(name.clone()),
        _ => Err("macro iteration variable must be a simple identifier".to_string()),
    }
}

/// Expands a recognized macro into its comprehension (or select) form.
/// `target` is the receiver (`range` in CEL terms); `args` holds the
/// macro's own argument list in source order.
pub fn expand(idgen: &mut IdGen, m: Macro, target: Option<IdedExpr>, mut args: Vec<IdedExpr>) -> Result<Expr, String> {
    if let Macro::Has = m {
        return expand_has(args);
    }
    let range = target.expect("non-has macros are always member calls");

    match m {
        Macro::Has => unreachable!(),
        Macro::All => {
            let predicate = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let loop_step = call(idgen, "_&&_", vec![accu_ref.clone(), predicate]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: lit(idgen, LiteralKind::Bool(true)),
                loop_condition: accu_ref.clone(),
                loop_step,
                result: accu_ref,
            })))
        }
        Macro::Exists => {
            let predicate = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let loop_condition = call(idgen, "!_", vec![accu_ref.clone()]);
            let loop_step = call(idgen, "_||_", vec![accu_ref.clone(), predicate]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: lit(idgen, LiteralKind::Bool(false)),
                loop_condition,
                loop_step,
                result: accu_ref,
            })))
        }
        Macro::ExistsOne => {
            let predicate = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let one = lit(idgen, LiteralKind::Int(1));
            let incremented = call(idgen, "_+_", vec![accu_ref.clone(), one]);
            let loop_step = call(idgen, "_?_:_", vec![predicate, incremented, accu_ref.clone()]);
            let one = lit(idgen, LiteralKind::Int(1));
            let result = call(idgen, "_==_", vec![accu_ref.clone(), one]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: lit(idgen, LiteralKind::Int(0)),
                loop_condition: lit(idgen, LiteralKind::Bool(true)),
                loop_step,
                result,
            })))
        }
        Macro::Filter => {
            let predicate = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let elem = ident(idgen, &iter_var);
            let elem_list = IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![elem] }));
            let appended = call(idgen, "_+_", vec![accu_ref.clone(), elem_list]);
            let loop_step = call(idgen, "_?_:_", vec![predicate, appended, accu_ref.clone()]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![] })),
                loop_condition: lit(idgen, LiteralKind::Bool(true)),
                loop_step,
                result: accu_ref,
            })))
        }
        Macro::Map2 => {
            let transform = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let transform_list = IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![transform] }));
            let appended = call(idgen, "_+_", vec![accu_ref.clone(), transform_list]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![] })),
                loop_condition: lit(idgen, LiteralKind::Bool(true)),
                loop_step: appended,
                result: accu_ref,
            })))
        }
        Macro::Map3 => {
            let transform = args.pop().unwrap();
            let filter_pred = args.pop().unwrap();
            let iter_arg = args.pop().unwrap();
            let iter_var = iter_var_name(&iter_arg)?;
            let accu_var: std::sync::Arc<str> = ACCUMULATOR_VAR.into();
            let accu_ref = ident(idgen, ACCUMULATOR_VAR);
            let transform_list = IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![transform] }));
            let appended = call(idgen, "_+_", vec![accu_ref.clone(), transform_list]);
            let loop_step = call(idgen, "_?_:_", vec![filter_pred, appended, accu_ref.clone()]);
            Ok(Expr::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var,
                accu_init: IdedExpr::new(idgen.next_id(), Expr::List(crate::ast::ListExpr { elements: vec![] })),
                loop_condition: lit(idgen, LiteralKind::Bool(true)),
                loop_step,
                result: accu_ref,
            })))
        }
    }
}
