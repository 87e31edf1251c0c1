//! The parsed abstract syntax tree.
//!
//! Every node carries a unique, monotonically assigned id (see
//! [`IdGen`]). Ids are never reused and never renumbered once parsed;
//! they are the substrate the checker, planner and interpreter use to
//! attach side-table annotations (types, references, evaluation state).

use hashbrown::HashMap;
use std::sync::Arc;

pub type NodeId = u64;

/// Threaded through the parser to hand out ids in source order.
#[derive(Debug, Default)]
pub struct IdGen {
    next: NodeId,
}

impl IdGen {
    pub fn new() -> Self {
        IdGen { next: 1 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
}

/// An [`Expr`] tagged with its node id.
#[derive(Debug, Clone, PartialEq)]
pub struct IdedExpr {
    pub id: NodeId,
    pub expr: Expr,
}

impl IdedExpr {
    pub fn new(id: NodeId, expr: Expr) -> Self {
        IdedExpr { id, expr }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralKind),
    Ident(Arc<str>),
    Select(Box<SelectExpr>),
    Call(Box<CallExpr>),
    List(ListExpr),
    Map(MapExpr),
    Struct(Box<StructExpr>),
    Comprehension(Box<ComprehensionExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub operand: IdedExpr,
    pub field: Arc<str>,
    /// True when this node represents `has(operand.field)` rather than
    /// a plain field access.
    pub test_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// Present for receiver-style calls (`target.function(args)`).
    pub target: Option<Box<IdedExpr>>,
    pub function: Arc<str>,
    pub args: Vec<IdedExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListExpr {
    pub elements: Vec<IdedExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub id: NodeId,
    pub key: IdedExpr,
    pub value: IdedExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub entries: Vec<MapEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructFieldInit {
    pub id: NodeId,
    pub name: Arc<str>,
    pub value: IdedExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructExpr {
    pub message_name: Arc<str>,
    pub fields: Vec<StructFieldInit>,
}

/// The single looping construct. Only ever produced by macro expansion
/// in the parser; `has`/`all`/`exists`/`exists_one`/`filter`/`map` all
/// desugar to this shape (see `parser::macros`).
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionExpr {
    pub iter_var: Arc<str>,
    pub iter_range: IdedExpr,
    pub accu_var: Arc<str>,
    pub accu_init: IdedExpr,
    pub loop_condition: IdedExpr,
    pub loop_step: IdedExpr,
    pub result: IdedExpr,
}

/// Per-node source offsets, plus the macro-call sidetable that lets the
/// unparser reconstruct the original receiver-style syntax for
/// macro-expanded comprehensions.
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    pub positions: HashMap<NodeId, u32>,
    pub macro_calls: HashMap<NodeId, IdedExpr>,
}

/// A parsed (not yet checked) expression.
#[derive(Debug, Clone)]
pub struct Ast {
    pub root: IdedExpr,
    pub source_info: SourceInfo,
}

impl Ast {
    /// Visits every node in the tree, parent before children.
    pub fn walk(&self, mut visit: impl FnMut(&IdedExpr)) {
        fn go(e: &IdedExpr, visit: &mut dyn FnMut(&IdedExpr)) {
            visit(e);
            match &e.expr {
                Expr::Literal(_) | Expr::Ident(_) => {}
                Expr::Select(s) => go(&s.operand, visit),
                Expr::Call(c) => {
                    if let Some(t) = &c.target {
                        go(t, visit);
                    }
                    for a in &c.args {
                        go(a, visit);
                    }
                }
                Expr::List(l) => {
                    for e in &l.elements {
                        go(e, visit);
                    }
                }
                Expr::Map(m) => {
                    for entry in &m.entries {
                        go(&entry.key, visit);
                        go(&entry.value, visit);
                    }
                }
                Expr::Struct(s) => {
                    for f in &s.fields {
                        go(&f.value, visit);
                    }
                }
                Expr::Comprehension(c) => {
                    go(&c.iter_range, visit);
                    go(&c.accu_init, visit);
                    go(&c.loop_condition, visit);
                    go(&c.loop_step, visit);
                    go(&c.result, visit);
                }
            }
        }
        go(&self.root, &mut visit);
    }
}
