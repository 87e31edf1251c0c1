//! The type checker: assigns a [`CelType`] to every AST node and
//! resolves every identifier/call to a [`Reference`] (spec §4.2).

pub mod container;
pub mod scope;

use crate::ast::{Ast, ComprehensionExpr, Expr, IdedExpr, LiteralKind, NodeId};
use crate::common::reference::Reference;
use crate::common::value::Value;
use crate::diagnostic::Diagnostic;
use crate::registry::TypeRegistry;
use crate::source::Source;
use crate::types::CelType;
use hashbrown::HashMap;
use scope::DeclEnv;
use std::sync::Arc;

/// An AST annotated with a type and (where applicable) a reference for
/// every node.
#[derive(Debug, Clone)]
pub struct CheckedAst {
    pub ast: Ast,
    pub types: HashMap<NodeId, CelType>,
    pub references: HashMap<NodeId, Reference>,
}

impl CheckedAst {
    pub fn type_of(&self, id: NodeId) -> CelType {
        self.types.get(&id).cloned().unwrap_or(CelType::Dyn)
    }

    pub fn result_type(&self) -> CelType {
        self.type_of(self.ast.root.id)
    }
}

/// Returns the reified type value for one of the well-known primitive
/// type names (`int`, `uint`, `string`, ...). These are ordinary
/// identifiers in CEL source, bound to `Value::Type` rather than being
/// keywords.
pub fn primitive_type_for_name(name: &str) -> Option<CelType> {
    Some(match name {
        "null_type" => CelType::Null,
        "bool" => CelType::Bool,
        "int" => CelType::Int,
        "uint" => CelType::UInt,
        "double" => CelType::Double,
        "string" => CelType::String,
        "bytes" => CelType::Bytes,
        "timestamp" => CelType::Timestamp,
        "duration" => CelType::Duration,
        "dyn" => CelType::Dyn,
        "type" => CelType::Type(Box::new(CelType::Dyn)),
        "list" => CelType::list(CelType::Dyn),
        "map" => CelType::map(CelType::Dyn, CelType::Dyn),
        _ => return None,
    })
}

pub struct Checker<'a> {
    env: &'a mut DeclEnv,
    registry: &'a TypeRegistry,
    source: Option<&'a Source>,
    positions: HashMap<NodeId, u32>,
    diagnostics: Vec<Diagnostic>,
    types: HashMap<NodeId, CelType>,
    references: HashMap<NodeId, Reference>,
}

impl<'a> Checker<'a> {
    pub fn check(
        ast: Ast,
        env: &'a mut DeclEnv,
        registry: &'a TypeRegistry,
        source: Option<&'a Source>,
    ) -> (CheckedAst, Vec<Diagnostic>) {
        let mut checker = Checker {
            env,
            registry,
            source,
            positions: ast.source_info.positions.clone(),
            diagnostics: Vec::new(),
            types: HashMap::new(),
            references: HashMap::new(),
        };
        checker.check_expr(&ast.root);
        let diagnostics = std::mem::take(&mut checker.diagnostics);
        (
            CheckedAst {
                ast,
                types: checker.types,
                references: checker.references,
            },
            diagnostics,
        )
    }

    fn loc(&self, id: NodeId) -> crate::source::Location {
        let offset = self.positions.get(&id).copied().unwrap_or(0);
        self.source
            .map(|s| s.location(offset))
            .unwrap_or(crate::source::Location { line: 1, column: 1 })
    }

    fn error(&mut self, id: NodeId, message: impl Into<String>) {
        let loc = self.loc(id);
        self.diagnostics.push(Diagnostic::error(loc, message));
    }

    fn set_type(&mut self, id: NodeId, ty: CelType) -> CelType {
        self.types.insert(id, ty.clone());
        ty
    }

    fn check_expr(&mut self, e: &IdedExpr) -> CelType {
        let ty = match &e.expr {
            Expr::Literal(lit) => self.check_literal(lit),
            Expr::Ident(name) => self.check_ident(e.id, name),
            Expr::Select(s) => self.check_select(e.id, s),
            Expr::Call(c) => self.check_call(e.id, c),
            Expr::List(l) => self.check_list(l),
            Expr::Map(m) => self.check_map(m),
            Expr::Struct(s) => self.check_struct(e.id, s),
            Expr::Comprehension(c) => self.check_comprehension(c),
        };
        self.set_type(e.id, ty)
    }

    fn check_literal(&mut self, lit: &LiteralKind) -> CelType {
        match lit {
            LiteralKind::Null => CelType::Null,
            LiteralKind::Bool(_) => CelType::Bool,
            LiteralKind::Int(_) => CelType::Int,
            LiteralKind::UInt(_) => CelType::UInt,
            LiteralKind::Double(_) => CelType::Double,
            LiteralKind::String(_) => CelType::String,
            LiteralKind::Bytes(_) => CelType::Bytes,
        }
    }

    fn check_ident(&mut self, id: NodeId, name: &Arc<str>) -> CelType {
        if let Some((ty, reference)) = self.try_resolve_qualified(name) {
            self.references.insert(id, reference);
            return ty;
        }
        self.error(id, format!("undeclared reference to '{name}'"));
        CelType::Error
    }

    /// Tries to resolve `name` (which may be a dotted path assembled
    /// from a chain of plain field selects) as a declared variable, a
    /// primitive type name, or a container-qualified type/enum. Does
    /// not emit diagnostics; callers fall back to ordinary field
    /// selection when this returns `None`.
    fn try_resolve_qualified(&self, name: &str) -> Option<(CelType, Reference)> {
        if let Some((qualified, decl)) = self.env.resolve_ident(name) {
            return Some((decl.cel_type.clone(), Reference::ident(qualified)));
        }
        if !name.contains('.') {
            if let Some(t) = primitive_type_for_name(name) {
                let value = Value::Type(t.clone());
                return Some((CelType::Type(Box::new(t)), Reference::ident(name).with_value(value)));
            }
        }
        for candidate in container::resolve_candidate_names(Some(self.env.container()), name) {
            if let Some(descr) = self.registry.lookup_type(&candidate) {
                let t = CelType::Object(descr.qualified_name.clone());
                let reference = Reference::ident(candidate).with_value(Value::Type(t.clone()));
                return Some((CelType::Type(Box::new(t)), reference));
            }
            if let Some(v) = self.registry.lookup_enum(&candidate) {
                return Some((CelType::Int, Reference::ident(candidate).with_value(Value::Int(v))));
            }
        }
        None
    }

    /// Walks a chain of plain (non-test-only) selects down to its root
    /// identifier, returning `(node id, field name)` pairs from root to
    /// leaf. Returns `None` as soon as anything other than `Ident` or
    /// `Select` appears, since only pure dotted paths can denote a
    /// container-qualified name.
    fn dotted_path(e: &IdedExpr) -> Option<Vec<(NodeId, Arc<str>)>> {
        match &e.expr {
            Expr::Ident(name) => Some(vec![(e.id, name.clone())]),
            Expr::Select(s) if !s.test_only => {
                let mut prefix = Self::dotted_path(&s.operand)?;
                prefix.push((e.id, s.field.clone()));
                Some(prefix)
            }
            _ => None,
        }
    }

    fn check_select(&mut self, id: NodeId, s: &crate::ast::SelectExpr) -> CelType {
        if !s.test_only {
            if let Some(mut path) = Self::dotted_path(&s.operand) {
                path.push((id, s.field.clone()));
                let dotted = path
                    .iter()
                    .map(|(_, n)| n.as_ref())
                    .collect::<Vec<_>>()
                    .join(".");
                if let Some((ty, reference)) = self.try_resolve_qualified(&dotted) {
                    for (node_id, _) in &path {
                        self.types.insert(*node_id, ty.clone());
                    }
                    self.references.insert(id, reference);
                    return ty;
                }
            }
        }
        let operand_ty = self.check_expr(&s.operand);
        if s.test_only {
            return CelType::Bool;
        }
        match operand_ty {
            CelType::Dyn | CelType::Error => CelType::Dyn,
            CelType::Map(_, v) => *v,
            CelType::Object(name) => match self.registry.lookup_type(&name).and_then(|d| d.field(&s.field)) {
                Some(field) => field.cel_type.clone(),
                None => {
                    self.error(id, format!("undefined field '{}' on type '{name}'", s.field));
                    CelType::Error
                }
            },
            other => {
                self.error(id, format!("type '{other}' does not support field selection"));
                CelType::Error
            }
        }
    }

    fn check_list(&mut self, l: &crate::ast::ListExpr) -> CelType {
        let mut elem_ty: Option<CelType> = None;
        for e in &l.elements {
            let t = self.check_expr(e);
            elem_ty = Some(match elem_ty {
                None => t,
                Some(prev) if prev == t => prev,
                Some(_) => CelType::Dyn,
            });
        }
        CelType::list(elem_ty.unwrap_or(CelType::Dyn))
    }

    fn check_map(&mut self, m: &crate::ast::MapExpr) -> CelType {
        let mut key_ty: Option<CelType> = None;
        let mut val_ty: Option<CelType> = None;
        for entry in &m.entries {
            let k = self.check_expr(&entry.key);
            let v = self.check_expr(&entry.value);
            key_ty = Some(match key_ty {
                None => k,
                Some(prev) if prev == k => prev,
                Some(_) => CelType::Dyn,
            });
            val_ty = Some(match val_ty {
                None => v,
                Some(prev) if prev == v => prev,
                Some(_) => CelType::Dyn,
            });
        }
        CelType::map(key_ty.unwrap_or(CelType::Dyn), val_ty.unwrap_or(CelType::Dyn))
    }

    fn check_struct(&mut self, id: NodeId, s: &crate::ast::StructExpr) -> CelType {
        let candidates = container::resolve_candidate_names(Some(self.env.container()), &s.message_name);
        let descriptor = candidates.iter().find_map(|c| self.registry.lookup_type(c));
        let Some(descriptor) = descriptor.cloned() else {
            self.error(id, format!("undeclared type '{}'", s.message_name));
            for f in &s.fields {
                self.check_expr(&f.value);
            }
            return CelType::Error;
        };
        for f in &s.fields {
            let field_ty = self.check_expr(&f.value);
            match descriptor.field(&f.name) {
                Some(fd) if fd.cel_type == field_ty || fd.cel_type.is_dyn() || field_ty.is_dyn() => {}
                Some(fd) => self.error(
                    f.id,
                    format!("field '{}' expects {} but got {field_ty}", f.name, fd.cel_type),
                ),
                None => self.error(f.id, format!("no such field '{}' on '{}'", f.name, s.message_name)),
            }
        }
        CelType::Object(descriptor.qualified_name.clone())
    }

    fn element_type(ty: &CelType) -> CelType {
        match ty {
            CelType::List(e) => (**e).clone(),
            CelType::Map(k, _) => (**k).clone(),
            CelType::Dyn | CelType::Error => CelType::Dyn,
            _ => CelType::Error,
        }
    }

    fn check_comprehension(&mut self, c: &ComprehensionExpr) -> CelType {
        let range_ty = self.check_expr(&c.iter_range);
        let iter_ty = Self::element_type(&range_ty);
        if iter_ty == CelType::Error && !matches!(range_ty, CelType::Error) {
            self.error(c.iter_range.id, format!("type '{range_ty}' is not iterable"));
        }
        let accu_ty = self.check_expr(&c.accu_init);

        self.env.push_scope();
        let _ = self
            .env
            .declare_var(crate::common::decls::VariableDecl::new(c.iter_var.clone(), iter_ty));
        let _ = self
            .env
            .declare_var(crate::common::decls::VariableDecl::new(c.accu_var.clone(), accu_ty.clone()));

        let cond_ty = self.check_expr(&c.loop_condition);
        if cond_ty != CelType::Bool && !cond_ty.is_dyn() {
            self.error(c.loop_condition.id, format!("loop condition must be bool, got {cond_ty}"));
        }
        let step_ty = self.check_expr(&c.loop_step);
        if step_ty != accu_ty && !step_ty.is_dyn() && !accu_ty.is_dyn() {
            self.error(
                c.loop_step.id,
                format!("loop step type {step_ty} does not match accumulator type {accu_ty}"),
            );
        }
        let result_ty = self.check_expr(&c.result);
        self.env.pop_scope();
        result_ty
    }

    fn check_call(&mut self, id: NodeId, c: &crate::ast::CallExpr) -> CelType {
        let target_ty = c.target.as_ref().map(|t| self.check_expr(t));
        let arg_tys: Vec<CelType> = c.args.iter().map(|a| self.check_expr(a)).collect();

        let full_arg_tys: Vec<CelType> = target_ty
            .iter()
            .cloned()
            .chain(arg_tys.iter().cloned())
            .collect();
        let is_member = c.target.is_some();

        let resolved = if is_member {
            self.env.resolve_function_exact(&c.function).cloned()
        } else {
            self.env.resolve_function(&c.function).map(|(_, d)| d.clone())
        };

        let Some(decl) = resolved else {
            self.error(id, format!("undeclared function '{}'", c.function));
            return CelType::Error;
        };

        let mut matches: Vec<(Arc<str>, CelType)> = Vec::new();
        for overload in &decl.overloads {
            if overload.member_function != is_member {
                continue;
            }
            if overload.arg_types.len() != full_arg_tys.len() {
                continue;
            }
            let mut subst = HashMap::new();
            let ok = overload
                .arg_types
                .iter()
                .zip(full_arg_tys.iter())
                .all(|(param, arg)| param.unify(arg, &mut subst));
            if ok {
                matches.push((overload.id.clone(), overload.result_type.apply(&subst)));
            }
        }

        if matches.is_empty() {
            self.error(id, format!("no matching overload for function '{}'", c.function));
            return CelType::Error;
        }

        let first_result = matches[0].1.clone();
        if matches.iter().any(|(_, t)| *t != first_result) {
            self.error(id, format!("ambiguous call to '{}'", c.function));
            return CelType::Error;
        }

        let overload_ids = matches.into_iter().map(|(id, _)| id).collect();
        self.references.insert(id, Reference::call(c.function.clone(), overload_ids));
        first_result
    }
}
