//! The declaration environment: a stack of scopes holding typed
//! variable and function declarations, resolved with container-aware
//! qualified-name search (spec §4.3, §4.2).

use super::container::resolve_candidate_names;
use crate::common::decls::VariableDecl;
use crate::common::functions::{FunctionDecl, OverloadDecl};
use hashbrown::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct Scope {
    idents: HashMap<Arc<str>, VariableDecl>,
    functions: HashMap<Arc<str>, FunctionDecl>,
}

/// A stack of scopes searched innermost-first. The bottom scope is the
/// environment's top-level declarations; comprehension checking pushes
/// a fresh scope per `iter_var`/`accu_var` pair and pops it once the
/// comprehension's subtree has been checked.
#[derive(Debug, Clone)]
pub struct DeclEnv {
    container: Arc<str>,
    scopes: Vec<Scope>,
}

impl DeclEnv {
    pub fn new(container: impl Into<Arc<str>>) -> Self {
        DeclEnv {
            container: container.into(),
            scopes: vec![Scope::default()],
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the root scope");
        self.scopes.pop();
    }

    /// Declares `name` in the innermost scope. Fails if a declaration
    /// for the same name already exists in that scope.
    pub fn declare_var(&mut self, decl: VariableDecl) -> Result<(), String> {
        let scope = self.scopes.last_mut().unwrap();
        if scope.idents.contains_key(&decl.name) {
            return Err(format!("overlapping identifier: {}", decl.name));
        }
        scope.idents.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Declares a function, or accumulates overloads into an existing
    /// declaration with the same name.
    pub fn declare_function(&mut self, decl: FunctionDecl) -> Result<(), String> {
        let scope = self.scopes.last_mut().unwrap();
        match scope.functions.get_mut(&decl.name) {
            Some(existing) => {
                for overload in decl.overloads {
                    existing.add_overload(overload)?;
                }
                Ok(())
            }
            None => {
                scope.functions.insert(decl.name.clone(), decl);
                Ok(())
            }
        }
    }

    pub fn add_overload(&mut self, name: impl Into<Arc<str>>, overload: OverloadDecl) -> Result<(), String> {
        let name = name.into();
        let scope = self.scopes.last_mut().unwrap();
        match scope.functions.get_mut(&name) {
            Some(existing) => existing.add_overload(overload),
            None => {
                scope
                    .functions
                    .insert(name.clone(), FunctionDecl::new(name, vec![overload]));
                Ok(())
            }
        }
    }

    /// Resolves an identifier using the container-qualified search
    /// order, most-qualified candidate first, searching innermost scope
    /// to outermost for each candidate. Returns the matched fully
    /// qualified name and its declaration.
    pub fn resolve_ident(&self, name: &str) -> Option<(String, &VariableDecl)> {
        for candidate in resolve_candidate_names(Some(&self.container), name) {
            for scope in self.scopes.iter().rev() {
                if let Some(decl) = scope.idents.get(candidate.as_str()) {
                    return Some((candidate, decl));
                }
            }
        }
        None
    }

    /// Resolves a (possibly qualified) function name the same way.
    pub fn resolve_function(&self, name: &str) -> Option<(String, &FunctionDecl)> {
        for candidate in resolve_candidate_names(Some(&self.container), name) {
            for scope in self.scopes.iter().rev() {
                if let Some(decl) = scope.functions.get(candidate.as_str()) {
                    return Some((candidate, decl));
                }
            }
        }
        None
    }

    /// Resolves a function by its bare declared name only (used for
    /// receiver-style calls, which are never container-qualified).
    pub fn resolve_function_exact(&self, name: &str) -> Option<&FunctionDecl> {
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.functions.get(name) {
                return Some(decl);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CelType;

    #[test]
    fn resolves_innermost_first() {
        let mut env = DeclEnv::new("");
        env.declare_var(VariableDecl::new("x", CelType::Int)).unwrap();
        env.push_scope();
        env.declare_var(VariableDecl::new("x", CelType::String)).unwrap();
        let (_, decl) = env.resolve_ident("x").unwrap();
        assert_eq!(decl.cel_type, CelType::String);
        env.pop_scope();
        let (_, decl) = env.resolve_ident("x").unwrap();
        assert_eq!(decl.cel_type, CelType::Int);
    }

    #[test]
    fn container_qualified_fallback() {
        let mut env = DeclEnv::new("a.b.c");
        env.declare_var(VariableDecl::new("a.b.X.Y", CelType::Int)).unwrap();
        let (qualified, _) = env.resolve_ident("X.Y").unwrap();
        assert_eq!(qualified, "a.b.X.Y");
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut env = DeclEnv::new("");
        env.declare_var(VariableDecl::new("x", CelType::Int)).unwrap();
        assert!(env.declare_var(VariableDecl::new("x", CelType::String)).is_err());
    }
}
