//! The static type system used by the checker and the declaration
//! environment. Not to be confused with [`crate::common::value::Value`],
//! the runtime value representation.

use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    /// Unifies with anything; disables sub-structural checks.
    Dyn,
    Error,
    List(Box<CelType>),
    Map(Box<CelType>, Box<CelType>),
    /// `type<T>` — the type of a type value, e.g. the result of `type(x)`.
    Type(Box<CelType>),
    Object(Arc<str>),
    Wrapper(Box<CelType>),
    TypeParam(Arc<str>),
}

impl CelType {
    pub fn list(elem: CelType) -> CelType {
        CelType::List(Box::new(elem))
    }

    pub fn map(key: CelType, value: CelType) -> CelType {
        CelType::Map(Box::new(key), Box::new(value))
    }

    pub fn type_of(t: CelType) -> CelType {
        CelType::Type(Box::new(t))
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, CelType::Dyn)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CelType::Int | CelType::UInt | CelType::Double)
    }

    /// A substitution mapping type-parameter names to the concrete type
    /// bound to them during unification.
    pub fn apply(&self, subst: &HashMap<Arc<str>, CelType>) -> CelType {
        match self {
            CelType::TypeParam(name) => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            CelType::List(e) => CelType::list(e.apply(subst)),
            CelType::Map(k, v) => CelType::map(k.apply(subst), v.apply(subst)),
            CelType::Type(t) => CelType::type_of(t.apply(subst)),
            CelType::Wrapper(t) => CelType::Wrapper(Box::new(t.apply(subst))),
            other => other.clone(),
        }
    }

    /// Attempts to unify `self` (a declared parameter type) with `other`
    /// (an argument type), accumulating type-parameter bindings into
    /// `subst`. `Dyn` unifies with anything. Type parameters bind on
    /// first occurrence and must agree with any later occurrence. List
    /// and map constructors unify structurally on their element types.
    pub fn unify(&self, other: &CelType, subst: &mut HashMap<Arc<str>, CelType>) -> bool {
        match (self, other) {
            (CelType::Dyn, _) | (_, CelType::Dyn) => true,
            (CelType::Error, _) | (_, CelType::Error) => true,
            (CelType::TypeParam(name), concrete) | (concrete, CelType::TypeParam(name)) => {
                match subst.get(name) {
                    Some(bound) => bound == concrete || bound.is_dyn() || concrete.is_dyn(),
                    None => {
                        subst.insert(name.clone(), concrete.clone());
                        true
                    }
                }
            }
            (CelType::List(a), CelType::List(b)) => a.unify(b, subst),
            (CelType::Map(ak, av), CelType::Map(bk, bv)) => {
                ak.unify(bk, subst) && av.unify(bv, subst)
            }
            (CelType::Type(a), CelType::Type(b)) => a.unify(b, subst),
            (CelType::Wrapper(a), b) => a.unify(b, subst),
            (a, CelType::Wrapper(b)) => a.unify(b, subst),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::Null => write!(f, "null_type"),
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::UInt => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::Timestamp => write!(f, "google.protobuf.Timestamp"),
            CelType::Duration => write!(f, "google.protobuf.Duration"),
            CelType::Dyn => write!(f, "dyn"),
            CelType::Error => write!(f, "error"),
            CelType::List(e) => write!(f, "list({e})"),
            CelType::Map(k, v) => write!(f, "map({k}, {v})"),
            CelType::Type(t) => write!(f, "type({t})"),
            CelType::Object(n) => write!(f, "{n}"),
            CelType::Wrapper(t) => write!(f, "wrapper({t})"),
            CelType::TypeParam(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dyn_unifies_with_anything() {
        let mut subst = HashMap::new();
        assert!(CelType::Dyn.unify(&CelType::Int, &mut subst));
        assert!(CelType::String.unify(&CelType::Dyn, &mut subst));
    }

    #[test]
    fn type_param_binds_once_and_agrees() {
        let mut subst = HashMap::new();
        let t = CelType::TypeParam("T".into());
        assert!(t.unify(&CelType::Int, &mut subst));
        assert!(t.unify(&CelType::Int, &mut subst));
        assert!(!t.unify(&CelType::String, &mut subst));
    }

    #[test]
    fn lists_unify_covariantly() {
        let mut subst = HashMap::new();
        let a = CelType::list(CelType::TypeParam("T".into()));
        let b = CelType::list(CelType::String);
        assert!(a.unify(&b, &mut subst));
        assert_eq!(subst.get("T"), Some(&CelType::String));
    }
}
