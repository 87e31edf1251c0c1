//! Attribute patterns: the glob-style (`var`, `var.field`, `var[*]`)
//! matchers a partial activation declares (spec §4.6). When the
//! interpreter resolves an [`Attribute`](crate::planner::attribute::Attribute)
//! that matches a pattern, it produces [`Value::Unknown`] instead of
//! resolving the value, and records the triggering node id.

use crate::planner::attribute::{Attribute, Qualifier};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PatternQualifier {
    Field(Arc<str>),
    Index(crate::common::value::Value),
    /// `[*]`: matches any single index or field qualifier.
    Wildcard,
}

/// A pattern matches an attribute when the pattern's qualifiers are a
/// prefix of the attribute's qualifiers (or equal to them): marking
/// `request.auth` unknown also marks `request.auth.claims` unknown, but
/// not `request.other`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePattern {
    pub var: Arc<str>,
    pub qualifiers: Vec<PatternQualifier>,
}

impl AttributePattern {
    pub fn new(var: impl Into<Arc<str>>) -> Self {
        AttributePattern { var: var.into(), qualifiers: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<Arc<str>>) -> Self {
        self.qualifiers.push(PatternQualifier::Field(name.into()));
        self
    }

    pub fn index(mut self, key: crate::common::value::Value) -> Self {
        self.qualifiers.push(PatternQualifier::Index(key));
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.qualifiers.push(PatternQualifier::Wildcard);
        self
    }

    pub fn matches(&self, attr: &Attribute) -> bool {
        if self.var.as_ref() != attr.var.as_ref() {
            return false;
        }
        if self.qualifiers.len() > attr.qualifiers.len() {
            return false;
        }
        self.qualifiers.iter().zip(attr.qualifiers.iter()).all(|(p, q)| match (p, q) {
            (PatternQualifier::Wildcard, _) => true,
            (PatternQualifier::Field(a), Qualifier::Field(b)) => a.as_ref() == b.as_ref(),
            (PatternQualifier::Index(a), Qualifier::Index(b)) => a == b,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_pattern_matches_any_extension() {
        let pattern = AttributePattern::new("request").field("auth");
        let attr = Attribute::root("request").with_field("auth").with_field("claims");
        assert!(pattern.matches(&attr));
    }

    #[test]
    fn sibling_field_does_not_match() {
        let pattern = AttributePattern::new("request").field("auth");
        let attr = Attribute::root("request").with_field("other");
        assert!(!pattern.matches(&attr));
    }

    #[test]
    fn wildcard_matches_any_single_qualifier() {
        let pattern = AttributePattern::new("request").field("items").wildcard();
        let attr = Attribute::root("request").with_field("items").with_index(crate::common::value::Value::Int(3));
        assert!(pattern.matches(&attr));
    }
}
