//! Container resolution for qualified identifiers.
//!
//! Implements C++ namespace-style resolution for CEL qualified
//! identifiers. When a container is specified (e.g.
//! `"cel.expr.conformance.proto2"`), qualified names are searched with
//! progressively shorter prefixes, most-qualified first.

/// Returns candidate names for `name` in resolution order (most
/// qualified first, unqualified last).
///
/// ```ignore
/// resolve_candidate_names(Some("a.b.c"), "R.s")
///   == ["a.b.c.R.s", "a.b.R.s", "a.R.s", "R.s"]
/// resolve_candidate_names(None, "R.s") == ["R.s"]
/// resolve_candidate_names(Some("a.b.c"), ".R.s") == ["R.s"]
/// ```
pub fn resolve_candidate_names(container: Option<&str>, name: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(absolute) = name.strip_prefix('.') {
        candidates.push(absolute.to_string());
        return candidates;
    }

    if let Some(container) = container {
        if !container.is_empty() {
            let mut parts: Vec<&str> = container.split('.').collect();
            while !parts.is_empty() {
                candidates.push(format!("{}.{}", parts.join("."), name));
                parts.pop();
            }
        }
    }

    candidates.push(name.to_string());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_unset_container_leaves_the_bare_name_as_the_only_candidate() {
        assert_eq!(resolve_candidate_names(None, "Claim"), vec!["Claim"]);
    }

    #[test]
    fn an_empty_container_string_behaves_like_no_container() {
        assert_eq!(resolve_candidate_names(Some(""), "Claim"), vec!["Claim"]);
    }

    #[test]
    fn a_single_segment_container_adds_one_qualified_candidate() {
        assert_eq!(resolve_candidate_names(Some("jwt"), "Claim"), vec!["jwt.Claim", "Claim"]);
    }

    #[test]
    fn a_deep_container_peels_off_one_segment_per_candidate() {
        assert_eq!(
            resolve_candidate_names(Some("acme.payments.v2"), "Invoice.LineItem"),
            vec![
                "acme.payments.v2.Invoice.LineItem",
                "acme.payments.Invoice.LineItem",
                "acme.Invoice.LineItem",
                "Invoice.LineItem",
            ]
        );
    }

    #[test]
    fn deeply_nested_container_still_bottoms_out_at_the_bare_name() {
        assert_eq!(
            resolve_candidate_names(Some("cel.expr.conformance.proto2"), "TestAllTypes"),
            vec![
                "cel.expr.conformance.proto2.TestAllTypes",
                "cel.expr.conformance.TestAllTypes",
                "cel.expr.TestAllTypes",
                "cel.TestAllTypes",
                "TestAllTypes",
            ]
        );
    }

    #[test]
    fn a_leading_dot_forces_absolute_resolution_ignoring_the_container() {
        assert_eq!(resolve_candidate_names(Some("acme.payments.v2"), ".Invoice"), vec!["Invoice"]);
    }

    #[test]
    fn a_qualified_name_fragment_is_appended_whole_to_each_prefix() {
        assert_eq!(
            resolve_candidate_names(Some("acme"), "billing.Invoice"),
            vec!["acme.billing.Invoice", "billing.Invoice"]
        );
    }
}
