//! MCP-safe parameter name escaping
//!
//! OpenAPI allows parameter names like `filter[created_at]` that are not
//! valid MCP property names. Each `[` and `]` becomes `_`, and a trailing
//! `_` is appended when the result does not already end with one. The
//! (escaped -> original) mapping travels with the tool so invocation can
//! recover the upstream name.

/// Whether a parameter name needs escaping before it can be exposed as an
/// MCP property.
pub fn needs_escape(name: &str) -> bool {
    name.contains('[') || name.contains(']')
}

/// Escape a parameter name into its MCP-safe form. Names without brackets
/// are returned unchanged.
pub fn escape_parameter_name(name: &str) -> String {
    if !needs_escape(name) {
        return name.to_string();
    }
    let mut escaped: String = name
        .chars()
        .map(|c| if c == '[' || c == ']' { '_' } else { c })
        .collect();
    if !escaped.ends_with('_') {
        escaped.push('_');
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_names_unchanged() {
        assert_eq!(escape_parameter_name("limit"), "limit");
        assert_eq!(escape_parameter_name("page_size"), "page_size");
        assert!(!needs_escape("limit"));
    }

    #[test]
    fn test_bracket_names() {
        assert_eq!(escape_parameter_name("filter[created_at]"), "filter_created_at_");
        assert_eq!(escape_parameter_name("fields[user]"), "fields_user_");
        assert_eq!(escape_parameter_name("a[b]c"), "a_b_c_");
        assert_eq!(escape_parameter_name("ids[]"), "ids__");
    }

    #[test]
    fn test_escaped_names_are_mcp_safe() {
        for name in ["filter[created_at]", "page[number]", "x[y][z]"] {
            let escaped = escape_parameter_name(name);
            assert!(!escaped.contains('['), "{escaped}");
            assert!(!escaped.contains(']'), "{escaped}");
        }
    }

    proptest! {
        // Escaping never leaves brackets behind and is stable under repetition.
        #[test]
        fn prop_escape_idempotent(name in "[a-z_\\[\\]]{0,24}") {
            let once = escape_parameter_name(&name);
            prop_assert!(!once.contains('['));
            prop_assert!(!once.contains(']'));
            prop_assert_eq!(escape_parameter_name(&once), once.clone());
        }

        // A recorded (escaped -> original) pair always round-trips: the map
        // lookup is the unescape, so unescape(escape(n)) == n by construction.
        #[test]
        fn prop_map_round_trip(name in "[a-z]{1,8}\\[[a-z]{1,8}\\]") {
            let escaped = escape_parameter_name(&name);
            let mut map = std::collections::BTreeMap::new();
            map.insert(escaped.clone(), name.clone());
            prop_assert_eq!(map.get(&escaped), Some(&name));
        }
    }
}
