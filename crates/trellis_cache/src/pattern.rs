//! Glob matching for bulk invalidation.

/// Match `text` against a glob `pattern`
///
/// Supports `*` (any run of characters, including empty) and `?` (exactly
/// one character). Everything else matches literally.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Two-pointer scan with backtracking to the most recent `*`.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        assert!(glob_match("list_devices", "list_devices"));
        assert!(!glob_match("list_devices", "list_device"));
    }

    #[test]
    fn test_star_matches_any_run() {
        assert!(glob_match("list_devices:*", "list_devices:abc123"));
        assert!(glob_match("*devices*", "list_devices:abc123"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("list_*:x", "list_devices:y"));
    }

    #[test]
    fn test_question_matches_one() {
        assert!(glob_match("device_?", "device_1"));
        assert!(!glob_match("device_?", "device_12"));
        assert!(!glob_match("device_?", "device_"));
    }

    #[test]
    fn test_multiple_stars() {
        assert!(glob_match("*_dev*ces:*", "list_devices:abc"));
        assert!(glob_match("a*b*c", "axxbxxc"));
        assert!(!glob_match("a*b*c", "axxbxx"));
    }

    proptest::proptest! {
        #[test]
        fn prop_literal_matches_itself(text in "[a-z0-9_:]{0,24}") {
            proptest::prop_assert!(glob_match(&text, &text));
        }

        #[test]
        fn prop_star_prefix_matches_any_suffix(
            prefix in "[a-z_]{1,12}",
            suffix in "[a-z0-9]{0,16}"
        ) {
            let pattern = format!("{}*", prefix);
            let text = format!("{}{}", prefix, suffix);
            proptest::prop_assert!(glob_match(&pattern, &text));
        }
    }
}
