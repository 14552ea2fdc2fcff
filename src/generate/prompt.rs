//! Prompt rendering for commit message generation.

/// Placeholder in the prompt template replaced by the diff text.
pub const DIFF_PLACEHOLDER: &str = "{diff}";

/// Appended when the diff exceeds the configured maximum.
pub const TRUNCATION_MARKER: &str = "\n... [diff truncated]";

/// Truncate a diff to at most `max_chars` characters.
///
/// Counts characters, not bytes, so the cut never splits a UTF-8 sequence.
/// When truncation happens the [`TRUNCATION_MARKER`] is appended.
pub fn truncate_diff(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&diff[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => diff.to_string(),
    }
}

/// Render the prompt template with the (possibly truncated) diff.
///
/// Every occurrence of `{diff}` is replaced.
pub fn render_prompt(template: &str, diff: &str, max_diff_length: usize) -> String {
    template.replace(DIFF_PLACEHOLDER, &truncate_diff(diff, max_diff_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_diff_untouched() {
        assert_eq!(truncate_diff("+one line\n", 100), "+one line\n");
    }

    #[test]
    fn test_diff_at_exact_limit_untouched() {
        let diff = "a".repeat(10);
        assert_eq!(truncate_diff(&diff, 10), diff);
    }

    #[test]
    fn test_long_diff_truncated_to_limit_plus_marker() {
        let diff = "x".repeat(25);
        let truncated = truncate_diff(&diff, 10);
        assert_eq!(truncated, format!("{}{}", "x".repeat(10), TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let diff = "\u{e9}".repeat(8);
        let truncated = truncate_diff(&diff, 5);
        assert_eq!(truncated, format!("{}{}", "\u{e9}".repeat(5), TRUNCATION_MARKER));
    }

    #[test]
    fn test_zero_limit_keeps_only_marker() {
        assert_eq!(truncate_diff("abc", 0), TRUNCATION_MARKER);
    }

    #[test]
    fn test_render_substitutes_truncated_diff() {
        let diff = "-old\n+new\n".repeat(100);
        let prompt = render_prompt("Write a commit message for:\n{diff}\nBe brief.", &diff, 20);

        let expected_diff = format!("{}{}", &diff[..20], TRUNCATION_MARKER);
        assert_eq!(
            prompt,
            format!("Write a commit message for:\n{expected_diff}\nBe brief.")
        );
        assert!(!prompt.contains(DIFF_PLACEHOLDER));
    }

    #[test]
    fn test_render_replaces_every_placeholder() {
        let prompt = render_prompt("{diff} / {diff}", "d", 10);
        assert_eq!(prompt, "d / d");
    }
}
