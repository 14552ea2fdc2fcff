//! Cleanup of generated commit message text.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Leading labels models like to prepend, stripped in this order.
static LABEL_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)^commit message:").expect("Invalid regex"),
        Regex::new(r"(?i)^message:").expect("Invalid regex"),
    ]
});

/// Clean up the raw accumulated text into a commit message.
///
/// Trims whitespace, removes one layer of wrapping straight quotes, then
/// strips a leading `commit message:` and a leading `message:` label
/// (case-insensitive, each at most once). Returns an empty string when
/// nothing is left.
pub fn clean_message(raw: &str) -> String {
    let mut text = strip_wrapping_quotes(raw.trim()).trim();

    for re in LABEL_PATTERNS.iter() {
        if let Some(m) = re.find(text) {
            text = text[m.end()..].trim();
        }
    }

    text.to_string()
}

/// Strip exactly one pair of matching `"` or `'` around the whole string.
fn strip_wrapping_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2
            && let Some(inner) = text
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}
