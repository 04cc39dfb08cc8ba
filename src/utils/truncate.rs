//! Truncation Utilities
//!
//! Character-bounded truncation that respects UTF-8 boundaries.

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Single-line preview of at most `max_chars` characters, ending in "..."
/// when shortened
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let keep = max_chars.saturating_sub(3);
    format!("{}...", truncate_chars(&flat, keep))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_utf8() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("one\ntwo", 20), "one two");
        assert_eq!(ellipsize("a fairly long decision", 10), "a fairl...");
        assert_eq!(ellipsize("a fairly long decision", 10).chars().count(), 10);
    }
}
