//! UTF-8-safe string helpers shared by the index and the assembler.
//!
//! Budgets, caps, and radii are all measured in `char`s, while `str::find`
//! works in bytes. Everything here converts between the two without ever
//! slicing inside a multi-byte character.

/// Normalize text for indexing and lookup: trim, then case-fold.
pub fn normalize(text: &str) -> String {
    fold_case(text.trim())
}

/// Per-char lowercase mapping.
///
/// Unlike `str::to_lowercase` this ignores word context (Greek final sigma),
/// so folding a substring always yields a substring of the folded whole.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Number of `char`s in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
pub fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The longest prefix of `text` holding at most `max_chars` chars.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// The longest suffix of `text` holding at most `max_chars` chars.
pub fn last_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((byte, _)) => &text[byte..],
        None => text,
    }
}

/// Byte offset reached by walking `radius` chars backwards from `from`.
fn step_back(text: &str, from: usize, radius: usize) -> usize {
    if radius == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(radius - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset reached by walking `radius` chars forwards from `from`.
fn step_forward(text: &str, from: usize, radius: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Slice of `text` covering the byte span `start..end` widened by
/// `radius` chars on each side, clamped to the text.
pub fn window_around(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let start = snap_to_char_boundary(text, start);
    let end = snap_to_char_boundary(text, end.max(start));
    let from = step_back(text, start, radius);
    let to = step_forward(text, end, radius);
    &text[from..to]
}

/// Find `needle` in `haystack` ignoring ASCII case.
///
/// ASCII lowercasing keeps byte lengths intact, so the returned offset is
/// valid in the original `haystack`.
pub fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Locate `needle` verbatim, falling back to an ASCII-case-insensitive
/// search. Returns the byte span of the first hit.
pub fn find_span(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .find(needle)
        .or_else(|| find_ignore_ascii_case(haystack, needle))
        .map(|start| (start, start + needle.len()))
}

/// Replace every run of whitespace (including newlines) with one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_last_chars() {
        assert_eq!(last_chars("abcdef", 2), "ef");
        assert_eq!(last_chars("ab", 5), "ab");
        assert_eq!(last_chars("ab", 0), "");
        assert_eq!(last_chars("xyzé", 1), "é");
    }

    #[test]
    fn test_window_around_clamps() {
        let text = "0123456789";
        assert_eq!(window_around(text, 4, 5, 2), "23456");
        assert_eq!(window_around(text, 0, 1, 5), "012345");
        assert_eq!(window_around(text, 9, 10, 3), "6789");
    }

    #[test]
    fn test_window_around_multibyte() {
        let text = "ééxéé";
        let start = text.find('x').unwrap();
        assert_eq!(window_around(text, start, start + 1, 1), "éxé");
    }

    #[test]
    fn test_find_span_falls_back_to_case_insensitive() {
        let text = "The chapter begins here.";
        assert_eq!(find_span(text, "chapter"), Some((4, 11)));
        assert_eq!(find_span(text, "CHAPTER"), Some((4, 11)));
        assert_eq!(find_span(text, "missing"), None);
        assert_eq!(find_span(text, ""), None);
    }

    #[test]
    fn test_fold_case_is_context_free() {
        assert_eq!(normalize("  The River "), "the river");
        assert!(fold_case("ΟΔΟΣΑ road").contains(&fold_case("ΟΔΟΣ")));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\n b\tc "), "a b c");
    }

    #[test]
    fn test_snap_to_char_boundary() {
        let s = "aé";
        assert_eq!(snap_to_char_boundary(s, 2), 1);
        assert_eq!(snap_to_char_boundary(s, 10), s.len());
    }
}
