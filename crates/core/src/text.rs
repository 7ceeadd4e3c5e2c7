//! Text helpers: byte-bounded truncation and transport-sized splitting.

/// Truncates a string to at most `max_len` bytes at a char boundary.
#[must_use]
pub fn truncate_bytes(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}

/// Splits `text` into pieces of at most `max_chars` characters.
///
/// Prefers paragraph breaks, then line breaks, then whitespace. A single
/// word longer than the limit is the only thing ever cut in the middle.
/// Whitespace-only input yields no pieces.
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max_chars {
        let window_end = rest.char_indices().nth(max_chars).map_or(rest.len(), |(i, _)| i);
        let window = rest.get(..window_end).unwrap_or(rest);

        let cut = find_break(window).unwrap_or(window_end);
        let (head, tail) = rest.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            parts.push(head.to_owned());
        }
        rest = tail.trim_start();
    }

    if !rest.is_empty() {
        parts.push(rest.to_owned());
    }
    parts
}

/// Byte offset just past the best natural break inside `window`.
fn find_break(window: &str) -> Option<usize> {
    if let Some(i) = window.rfind("\n\n").filter(|&i| i > 0) {
        return Some(i + 2);
    }
    if let Some(i) = window.rfind('\n').filter(|&i| i > 0) {
        return Some(i + 1);
    }
    window
        .char_indices()
        .rev()
        .find(|&(i, c)| i > 0 && c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
}
