//! Free-text cleanup for nicknames, room names and chat lines.

/// Removes markup tags. A `<` only opens a tag when followed by a letter,
/// `/`, `!` or `?`, so `a < b` survives; an unterminated tag eats the rest.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || matches!(*n, '/' | '!' | '?')) {
            for n in chars.by_ref() {
                if n == '>' { break; }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Strips tags, flattens line breaks and tabs, collapses whitespace runs, trims.
pub fn text_field(input: &str) -> String {
    strip_tags(input).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
