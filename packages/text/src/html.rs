//! Minimal HTML escaping for user-supplied text embedded in popups.

/// Escapes `&`, `<`, `>`, `"` and `'`, then turns newlines into `<br>`.
#[must_use]
pub fn escape_multiline(s: &str) -> String {
    escape(s).replace('\n', "<br>")
}

/// Escapes the five HTML-significant characters.
#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
