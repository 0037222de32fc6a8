//! Shared scanning helpers for the header parser dispatch table (spec §4.4):
//! quote/bracket/comment-aware comma and parameter splitting.

use crate::params::Params;
use crate::tokenizer::percent_decode;

/// Split `s` on top-level commas: commas inside a `"..."` quoted-string,
/// `<...>` angle brackets or `(...)` comment nest are not split points.
pub fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth_angle = 0i32;
    let mut depth_paren = 0i32;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i] as char;
        match b {
            '\\' if in_quotes => {
                i += 1; // skip escaped byte
            }
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => depth_angle += 1,
            '>' if !in_quotes => depth_angle = (depth_angle - 1).max(0),
            '(' if !in_quotes => depth_paren += 1,
            ')' if !in_quotes => depth_paren = (depth_paren - 1).max(0),
            c if c == sep && !in_quotes && depth_angle == 0 && depth_paren == 0 => {
                parts.push(s[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    let tail = s[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// Split `name=value` parameters off the tail of a header-parameter
/// segment, returning the non-parameter prefix and the decoded params.
/// Parameter values are unquoted and unescaped when quoted.
pub fn split_params(s: &str) -> (&str, Params) {
    let segments = split_top_level(s, ';');
    let mut iter = segments.into_iter();
    let prefix = iter.next().unwrap_or_default();
    let mut params = Params::new();
    for seg in iter {
        if seg.is_empty() {
            continue;
        }
        match seg.split_once('=') {
            Some((name, value)) => {
                let value = unquote(value.trim());
                params.set(name.trim().to_string(), Some(value));
            }
            None => params.set(seg.trim().to_string(), None),
        }
    }
    // Leak the trimmed prefix back with 'static-ish lifetime tied to `s`.
    let prefix_trimmed = prefix.trim();
    let offset = s.find(prefix_trimmed).unwrap_or(0);
    (&s[offset..offset + prefix_trimmed.len()], params)
}

/// Strip a single layer of surrounding double quotes and resolve
/// backslash-escapes; passes unquoted input through unchanged.
pub fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                    continue;
                }
            }
            out.push(c);
        }
        out
    } else {
        s.to_string()
    }
}

/// Decode a `;`-prefixed URI-style parameter list (as opposed to header
/// parameters, which share syntax but never percent-encode their values).
pub fn percent_decode_lossy(s: &str) -> String {
    percent_decode(s).unwrap_or_else(|_| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_top_level_ignores_commas_inside_quotes() {
        let parts = split_top_level(r#"Digest qop="auth,auth-int", algorithm=MD5"#, ',');
        assert_eq!(parts, vec![r#"Digest qop="auth,auth-int""#, "algorithm=MD5"]);
    }

    #[test]
    fn split_top_level_ignores_commas_inside_angle_brackets() {
        let parts = split_top_level("<sip:a@b.com?x=1,2>;q=0.5, <sip:c@d.com>", ',');
        assert_eq!(parts, vec!["<sip:a@b.com?x=1,2>;q=0.5", "<sip:c@d.com>"]);
    }

    #[test]
    fn split_params_extracts_prefix_and_decoded_values() {
        let (prefix, params) = split_params(r#"application/sdp;charset="utf-8""#);
        assert_eq!(prefix, "application/sdp");
        assert_eq!(params.get("charset"), Some(Some("utf-8")));
    }

    #[test]
    fn unquote_resolves_escapes() {
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
        assert_eq!(unquote("bare"), "bare");
    }
}
