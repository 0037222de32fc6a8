//! Percent-decoding for URI components and quoted header-parameter values.

use crate::error::{Error, ParseErrorKind, Result};

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes in `input`, passing every other byte through
/// unchanged. An escape with a non-hex digit or a trailing `%` at end of
/// input is an error.
pub fn percent_decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = bytes.get(i + 1).copied().and_then(hex_val);
            let lo = bytes.get(i + 2).copied().and_then(hex_val);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push(hi * 16 + lo);
                    i += 3;
                }
                _ => return Err(Error::parse(ParseErrorKind::InvalidToken)),
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::parse(ParseErrorKind::InvalidToken))
}

/// Percent-encode any byte outside of `unreserved`.
pub fn percent_encode(input: &str, is_safe: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        if is_safe(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_escapes() {
        assert_eq!(percent_decode("a%20b").unwrap(), "a b");
        assert_eq!(percent_decode("plain").unwrap(), "plain");
    }

    #[test]
    fn rejects_truncated_escape() {
        assert!(percent_decode("a%2").is_err());
        assert!(percent_decode("a%zz").is_err());
    }

    #[test]
    fn round_trips_through_encode() {
        let encoded = percent_encode("a b", |b| b.is_ascii_alphanumeric());
        assert_eq!(percent_decode(&encoded).unwrap(), "a b");
    }
}
