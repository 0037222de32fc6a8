//! Line-unfolding reassembly: the only ingress normalisation allowed before
//! parsing (spec §4.1).
//!
//! SIP header lines may be folded across multiple wire lines by prefixing a
//! continuation with SP or HT. CRLF, a lone LF, or a lone CR followed by
//! non-LWS all terminate a logical line; CRLF/LF/CR followed by LWS instead
//! folds the two physical lines into one, dropping the line break itself.

use crate::error::{Error, ParseErrorKind, Result};

const SP: u8 = b' ';
const HT: u8 = b'\t';

fn is_lws(b: u8) -> bool {
    b == SP || b == HT
}

/// Unfold raw header bytes, replacing folded CRLF/LF/CR sequences with
/// nothing (the following LWS is preserved) and non-folded line breaks with
/// a single `\n`.
///
/// Idempotent: `unfold(unfold(x)) == unfold(x)`, since no CR or CRLF survives
/// a single pass and a lone LF with no following LWS is simply copied through
/// as the canonical terminator.
pub fn unfold(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'\r' {
            let next = input.get(i + 1).copied();
            if next == Some(b'\n') {
                // CRLF
                if let Some(&after) = input.get(i + 2) {
                    if is_lws(after) {
                        i += 2; // fold: drop CRLF, keep following LWS
                        continue;
                    }
                }
                out.push(b'\n');
                i += 2;
            } else if let Some(after) = next {
                if is_lws(after) {
                    i += 1; // fold: lone CR followed by LWS
                    continue;
                }
                return Err(Error::parse(ParseErrorKind::InvalidLineBreak));
            } else {
                return Err(Error::parse(ParseErrorKind::InvalidLineBreak));
            }
        } else if b == b'\n' {
            if let Some(&after) = input.get(i + 1) {
                if is_lws(after) {
                    i += 1; // fold: lone LF followed by LWS
                    continue;
                }
            }
            out.push(b'\n');
            i += 1;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_crlf_continuation() {
        let input = b"From: Alice\r\n <sip:alice@example.com>\r\n";
        let out = unfold(input).unwrap();
        assert_eq!(out, b"From: Alice <sip:alice@example.com>\n".to_vec());
    }

    #[test]
    fn terminates_plain_lines() {
        let input = b"a\r\nb\r\n";
        assert_eq!(unfold(input).unwrap(), b"a\nb\n".to_vec());
    }

    #[test]
    fn lone_cr_without_lws_is_an_error() {
        assert!(unfold(b"a\rb").is_err());
    }

    #[test]
    fn is_idempotent() {
        let input = b"From: Alice\r\n <sip:alice@example.com>\r\nTo: Bob\r\n";
        let once = unfold(input).unwrap();
        let twice = unfold(&once).unwrap();
        assert_eq!(once, twice);
    }
}
