//! Start-line and whole-message parsing (spec §4.4/§4.9): unfolds the header
//! block, splits it from the body, and dispatches each header's field-body
//! through the [`headers`] table into the typed [`HeaderValue`](crate::types::header_value::HeaderValue) model.

pub mod headers;
pub mod helpers;

use crate::error::{Error, ParseErrorKind, Result};
use crate::method::Method;
use crate::tokenizer::unfold;
use crate::types::header_name::HeaderName;
use crate::types::header_table::HeaderTable;
use crate::types::header_value::HeaderValue;
use crate::types::message::{Message, RequestLine, StartLine, StatusLine, Version};

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split raw wire bytes into `(header_block, body)` on the first blank
/// line. The header block is returned with the terminating blank line
/// excluded; the body is returned untouched (never unfolded).
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(idx) = find_subsequence(raw, b"\r\n\r\n") {
        return (&raw[..idx], &raw[idx + 4..]);
    }
    if let Some(idx) = find_subsequence(raw, b"\n\n") {
        return (&raw[..idx], &raw[idx + 2..]);
    }
    (raw, &[])
}

fn parse_version(s: &str) -> Result<Version> {
    let rest = s
        .strip_prefix("SIP/")
        .ok_or_else(|| Error::parse(ParseErrorKind::UnknownVersion))?;
    let (maj, min) = rest
        .split_once('.')
        .ok_or_else(|| Error::parse(ParseErrorKind::MalformedVersionNumber))?;
    let major: u8 = maj.parse().map_err(|_| Error::parse(ParseErrorKind::MalformedVersionNumber))?;
    let minor: u8 = min.parse().map_err(|_| Error::parse(ParseErrorKind::MalformedVersionNumber))?;
    Ok(Version { major, minor })
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let mut parts = line.splitn(3, ' ');
    let first = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| Error::parse(ParseErrorKind::MissingMethod))?;
    let second = parts.next().ok_or_else(|| Error::parse(ParseErrorKind::MissingUri))?;
    let third = parts.next().ok_or_else(|| Error::parse(ParseErrorKind::MissingVersionSpec))?;

    if first.starts_with("SIP/") {
        let version = parse_version(first)?;
        let status_code: u16 = second.parse().map_err(|_| Error::parse(ParseErrorKind::InvalidStatusCode))?;
        if !(100..=699).contains(&status_code) {
            return Err(Error::parse(ParseErrorKind::InvalidStatusCode));
        }
        Ok(StartLine::Status(StatusLine::new(version, status_code, Some(third.to_string()))))
    } else {
        let method: Method = first.parse().expect("Method::from_str is infallible");
        let request_uri = second.parse()?;
        let version = parse_version(third)?;
        Ok(StartLine::Request(RequestLine { method, request_uri, version }))
    }
}

/// Parse one logical, already-unfolded header line `"Name: value"` into
/// `(name, raw_value)`.
fn split_header_line(line: &str) -> Result<(HeaderName, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::parse(ParseErrorKind::InvalidToken))?;
    let name: HeaderName = name.trim().parse().expect("HeaderName::from_str is infallible");
    Ok((name, value.trim().to_string()))
}

/// Parse a complete SIP message off the wire (spec §4.9 `receive_raw`,
/// minus the transport-address Via rewrite performed by the validator).
pub fn parse_message(raw: &[u8]) -> Result<Message> {
    let (header_block, body) = split_header_body(raw);
    let unfolded = unfold(header_block)?;
    let text = String::from_utf8_lossy(&unfolded);
    let mut lines = text.split('\n').filter(|l| !l.is_empty());

    let start_line_text = lines.next().ok_or_else(|| Error::parse(ParseErrorKind::MissingVersionSpec))?;
    let start_line = parse_start_line(start_line_text)?;

    // Group raw header lines by name, preserving first-appearance order.
    let mut groups: Vec<(HeaderName, Vec<String>)> = Vec::new();
    for line in lines {
        let (name, value) = split_header_line(line)?;
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => groups.push((name, vec![value])),
        }
    }

    let mut headers = HeaderTable::new();
    for (name, values) in groups {
        match &name {
            HeaderName::Other(_) => {
                headers.put_back(name, HeaderValue::Raw(values));
            }
            _ => {
                if !name.is_multi_value() && values.len() > 1 {
                    return Err(Error::parse_in(ParseErrorKind::MultipleDefinition, name.as_str().to_string()));
                }
                let joined = values.join(", ");
                let value = headers::dispatch(&name, &joined)
                    .map_err(|e| annotate(e, name.as_str()))?;
                headers.put_back(name, value);
            }
        }
    }

    Ok(Message { start_line, headers, body: body.to_vec(), target: None })
}

fn annotate(err: Error, context: &str) -> Error {
    match err {
        Error::Parse { kind, context: None } => Error::parse_in(kind, context.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::default_reason_phrase;

    const WSINV: &str = "INVITE sip:vivekg@chair-dnrc.example.com;unknownparam SIP/2.0\r\n\
TO :\r\n\
 sip:vivekg@chair-dnrc.example.com ;   tag    = 1918181833n\r\n\
From   :   \"J Rosenberg \\\\\\\"\"       <sip:jdrosen@example.com>\r\n\
  ;\r\n\
  tag = 98asjd8\r\n\
MaX-fOrWaRdS: 0068\r\n\
Call-ID: wsinv.ndaksdj@192.0.2.1\r\n\
Content-Length   : 150\r\n\
cseq: 0009\r\n\
  INVITE\r\n\
Via  : SIP  /   2.0\r\n\
 /UDP\r\n\
    192.0.2.2;branch=390skdjuw\r\n\
Via: SIP / 2.0 / UDP 192.0.2.1:5060 ;\r\n\
 branch=z9hG4bKkdjuw\r\n\
route: <sip:services.example.com;lr;unknownwith=value;unknown>\r\n\
v:  SIP  / 2.0  / UDP\r\n   192.0.2.1\r\n\
m:\"Quote \\\" Unbalanced Ok\" <sip:unbalanced@example.com>\r\n\
\r\n";

    #[test]
    fn parses_wsinv_torture_message() {
        let body = "a".repeat(150);
        let raw = format!("{WSINV}{body}");
        let msg = parse_message(raw.as_bytes()).unwrap();
        let req = msg.request_line().unwrap();
        assert_eq!(req.method, Method::Invite);
        assert_eq!(req.request_uri.host, "chair-dnrc.example.com");
        assert_eq!(msg.headers.fetch(&HeaderName::MaxForwards), Some(&HeaderValue::SingleInteger(68)));
        assert_eq!(msg.headers.fetch(&HeaderName::ContentLength), Some(&HeaderValue::SingleInteger(150)));
        assert_eq!(msg.headers.fetch(&HeaderName::CSeq), Some(&HeaderValue::CSeq(9, Method::Invite)));
        match msg.headers.fetch(&HeaderName::Via).unwrap() {
            HeaderValue::MultipleVias(vias) => {
                assert_eq!(vias.len(), 3);
                assert!(vias.iter().all(|v| v.effective_port() == 5060));
            }
            other => panic!("unexpected {other:?}"),
        }
        match msg.headers.fetch(&HeaderName::Route).unwrap() {
            HeaderValue::MultipleContactParams(routes) => {
                assert_eq!(routes.len(), 1);
                assert!(routes[0].uri.parameters.contains("lr"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_status_line_with_default_reason() {
        let raw = b"SIP/2.0 486 Busy Here\r\nTo: <sip:bob@biloxi.com>\r\n\r\n";
        let msg = parse_message(raw).unwrap();
        let status = msg.status_line().unwrap();
        assert_eq!(status.status_code, 486);
        assert_eq!(status.reason_phrase, default_reason_phrase(486));
    }

    #[test]
    fn repeated_single_value_header_is_rejected() {
        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\nTo: <sip:bob@biloxi.com>\r\nTo: <sip:bob@biloxi.com>\r\n\r\n";
        let err = parse_message(raw).unwrap_err();
        assert_eq!(err.kind(), Some(ParseErrorKind::MultipleDefinition));
    }
}
