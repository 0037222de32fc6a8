//! Request-line, status-line and the overall message envelope (spec §3,
//! component C3).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::method::Method;
use crate::status::default_reason_phrase;
use crate::types::header_name::HeaderName;
use crate::types::header_table::HeaderTable;
use crate::uri::Uri;

/// `SIP/major.minor`. Conforming stacks require `{2, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const V2_0: Version = Version { major: 2, minor: 0 };
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLine {
    pub method: Method,
    pub request_uri: Uri,
    pub version: Version,
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.request_uri, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub version: Version,
    pub status_code: u16,
    pub reason_phrase: String,
}

impl StatusLine {
    /// `reason_phrase` defaults to the IANA table entry for `status_code`
    /// when not given explicitly.
    pub fn new(version: Version, status_code: u16, reason_phrase: Option<String>) -> Self {
        StatusLine {
            version,
            status_code,
            reason_phrase: reason_phrase.unwrap_or_else(|| default_reason_phrase(status_code).to_string()),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status_code, self.reason_phrase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StartLine {
    Request(RequestLine),
    Status(StatusLine),
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request(r) => r.fmt(f),
            StartLine::Status(s) => s.fmt(f),
        }
    }
}

/// The peer address/protocol a message should be sent to or was received
/// from, when it overrides ordinary routing (spec §3 `target`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

/// `{start_line, headers, body, target?}` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub start_line: StartLine,
    pub headers: HeaderTable,
    pub body: Vec<u8>,
    pub target: Option<Target>,
}

impl Message {
    pub fn request(method: Method, request_uri: Uri) -> Self {
        Message {
            start_line: StartLine::Request(RequestLine { method, request_uri, version: Version::V2_0 }),
            headers: HeaderTable::new(),
            body: Vec::new(),
            target: None,
        }
    }

    pub fn response(status_code: u16, reason_phrase: Option<String>) -> Self {
        Message {
            start_line: StartLine::Status(StatusLine::new(Version::V2_0, status_code, reason_phrase)),
            headers: HeaderTable::new(),
            body: Vec::new(),
            target: None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request(_))
    }

    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request(r) => Some(&r.method),
            StartLine::Status(_) => None,
        }
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        match &self.start_line {
            StartLine::Request(r) => Some(r),
            StartLine::Status(_) => None,
        }
    }

    pub fn status_line(&self) -> Option<&StatusLine> {
        match &self.start_line {
            StartLine::Status(s) => Some(s),
            StartLine::Request(_) => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_line().map(|s| s.status_code)
    }

    /// Render the start-line, header block and body as wire bytes.
    /// `Content-Length` is not synthesised here; callers set it explicitly
    /// before formatting (spec §4.5 invariant: present length must equal
    /// `|body|`).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.start_line.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, values) in self.headers.iter() {
            for value in values {
                out.extend_from_slice(name.as_str().as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            }
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl HeaderTable {
    /// Convenience accessor used throughout the validator and router: the
    /// topmost Via entry, if any.
    pub fn topmost_via(&self) -> Option<&crate::types::header_value::ViaEntry> {
        match self.fetch(&HeaderName::Via) {
            Some(crate::types::header_value::HeaderValue::MultipleVias(vias)) => vias.first(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_formats_per_rfc() {
        let line = RequestLine {
            method: Method::Invite,
            request_uri: "sip:bob@biloxi.com".parse().unwrap(),
            version: Version::V2_0,
        };
        assert_eq!(line.to_string(), "INVITE sip:bob@biloxi.com SIP/2.0");
    }

    #[test]
    fn status_line_defaults_reason_phrase() {
        let line = StatusLine::new(Version::V2_0, 486, None);
        assert_eq!(line.to_string(), "SIP/2.0 486 Busy Here");
    }

    #[test]
    fn to_bytes_terminates_header_block_with_blank_line() {
        let msg = Message::request(Method::Options, "sip:example.com".parse().unwrap());
        let bytes = msg.to_bytes();
        assert!(bytes.ends_with(b"\r\n\r\n"));
    }
}
