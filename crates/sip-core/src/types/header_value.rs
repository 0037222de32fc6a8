//! The closed set of per-header value shapes produced by the header parser
//! dispatch table (spec §4.4). Every recognised header name decodes into
//! exactly one of these variants; an unrecognised header carries its raw
//! string values untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::method::Method;
use crate::params::Params;
use crate::uri::Uri;

/// One Via entry: `SIP/maj.min/PROTOCOL sent-by [;params]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaEntry {
    pub version: (u8, u8),
    pub protocol: String,
    pub sent_by_host: String,
    pub sent_by_port: Option<u16>,
    pub params: Params,
}

impl ViaEntry {
    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch").flatten()
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get("received").flatten()
    }

    pub fn sent_by(&self) -> (String, u16) {
        (self.sent_by_host.clone(), self.effective_port())
    }

    /// Port default per spec §4.4: 5060 for UDP/TCP, 5061 for TLS, 0 for
    /// anything else, when the wire form omits it.
    pub fn effective_port(&self) -> u16 {
        self.sent_by_port.unwrap_or_else(|| match self.protocol.to_ascii_uppercase().as_str() {
            "UDP" | "TCP" => 5060,
            "TLS" => 5061,
            _ => 0,
        })
    }
}

impl fmt::Display for ViaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{}.{}/{} ", self.version.0, self.version.1, self.protocol)?;
        if self.sent_by_host.contains(':') {
            write!(f, "[{}]", self.sent_by_host)?;
        } else {
            write!(f, "{}", self.sent_by_host)?;
        }
        if let Some(port) = self.sent_by_port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.params)
    }
}

/// One Contact entry: display-name, address-of-record URI, parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub params: Params,
}

impl fmt::Display for ContactEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
                write!(f, "{name} ")?;
            } else {
                write!(f, "\"{name}\" ")?;
            }
        }
        write!(f, "<{}>{}", self.uri, self.params)
    }
}

/// Contact's special-cased `*` wildcard (REGISTER de-registration) or a
/// concrete address list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContactList {
    Star,
    Contacts(Vec<ContactEntry>),
}

impl fmt::Display for ContactList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactList::Star => write!(f, "*"),
            ContactList::Contacts(list) => {
                let parts: Vec<String> = list.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// One Warning entry: `code agent "text"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEntry {
    pub code: u16,
    pub agent: String,
    pub text: String,
}

impl fmt::Display for WarningEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.code, self.agent, self.text)
    }
}

/// The value produced by parsing one header's field-body, per the format
/// selected for its name in the dispatch table (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    SingleToken(String),
    SingleTokenParams(String, Params),
    MultipleTokens(Vec<String>),
    MultipleTokenParams(Vec<(String, Params)>),
    SingleTypeSubtypeParams((String, String), Params),
    MultipleTypeSubtypeParams(Vec<((String, String), Params)>),
    MultipleUriParams(Vec<(Uri, Params)>),
    SingleInteger(i64),
    /// `{name -> raw_value}` for a single `scheme param, param, ...` challenge/credentials line.
    OnlyAuthParams(Params),
    /// Accumulated across repeated header lines: `[(scheme, {name->value})]`.
    SchemeAndAuthParams(Vec<(String, Params)>),
    SingleContactParams(Option<String>, Uri, Params),
    MultipleContactParams(Vec<ContactEntry>),
    StarOrMultipleContactParams(ContactList),
    TrimmedUtf8(String),
    CSeq(u32, Method),
    Date(DateTime<Utc>),
    Timestamp(f64, f64),
    MimeVersion(u32, u32),
    RetryAfter(u64, String, Params),
    MultipleWarnings(Vec<WarningEntry>),
    MultipleVias(Vec<ViaEntry>),
    /// An unrecognised header name: raw string values in wire order.
    Raw(Vec<String>),
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::SingleToken(s) => write!(f, "{s}"),
            HeaderValue::SingleTokenParams(s, p) => write!(f, "{s}{p}"),
            HeaderValue::MultipleTokens(v) => write!(f, "{}", v.join(", ")),
            HeaderValue::MultipleTokenParams(v) => {
                let parts: Vec<String> = v.iter().map(|(s, p)| format!("{s}{p}")).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::SingleTypeSubtypeParams((t, s), p) => write!(f, "{t}/{s}{p}"),
            HeaderValue::MultipleTypeSubtypeParams(v) => {
                let parts: Vec<String> = v.iter().map(|((t, s), p)| format!("{t}/{s}{p}")).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::MultipleUriParams(v) => {
                let parts: Vec<String> = v.iter().map(|(u, p)| format!("<{u}>{p}")).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::SingleInteger(n) => write!(f, "{n}"),
            HeaderValue::OnlyAuthParams(p) => {
                let inner = p.to_string();
                write!(f, "{}", inner.strip_prefix(';').unwrap_or(&inner).replace(';', ", "))
            }
            HeaderValue::SchemeAndAuthParams(v) => {
                let parts: Vec<String> = v
                    .iter()
                    .map(|(scheme, params)| {
                        let inner = params.to_string();
                        format!("{scheme} {}", inner.strip_prefix(';').unwrap_or(&inner).replace(';', ", "))
                    })
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::SingleContactParams(name, uri, params) => {
                ContactEntry { display_name: name.clone(), uri: uri.clone(), params: params.clone() }.fmt(f)
            }
            HeaderValue::MultipleContactParams(v) => {
                let parts: Vec<String> = v.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::StarOrMultipleContactParams(c) => c.fmt(f),
            HeaderValue::TrimmedUtf8(s) => write!(f, "{s}"),
            HeaderValue::CSeq(n, m) => write!(f, "{n} {m}"),
            HeaderValue::Date(dt) => write!(f, "{}", dt.format("%a, %d %b %Y %H:%M:%S GMT")),
            HeaderValue::Timestamp(t, d) => {
                if *d == 0.0 {
                    write!(f, "{t}")
                } else {
                    write!(f, "{t} {d}")
                }
            }
            HeaderValue::MimeVersion(maj, min) => write!(f, "{maj}.{min}"),
            HeaderValue::RetryAfter(secs, comment, params) => {
                write!(f, "{secs}")?;
                if !comment.is_empty() {
                    write!(f, " ({comment})")?;
                }
                write!(f, "{params}")
            }
            HeaderValue::MultipleWarnings(v) => {
                let parts: Vec<String> = v.iter().map(|w| w.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::MultipleVias(v) => {
                let parts: Vec<String> = v.iter().map(|w| w.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            HeaderValue::Raw(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn via_entry_defaults_port_by_protocol() {
        let entry = ViaEntry {
            version: (2, 0),
            protocol: "UDP".to_string(),
            sent_by_host: "example.com".to_string(),
            sent_by_port: None,
            params: Params::new(),
        };
        assert_eq!(entry.effective_port(), 5060);
    }

    #[test]
    fn contact_display_quotes_non_token_names() {
        let entry = ContactEntry {
            display_name: Some("Alice Smith".to_string()),
            uri: "sip:alice@example.com".parse().unwrap(),
            params: Params::new(),
        };
        assert_eq!(entry.to_string(), "Alice Smith <sip:alice@example.com>");
    }
}
