//! Canonical header-name tags (spec §3 HeaderTable, §4.4 compact forms,
//! §6 recognised headers).
//!
//! Header names are case-insensitive in SIP; `FromStr` folds case and maps
//! the single-letter compact forms to their long form before matching.
//! An unrecognised name is preserved verbatim via `Other`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderName {
    Accept,
    AcceptEncoding,
    AcceptLanguage,
    AlertInfo,
    Allow,
    AllowEvents,
    AuthenticationInfo,
    Authorization,
    CallId,
    CallInfo,
    Contact,
    ContentDisposition,
    ContentEncoding,
    ContentLanguage,
    ContentLength,
    ContentType,
    CSeq,
    Date,
    ErrorInfo,
    Event,
    Expires,
    From,
    InReplyTo,
    MaxForwards,
    MimeVersion,
    MinExpires,
    Organization,
    Priority,
    ProxyAuthenticate,
    ProxyAuthorization,
    ProxyRequire,
    Reason,
    RecordRoute,
    ReferTo,
    ReferredBy,
    ReplyTo,
    Require,
    RetryAfter,
    Route,
    Server,
    Subject,
    Supported,
    Timestamp,
    To,
    Unsupported,
    UserAgent,
    Via,
    Warning,
    WwwAuthenticate,
    /// A header this table does not know by name, preserved verbatim.
    Other(String),
}

impl HeaderName {
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Accept => "Accept",
            HeaderName::AcceptEncoding => "Accept-Encoding",
            HeaderName::AcceptLanguage => "Accept-Language",
            HeaderName::AlertInfo => "Alert-Info",
            HeaderName::Allow => "Allow",
            HeaderName::AllowEvents => "Allow-Events",
            HeaderName::AuthenticationInfo => "Authentication-Info",
            HeaderName::Authorization => "Authorization",
            HeaderName::CallId => "Call-ID",
            HeaderName::CallInfo => "Call-Info",
            HeaderName::Contact => "Contact",
            HeaderName::ContentDisposition => "Content-Disposition",
            HeaderName::ContentEncoding => "Content-Encoding",
            HeaderName::ContentLanguage => "Content-Language",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::ContentType => "Content-Type",
            HeaderName::CSeq => "CSeq",
            HeaderName::Date => "Date",
            HeaderName::ErrorInfo => "Error-Info",
            HeaderName::Event => "Event",
            HeaderName::Expires => "Expires",
            HeaderName::From => "From",
            HeaderName::InReplyTo => "In-Reply-To",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::MimeVersion => "MIME-Version",
            HeaderName::MinExpires => "Min-Expires",
            HeaderName::Organization => "Organization",
            HeaderName::Priority => "Priority",
            HeaderName::ProxyAuthenticate => "Proxy-Authenticate",
            HeaderName::ProxyAuthorization => "Proxy-Authorization",
            HeaderName::ProxyRequire => "Proxy-Require",
            HeaderName::Reason => "Reason",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::ReferredBy => "Referred-By",
            HeaderName::ReplyTo => "Reply-To",
            HeaderName::Require => "Require",
            HeaderName::RetryAfter => "Retry-After",
            HeaderName::Route => "Route",
            HeaderName::Server => "Server",
            HeaderName::Subject => "Subject",
            HeaderName::Supported => "Supported",
            HeaderName::Timestamp => "Timestamp",
            HeaderName::To => "To",
            HeaderName::Unsupported => "Unsupported",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Via => "Via",
            HeaderName::Warning => "Warning",
            HeaderName::WwwAuthenticate => "WWW-Authenticate",
            HeaderName::Other(s) => s,
        }
    }

    /// True for headers whose §6 value shape concatenates across repeated
    /// header lines into a single ordered sequence (almost everything
    /// except the handful of headers that may legally appear only once).
    pub fn is_multi_value(&self) -> bool {
        !matches!(
            self,
            HeaderName::CallId
                | HeaderName::ContentLength
                | HeaderName::ContentType
                | HeaderName::CSeq
                | HeaderName::Date
                | HeaderName::Expires
                | HeaderName::From
                | HeaderName::MaxForwards
                | HeaderName::MimeVersion
                | HeaderName::MinExpires
                | HeaderName::Organization
                | HeaderName::Priority
                | HeaderName::Subject
                | HeaderName::Timestamp
                | HeaderName::To
                | HeaderName::UserAgent
                | HeaderName::Server
        )
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HeaderName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "accept" => HeaderName::Accept,
            "accept-encoding" => HeaderName::AcceptEncoding,
            "accept-language" => HeaderName::AcceptLanguage,
            "alert-info" => HeaderName::AlertInfo,
            "allow" => HeaderName::Allow,
            "allow-events" | "u" => HeaderName::AllowEvents,
            "authentication-info" => HeaderName::AuthenticationInfo,
            "authorization" => HeaderName::Authorization,
            "call-id" | "i" => HeaderName::CallId,
            "call-info" => HeaderName::CallInfo,
            "contact" | "m" => HeaderName::Contact,
            "content-disposition" => HeaderName::ContentDisposition,
            "content-encoding" | "e" => HeaderName::ContentEncoding,
            "content-language" => HeaderName::ContentLanguage,
            "content-length" | "l" => HeaderName::ContentLength,
            "content-type" | "c" => HeaderName::ContentType,
            "cseq" => HeaderName::CSeq,
            "date" => HeaderName::Date,
            "error-info" => HeaderName::ErrorInfo,
            "event" | "o" => HeaderName::Event,
            "expires" => HeaderName::Expires,
            "from" | "f" => HeaderName::From,
            "in-reply-to" => HeaderName::InReplyTo,
            "max-forwards" => HeaderName::MaxForwards,
            "mime-version" => HeaderName::MimeVersion,
            "min-expires" => HeaderName::MinExpires,
            "organization" => HeaderName::Organization,
            "priority" => HeaderName::Priority,
            "proxy-authenticate" => HeaderName::ProxyAuthenticate,
            "proxy-authorization" => HeaderName::ProxyAuthorization,
            "proxy-require" => HeaderName::ProxyRequire,
            "reason" => HeaderName::Reason,
            "record-route" => HeaderName::RecordRoute,
            "refer-to" | "r" => HeaderName::ReferTo,
            "referred-by" | "b" => HeaderName::ReferredBy,
            "reply-to" => HeaderName::ReplyTo,
            "require" => HeaderName::Require,
            "retry-after" => HeaderName::RetryAfter,
            "route" => HeaderName::Route,
            "server" => HeaderName::Server,
            "subject" | "s" => HeaderName::Subject,
            "supported" | "k" => HeaderName::Supported,
            "timestamp" => HeaderName::Timestamp,
            "to" | "t" => HeaderName::To,
            "unsupported" => HeaderName::Unsupported,
            "user-agent" => HeaderName::UserAgent,
            "via" | "v" => HeaderName::Via,
            "warning" => HeaderName::Warning,
            "www-authenticate" => HeaderName::WwwAuthenticate,
            _ => HeaderName::Other(s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_forms_map_to_long_form() {
        assert_eq!("v".parse::<HeaderName>().unwrap(), HeaderName::Via);
        assert_eq!("m".parse::<HeaderName>().unwrap(), HeaderName::Contact);
        assert_eq!("l".parse::<HeaderName>().unwrap(), HeaderName::ContentLength);
        assert_eq!("k".parse::<HeaderName>().unwrap(), HeaderName::Supported);
        assert_eq!("u".parse::<HeaderName>().unwrap(), HeaderName::AllowEvents);
    }

    #[test]
    fn unknown_header_is_preserved_verbatim() {
        let h: HeaderName = "X-Custom".parse().unwrap();
        assert_eq!(h, HeaderName::Other("X-Custom".to_string()));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!("ViA".parse::<HeaderName>().unwrap(), HeaderName::Via);
    }
}
