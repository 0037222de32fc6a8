//! Per-header-name parser dispatch table (spec §4.4, component C4): maps a
//! canonical [`HeaderName`] to one of the closed [`HeaderValue`] formats and
//! parses a header's (possibly multi-line-joined) raw field-body into it.

use crate::error::{Error, ParseErrorKind, Result};
use crate::method::Method;
use crate::params::Params;
use crate::tokenizer::quoted_string;
use crate::types::header_name::HeaderName;
use crate::types::header_value::{ContactEntry, ContactList, HeaderValue, ViaEntry, WarningEntry};
use crate::uri::Uri;

use super::helpers::{split_params, split_top_level, unquote};

/// Dispatch `raw` (already joined across repeated header lines in wire
/// order) to the format selected for `name`.
pub fn dispatch(name: &HeaderName, raw: &str) -> Result<HeaderValue> {
    use HeaderName::*;
    match name {
        Accept | AcceptEncoding | AcceptLanguage => parse_multiple_token_params(raw),
        AlertInfo | CallInfo | ErrorInfo => parse_multiple_uri_params(raw),
        Allow | ContentEncoding | ContentLanguage | InReplyTo | ProxyRequire | Require | Supported
        | Unsupported => parse_multiple_tokens(raw),
        AuthenticationInfo => Ok(HeaderValue::OnlyAuthParams(parse_only_auth_params(raw))),
        Authorization | ProxyAuthenticate | ProxyAuthorization | WwwAuthenticate => {
            Ok(HeaderValue::SchemeAndAuthParams(parse_scheme_and_auth_params(raw)?))
        }
        CallId => parse_single_token(raw),
        Contact => parse_contact_list(raw),
        ContentDisposition => parse_single_token_params(raw),
        ContentLength | Expires | MaxForwards | MinExpires => parse_single_integer(raw),
        ContentType => parse_single_type_subtype_params(raw),
        CSeq => parse_cseq(raw),
        Date => parse_date(raw),
        From | ReferTo | ReferredBy | ReplyTo | To => parse_single_contact(raw),
        MimeVersion => parse_mime_version(raw),
        Organization | Server | Subject | UserAgent => Ok(HeaderValue::TrimmedUtf8(raw.trim().to_string())),
        Priority => parse_single_token(raw),
        Reason => parse_multiple_token_params(raw),
        RecordRoute | Route => parse_multiple_contact_params(raw),
        RetryAfter => parse_retry_after(raw),
        Timestamp => parse_timestamp(raw),
        Via => parse_vias(raw),
        Warning => parse_warnings(raw),
        Other(_) => unreachable!("Other headers are assembled as Raw before reaching dispatch"),
    }
}

fn parse_type_subtype(prefix: &str) -> Result<(String, String)> {
    prefix
        .split_once('/')
        .map(|(t, s)| (t.trim().to_string(), s.trim().to_string()))
        .ok_or_else(|| Error::parse(ParseErrorKind::MissingSubtype))
}

fn parse_single_token(raw: &str) -> Result<HeaderValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::parse(ParseErrorKind::EmptyValue));
    }
    Ok(HeaderValue::SingleToken(trimmed.to_string()))
}

fn parse_single_token_params(raw: &str) -> Result<HeaderValue> {
    let (prefix, params) = split_params(raw);
    if prefix.is_empty() {
        return Err(Error::parse(ParseErrorKind::EmptyValue));
    }
    Ok(HeaderValue::SingleTokenParams(prefix.to_string(), params))
}

fn parse_multiple_tokens(raw: &str) -> Result<HeaderValue> {
    let items: Vec<String> = split_top_level(raw, ',').into_iter().filter(|s| !s.is_empty()).collect();
    Ok(HeaderValue::MultipleTokens(items))
}

fn parse_multiple_token_params(raw: &str) -> Result<HeaderValue> {
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        let (prefix, params) = split_params(&seg);
        out.push((prefix.to_string(), params));
    }
    Ok(HeaderValue::MultipleTokenParams(out))
}

fn parse_single_type_subtype_params(raw: &str) -> Result<HeaderValue> {
    let (prefix, params) = split_params(raw);
    Ok(HeaderValue::SingleTypeSubtypeParams(parse_type_subtype(prefix)?, params))
}

fn parse_multiple_uri_params(raw: &str) -> Result<HeaderValue> {
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        out.push(parse_uri_params(&seg)?);
    }
    Ok(HeaderValue::MultipleUriParams(out))
}

fn parse_uri_params(segment: &str) -> Result<(Uri, Params)> {
    let segment = segment.trim();
    let inner = segment
        .strip_prefix('<')
        .ok_or_else(|| Error::parse(ParseErrorKind::UnclosedLaquot))?;
    let gt = inner
        .find('>')
        .ok_or_else(|| Error::parse(ParseErrorKind::UnclosedLaquot))?;
    let uri: Uri = inner[..gt].parse()?;
    let params = parse_semi_params(&inner[gt + 1..]);
    Ok((uri, params))
}

fn parse_semi_params(s: &str) -> Params {
    let mut params = Params::new();
    for seg in split_top_level(s, ';') {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        match seg.split_once('=') {
            Some((n, v)) => params.set(n.trim().to_string(), Some(unquote(v.trim()))),
            None => params.set(seg.to_string(), None),
        }
    }
    params
}

fn parse_single_integer(raw: &str) -> Result<HeaderValue> {
    let n: i64 = raw.trim().parse().map_err(|_| Error::parse(ParseErrorKind::InvalidToken))?;
    Ok(HeaderValue::SingleInteger(n))
}

fn parse_only_auth_params(raw: &str) -> Params {
    let mut params = Params::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        match seg.split_once('=') {
            Some((n, v)) => params.set(n.trim().to_string(), Some(unquote(v.trim()))),
            None => params.set(seg.to_string(), None),
        }
    }
    params
}

/// Heuristically splits a challenge/credentials line into `(scheme,
/// params)` groups: a comma-separated segment starts a new scheme when its
/// leading word contains no `=` but the remainder (after the first run of
/// whitespace) does; otherwise it continues the previous scheme's params.
fn parse_scheme_and_auth_params(raw: &str) -> Result<Vec<(String, Params)>> {
    let mut out: Vec<(String, Params)> = Vec::new();
    for part in split_top_level(raw, ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(sp) = part.find(char::is_whitespace) {
            let word1 = &part[..sp];
            let rest = part[sp..].trim();
            if !word1.contains('=') && rest.contains('=') {
                let mut params = Params::new();
                if let Some((n, v)) = rest.split_once('=') {
                    params.set(n.trim().to_string(), Some(unquote(v.trim())));
                }
                out.push((word1.to_string(), params));
                continue;
            }
        }
        match part.split_once('=') {
            Some((n, v)) => {
                let last = out.last_mut().ok_or_else(|| Error::parse(ParseErrorKind::InvalidToken))?;
                last.1.set(n.trim().to_string(), Some(unquote(v.trim())));
            }
            None => {
                let last = out.last_mut().ok_or_else(|| Error::parse(ParseErrorKind::InvalidToken))?;
                last.1.set(part.to_string(), None);
            }
        }
    }
    Ok(out)
}

fn parse_contact_entry(segment: &str) -> Result<ContactEntry> {
    let segment = segment.trim();
    if let Some(rest) = segment.strip_prefix('"') {
        let (name, rest) = quoted_string(format!("\"{rest}").as_bytes())
            .map_err(|_| Error::parse(ParseErrorKind::UnclosedQstring))?;
        let rest = std::str::from_utf8(rest).unwrap_or_default().trim_start();
        return parse_addr_angle(Some(name), rest);
    }
    if let Some(lt) = segment.find('<') {
        let display = segment[..lt].trim();
        let display_name = if display.is_empty() { None } else { Some(display.to_string()) };
        return parse_addr_angle(display_name, &segment[lt..]);
    }
    // Bare addr-spec: a trailing `;name=value` run is a generic header
    // parameter (e.g. `tag`), LWS-tolerant around `;`/`=` unlike a URI's
    // own parameters, so it is split off before the URI is parsed.
    let mut segs = split_top_level(segment, ';').into_iter();
    let uri_part = segs.next().unwrap_or_default();
    let uri: Uri = uri_part.trim().parse()?;
    let mut params = Params::new();
    for seg in segs {
        if seg.is_empty() {
            continue;
        }
        match seg.split_once('=') {
            Some((n, v)) => params.set(n.trim().to_string(), Some(unquote(v.trim()))),
            None => params.set(seg.trim().to_string(), None),
        }
    }
    Ok(ContactEntry { display_name: None, uri, params })
}

fn parse_addr_angle(display_name: Option<String>, rest: &str) -> Result<ContactEntry> {
    let inner = rest
        .strip_prefix('<')
        .ok_or_else(|| Error::parse(ParseErrorKind::UnclosedLaquot))?;
    let gt = inner
        .find('>')
        .ok_or_else(|| Error::parse(ParseErrorKind::UnclosedLaquot))?;
    let uri: Uri = inner[..gt].parse()?;
    let params = parse_semi_params(&inner[gt + 1..]);
    Ok(ContactEntry { display_name, uri, params })
}

fn parse_contact_list(raw: &str) -> Result<HeaderValue> {
    if raw.trim() == "*" {
        return Ok(HeaderValue::StarOrMultipleContactParams(ContactList::Star));
    }
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        out.push(parse_contact_entry(&seg)?);
    }
    Ok(HeaderValue::StarOrMultipleContactParams(ContactList::Contacts(out)))
}

fn parse_multiple_contact_params(raw: &str) -> Result<HeaderValue> {
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        out.push(parse_contact_entry(&seg)?);
    }
    Ok(HeaderValue::MultipleContactParams(out))
}

fn parse_single_contact(raw: &str) -> Result<HeaderValue> {
    let entry = parse_contact_entry(raw)?;
    Ok(HeaderValue::SingleContactParams(entry.display_name, entry.uri, entry.params))
}

fn parse_cseq(raw: &str) -> Result<HeaderValue> {
    let raw = raw.trim();
    let mut it = raw.splitn(2, char::is_whitespace);
    let num = it.next().filter(|s| !s.is_empty()).ok_or_else(|| Error::parse(ParseErrorKind::InvalidToken))?;
    let method_str = it.next().ok_or_else(|| Error::parse(ParseErrorKind::InvalidToken))?.trim();
    let n: u32 = num.parse().map_err(|_| Error::parse(ParseErrorKind::InvalidToken))?;
    let method: Method = method_str.parse().expect("Method::from_str is infallible");
    Ok(HeaderValue::CSeq(n, method))
}

fn parse_date(raw: &str) -> Result<HeaderValue> {
    let naive = chrono::NaiveDateTime::parse_from_str(raw.trim(), "%a, %d %b %Y %H:%M:%S GMT")
        .map_err(|_| Error::parse(ParseErrorKind::InvalidDate))?;
    Ok(HeaderValue::Date(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc)))
}

fn parse_mime_version(raw: &str) -> Result<HeaderValue> {
    let raw = raw.trim();
    let (maj, min) = raw.split_once('.').ok_or_else(|| Error::parse(ParseErrorKind::MissingMajor))?;
    let maj: u32 = maj.parse().map_err(|_| Error::parse(ParseErrorKind::MissingMajor))?;
    let min: u32 = min.parse().map_err(|_| Error::parse(ParseErrorKind::InvalidMinor))?;
    Ok(HeaderValue::MimeVersion(maj, min))
}

fn parse_retry_after(raw: &str) -> Result<HeaderValue> {
    let (prefix, params) = split_params(raw);
    let prefix = prefix.trim();
    let (num_part, comment_part) = match prefix.find('(') {
        Some(idx) => (prefix[..idx].trim(), prefix[idx..].trim()),
        None => (prefix, ""),
    };
    let secs: u64 = num_part.parse().map_err(|_| Error::parse(ParseErrorKind::MissingDeltaSecs))?;
    let comment = comment_part
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(comment_part)
        .to_string();
    Ok(HeaderValue::RetryAfter(secs, comment, params))
}

fn parse_timestamp(raw: &str) -> Result<HeaderValue> {
    let raw = raw.trim();
    let mut it = raw.split_whitespace();
    let t: f64 = it
        .next()
        .ok_or_else(|| Error::parse(ParseErrorKind::InvalidTimestamp))?
        .parse()
        .map_err(|_| Error::parse(ParseErrorKind::InvalidTimestamp))?;
    let delay: f64 = match it.next() {
        Some(d) => d.parse().map_err(|_| Error::parse(ParseErrorKind::InvalidTimestamp))?,
        None => 0.0,
    };
    Ok(HeaderValue::Timestamp(t, delay))
}

fn parse_warning_entry(segment: &str) -> Result<WarningEntry> {
    let segment = segment.trim();
    let mut it = segment.splitn(2, char::is_whitespace);
    let code_str = it.next().ok_or_else(|| Error::parse(ParseErrorKind::InvalidCode))?;
    let code: u16 = code_str.parse().map_err(|_| Error::parse(ParseErrorKind::InvalidCode))?;
    let rest = it.next().ok_or_else(|| Error::parse(ParseErrorKind::EmptyWarnAgent))?.trim();
    let mut it2 = rest.splitn(2, char::is_whitespace);
    let agent = it2.next().filter(|s| !s.is_empty()).ok_or_else(|| Error::parse(ParseErrorKind::EmptyWarnAgent))?;
    let text_part = it2.next().ok_or_else(|| Error::parse(ParseErrorKind::MissingWarnText))?.trim();
    if !text_part.starts_with('"') {
        return Err(Error::parse(ParseErrorKind::InvalidWarnText));
    }
    let (text, _) =
        quoted_string(text_part.as_bytes()).map_err(|_| Error::parse(ParseErrorKind::InvalidWarnText))?;
    Ok(WarningEntry { code, agent: agent.to_string(), text })
}

fn parse_warnings(raw: &str) -> Result<HeaderValue> {
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        out.push(parse_warning_entry(&seg)?);
    }
    Ok(HeaderValue::MultipleWarnings(out))
}

/// Reads one whitespace-delimited field starting at `i`, honouring RFC
/// 3261's tolerance for LWS around the `/` separators in `SIP/2.0/UDP`.
fn scan_via_field<'a>(s: &'a str, i: &mut usize) -> &'a str {
    let bytes = s.as_bytes();
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'/' {
        *i += 1;
    }
    &s[start..*i]
}

fn skip_via_slash(s: &str, i: &mut usize) -> Result<()> {
    let bytes = s.as_bytes();
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
    if bytes.get(*i) != Some(&b'/') {
        return Err(Error::parse(ParseErrorKind::UnknownVersion));
    }
    *i += 1;
    Ok(())
}

fn parse_via_entry(segment: &str) -> Result<ViaEntry> {
    let segment = segment.trim();
    let mut i = 0usize;
    let _sip_tag = scan_via_field(segment, &mut i);
    skip_via_slash(segment, &mut i)?;
    let version_str = scan_via_field(segment, &mut i);
    skip_via_slash(segment, &mut i)?;
    let protocol = scan_via_field(segment, &mut i).to_string();
    if protocol.is_empty() {
        return Err(Error::parse(ParseErrorKind::UnknownVersion));
    }
    while i < segment.len() && segment.as_bytes()[i].is_ascii_whitespace() {
        i += 1;
    }
    let rest = &segment[i..];
    if rest.is_empty() {
        return Err(Error::parse(ParseErrorKind::MissingSentBy));
    }

    let (maj, min) = version_str
        .split_once('.')
        .map(|(a, b)| (a.parse::<u8>(), b.parse::<u8>()))
        .ok_or_else(|| Error::parse(ParseErrorKind::UnknownVersion))?;
    let maj = maj.map_err(|_| Error::parse(ParseErrorKind::UnknownVersion))?;
    let min = min.map_err(|_| Error::parse(ParseErrorKind::UnknownVersion))?;

    let (sent_by, params) = split_params(rest);
    let (host, port) = crate::tokenizer::split_host_port(sent_by)?;

    Ok(ViaEntry { version: (maj, min), protocol, sent_by_host: host, sent_by_port: port, params })
}

fn parse_vias(raw: &str) -> Result<HeaderValue> {
    let mut out = Vec::new();
    for seg in split_top_level(raw, ',') {
        if seg.is_empty() {
            continue;
        }
        out.push(parse_via_entry(&seg)?);
    }
    if out.is_empty() {
        return Err(Error::parse(ParseErrorKind::MissingSentBy));
    }
    Ok(HeaderValue::MultipleVias(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_via() {
        let v = dispatch(&HeaderName::Via, "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds").unwrap();
        match v {
            HeaderValue::MultipleVias(vias) => {
                assert_eq!(vias.len(), 1);
                assert_eq!(vias[0].sent_by_host, "pc33.atlanta.com");
                assert_eq!(vias[0].branch(), Some("z9hG4bK776asdhds"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_three_joined_vias() {
        let raw = "SIP/2.0/UDP first.example.com, SIP/2.0/UDP second.example.com, SIP/2.0/UDP third.example.com";
        let v = dispatch(&HeaderName::Via, raw).unwrap();
        match v {
            HeaderValue::MultipleVias(vias) => assert_eq!(vias.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_from_with_tag() {
        let v = dispatch(&HeaderName::From, "\"Alice\" <sip:alice@atlanta.com>;tag=1928301774").unwrap();
        match v {
            HeaderValue::SingleContactParams(name, uri, params) => {
                assert_eq!(name.as_deref(), Some("Alice"));
                assert_eq!(uri.host, "atlanta.com");
                assert_eq!(params.get("tag"), Some(Some("1928301774")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_digest_challenge() {
        let raw = r#"Digest realm="biloxi.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", qop="auth", algorithm=MD5, opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let v = dispatch(&HeaderName::WwwAuthenticate, raw).unwrap();
        match v {
            HeaderValue::SchemeAndAuthParams(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].0, "Digest");
                assert_eq!(groups[0].1.get("realm"), Some(Some("biloxi.com")));
                assert_eq!(groups[0].1.get("algorithm"), Some(Some("MD5")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_contact_star() {
        let v = dispatch(&HeaderName::Contact, "*").unwrap();
        assert!(matches!(v, HeaderValue::StarOrMultipleContactParams(ContactList::Star)));
    }

    #[test]
    fn parses_retry_after_with_comment_and_params() {
        let v = dispatch(&HeaderName::RetryAfter, "18000;duration=3600").unwrap();
        match v {
            HeaderValue::RetryAfter(secs, comment, params) => {
                assert_eq!(secs, 18000);
                assert!(comment.is_empty());
                assert_eq!(params.get("duration"), Some(Some("3600")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_warning_entry() {
        let v = dispatch(&HeaderName::Warning, r#"370 devnull.example.com "Insufficient bandwidth""#).unwrap();
        match v {
            HeaderValue::MultipleWarnings(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].code, 370);
                assert_eq!(list[0].text, "Insufficient bandwidth");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_cseq() {
        let v = dispatch(&HeaderName::CSeq, "314159 INVITE").unwrap();
        assert_eq!(v, HeaderValue::CSeq(314159, Method::Invite));
    }
}
