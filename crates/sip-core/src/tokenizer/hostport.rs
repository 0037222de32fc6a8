//! `host[:port]` splitting, IPv6-bracket aware (used by Via sent-by and URI
//! authority parsing alike).

use crate::error::{Error, ParseErrorKind, Result};

/// Split `input` into `(host, port)`. A bracketed IPv6 literal's brackets
/// are stripped from the returned host.
pub fn split_host_port(input: &str) -> Result<(String, Option<u16>)> {
    if let Some(rest) = input.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| Error::parse(ParseErrorKind::InvalidSentBy))?;
        let host = rest[..close].to_string();
        let after = &rest[close + 1..];
        let port = match after.strip_prefix(':') {
            Some(p) if !p.is_empty() => Some(
                p.parse::<u16>()
                    .map_err(|_| Error::parse(ParseErrorKind::InvalidSentBy))?,
            ),
            Some(_) => return Err(Error::parse(ParseErrorKind::InvalidSentBy)),
            None => None,
        };
        return Ok((host, port));
    }

    match input.rsplit_once(':') {
        Some((host, port_str)) if !port_str.is_empty() && port_str.bytes().all(|b| b.is_ascii_digit()) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| Error::parse(ParseErrorKind::InvalidSentBy))?;
            Ok((host.to_string(), Some(port)))
        }
        _ => Ok((input.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_host_port() {
        assert_eq!(
            split_host_port("example.com:5060").unwrap(),
            ("example.com".to_string(), Some(5060))
        );
    }

    #[test]
    fn host_only_has_no_port() {
        assert_eq!(
            split_host_port("example.com").unwrap(),
            ("example.com".to_string(), None)
        );
    }

    #[test]
    fn strips_ipv6_brackets() {
        assert_eq!(
            split_host_port("[::1]:5060").unwrap(),
            ("::1".to_string(), Some(5060))
        );
        assert_eq!(
            split_host_port("[2001:db8::1]").unwrap(),
            ("2001:db8::1".to_string(), None)
        );
    }
}
