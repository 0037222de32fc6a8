//! nom combinators for `SIP-URI` / `SIPS-URI` (RFC 3261 §25.1).

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    multi::many0,
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{Error, ParseErrorKind};
use crate::params::Params;
use crate::tokenizer::percent_decode;

use super::{Scheme, Uri};

type ParseResult<'a, T> = IResult<&'a [u8], T>;

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

fn is_user_char(b: u8) -> bool {
    is_unreserved(b) || matches!(b, b'&' | b'=' | b'+' | b'$' | b',' | b';' | b'?' | b'/' | b'%')
}

fn is_param_char(b: u8) -> bool {
    is_unreserved(b) || matches!(b, b'[' | b']' | b'/' | b':' | b'&' | b'+' | b'$' | b'%')
}

fn is_host_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b':')
}

fn scheme(input: &[u8]) -> ParseResult<Scheme> {
    alt((
        nom::combinator::value(Scheme::Sips, tag_no_case(b"sips")),
        nom::combinator::value(Scheme::Sip, tag_no_case(b"sip")),
    ))(input)
}

fn userinfo(input: &[u8]) -> ParseResult<String> {
    map_res(
        nom::sequence::terminated(take_while1(is_user_char), char('@')),
        |bytes: &[u8]| -> Result<String, Error> {
            percent_decode(std::str::from_utf8(bytes).map_err(|_| Error::parse(ParseErrorKind::InvalidToken))?)
        },
    )(input)
}

fn bracketed_host(input: &[u8]) -> ParseResult<String> {
    nom::sequence::delimited(
        char('['),
        map_res(take_while1(|b| b != b']'), |b: &[u8]| {
            std::str::from_utf8(b).map(|s| s.to_string())
        }),
        char(']'),
    )(input)
}

fn plain_host(input: &[u8]) -> ParseResult<String> {
    map_res(take_while1(is_host_char), |b: &[u8]| {
        std::str::from_utf8(b).map(|s| s.to_string())
    })(input)
}

fn host(input: &[u8]) -> ParseResult<String> {
    alt((bracketed_host, plain_host))(input)
}

fn port(input: &[u8]) -> ParseResult<u16> {
    preceded(
        char(':'),
        map_res(digit1, |b: &[u8]| {
            std::str::from_utf8(b).unwrap().parse::<u16>()
        }),
    )(input)
}

fn one_param(input: &[u8]) -> ParseResult<(String, Option<String>)> {
    preceded(
        char(';'),
        pair(
            map_res(take_while1(is_param_char), |b: &[u8]| {
                percent_decode(std::str::from_utf8(b).unwrap())
            }),
            opt(preceded(
                char('='),
                map_res(take_while(is_param_char), |b: &[u8]| {
                    percent_decode(std::str::from_utf8(b).unwrap())
                }),
            )),
        ),
    )(input)
}

fn one_header(input: &[u8]) -> ParseResult<(String, Option<String>)> {
    pair(
        map_res(take_while1(is_param_char), |b: &[u8]| {
            percent_decode(std::str::from_utf8(b).unwrap())
        }),
        opt(preceded(
            char('='),
            map_res(take_while(is_param_char), |b: &[u8]| {
                percent_decode(std::str::from_utf8(b).unwrap())
            }),
        )),
    )(input)
}

fn headers(input: &[u8]) -> ParseResult<Params> {
    preceded(
        char('?'),
        nom::combinator::map(
            pair(one_header, many0(preceded(char('&'), one_header))),
            |((first_name, first_val), rest)| {
                let mut params = Params::new();
                params.set(first_name, first_val);
                for (n, v) in rest {
                    params.set(n, v);
                }
                params
            },
        ),
    )(input)
}

/// Parse a full `SIP-URI` / `SIPS-URI`, returning the remaining input.
pub fn parse_uri(input: &[u8]) -> Result<(&[u8], Uri), Error> {
    let (rest, sch) = scheme(input).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "uri-scheme"))?;
    let (rest, _) = char(':')(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "uri"))?;
    let (rest, ui) = opt(userinfo)(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "userinfo"))?;
    let (rest, h) = host(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "host"))?;
    let (rest, p) = opt(port)(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "port"))?;
    let (rest, params) = many0(one_param)(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "uri-params"))?;
    let (rest, hdrs) = opt(headers)(rest).map_err(|_| Error::parse_in(ParseErrorKind::InvalidToken, "uri-headers"))?;

    let mut parameters = Params::new();
    for (name, value) in params {
        parameters.set(name, value);
    }

    Ok((
        rest,
        Uri {
            scheme: sch,
            userinfo: ui,
            host: h,
            port: p,
            parameters,
            headers: hdrs.unwrap_or_default(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_uri() {
        let (rest, uri) = parse_uri(b"sip:example.com").unwrap();
        assert!(rest.is_empty());
        assert_eq!(uri.host, "example.com");
        assert_eq!(uri.userinfo, None);
    }

    #[test]
    fn parses_userinfo_port_and_params() {
        let (_, uri) = parse_uri(b"sip:alice@example.com:5061;transport=tcp;lr").unwrap();
        assert_eq!(uri.userinfo.as_deref(), Some("alice"));
        assert_eq!(uri.port, Some(5061));
        assert_eq!(uri.parameters.get("transport"), Some(Some("tcp")));
        assert_eq!(uri.parameters.get("lr"), Some(None));
    }

    #[test]
    fn parses_bracketed_ipv6_host() {
        let (_, uri) = parse_uri(b"sip:[2001:db8::1]:5060").unwrap();
        assert_eq!(uri.host, "2001:db8::1");
    }

    #[test]
    fn parses_headers_section() {
        let (_, uri) = parse_uri(b"sip:alice@example.com?subject=project%20x").unwrap();
        assert_eq!(uri.headers.get("subject"), Some(Some("project x")));
    }
}
