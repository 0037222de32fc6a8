//! Message validator (spec §4.5, component C5): the gate every incoming
//! message passes through before it reaches the router.

use crate::error::{Error, Result};
use crate::method::Method;
use crate::types::header_name::HeaderName;
use crate::types::header_value::HeaderValue;
use crate::types::message::{Message, StartLine, Version};

const REQUIRED: &[HeaderName] = &[
    HeaderName::To,
    HeaderName::From,
    HeaderName::CSeq,
    HeaderName::CallId,
    HeaderName::MaxForwards,
    HeaderName::Via,
];

/// The transport a message arrived on, as reported by the transport layer
/// (spec §4.8 `receive_raw`). `Ws` transports are exempt from the §4.5
/// `received`/`rport` rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl TransportKind {
    fn tag(&self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls => "TLS",
            TransportKind::Ws => "WS",
            TransportKind::Wss => "WSS",
        }
    }

    fn rewrites_via(&self) -> bool {
        !matches!(self, TransportKind::Ws | TransportKind::Wss)
    }
}

/// Where a message arrived from, passed down from the transport's `receive_raw`.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr<'a> {
    pub protocol: TransportKind,
    pub ip: &'a str,
    pub port: u16,
}

fn require_header(msg: &Message, name: &HeaderName) -> Result<()> {
    if msg.headers.has_header(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!("missing required header: {name}")))
    }
}

fn cseq_parts(msg: &Message) -> Result<(u32, Method)> {
    match msg.headers.fetch(&HeaderName::CSeq) {
        Some(HeaderValue::CSeq(n, m)) => Ok((*n, m.clone())),
        _ => Err(Error::Validation("CSeq header did not parse as CSeq".to_string())),
    }
}

fn from_tag(msg: &Message) -> Option<&str> {
    match msg.headers.fetch(&HeaderName::From) {
        Some(HeaderValue::SingleContactParams(_, _, params)) => params.get("tag").flatten(),
        _ => None,
    }
}

/// Validate required headers, Via shape, Content-Length, From-tag and
/// CSeq/version consistency (spec §4.5 items 1-6). Does not perform the
/// `received`/`rport` rewrite; call [`rewrite_via_for_peer`] separately once
/// validation succeeds, for incoming requests.
pub fn validate(msg: &Message) -> Result<()> {
    for name in REQUIRED {
        require_header(msg, name)?;
    }

    let vias = match msg.headers.fetch(&HeaderName::Via) {
        Some(HeaderValue::MultipleVias(v)) => v,
        _ => return Err(Error::Validation("Via header did not parse as MultipleVias".to_string())),
    };
    for via in vias {
        if via.version != (2, 0) {
            return Err(Error::Validation(format!("unsupported Via version {:?}", via.version)));
        }
        match via.branch() {
            Some(b) if b.starts_with("z9hG4bK") => {}
            Some(_) => {
                return Err(Error::Validation("Via branch lacks the RFC 3261 magic cookie".to_string()));
            }
            None => return Err(Error::Validation("Via entry is missing a branch parameter".to_string())),
        }
    }

    let body_len = msg.body.len() as i64;
    match msg.headers.fetch(&HeaderName::ContentLength) {
        Some(HeaderValue::SingleInteger(n)) => {
            if *n != body_len {
                return Err(Error::Validation(format!(
                    "Content-Length {n} does not match body length {body_len}"
                )));
            }
        }
        _ => {
            if body_len != 0 {
                return Err(Error::Validation(
                    "body is non-empty but Content-Length is absent".to_string(),
                ));
            }
        }
    }

    match from_tag(msg) {
        Some(tag) if !tag.is_empty() => {}
        _ => return Err(Error::Validation("From header is missing a non-empty tag".to_string())),
    }

    match &msg.start_line {
        StartLine::Request(r) => {
            let (_, cseq_method) = cseq_parts(msg)?;
            if cseq_method != r.method {
                return Err(Error::Validation(format!(
                    "CSeq method {cseq_method} does not match request method {}",
                    r.method
                )));
            }
        }
        StartLine::Status(s) => {
            if s.version != Version::V2_0 {
                return Err(Error::Validation(format!("unsupported response version {}", s.version)));
            }
        }
    }

    Ok(())
}

/// Validate that the topmost Via's protocol matches the transport the
/// message actually arrived on (spec §4.5 item 2, last clause).
pub fn validate_transport(msg: &Message, transport: TransportKind) -> Result<()> {
    let via = msg
        .headers
        .topmost_via()
        .ok_or_else(|| Error::Validation("no Via header present".to_string()))?;
    if !via.protocol.eq_ignore_ascii_case(transport.tag()) {
        return Err(Error::Validation(format!(
            "topmost Via protocol {} does not match transport {}",
            via.protocol,
            transport.tag()
        )));
    }
    Ok(())
}

/// Rewrite the topmost Via of an incoming request with `received`/`rport`
/// per RFC 3581, when the peer's observed address differs from what the Via
/// line claims (spec §4.5 last paragraph). WS/WSS transports are exempt.
/// No-op for responses.
pub fn rewrite_via_for_peer(msg: &mut Message, peer: PeerAddr<'_>) {
    if !msg.is_request() || !peer.protocol.rewrites_via() {
        return;
    }
    msg.headers.update_front(&HeaderName::Via, |value| {
        let HeaderValue::MultipleVias(vias) = value else { return value.clone() };
        let mut vias = vias.clone();
        if let Some(top) = vias.first_mut() {
            if top.sent_by_host != peer.ip {
                top.params.set("received", Some(peer.ip.to_string()));
            }
            if top.sent_by_port.unwrap_or(top.effective_port()) != peer.port {
                top.params.set("rport", Some(peer.port.to_string()));
            }
        }
        HeaderValue::MultipleVias(vias)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_message;

    fn sample_invite() -> Message {
        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Contact: <sip:alice@pc33.atlanta.com>\r\n\
Content-Length: 0\r\n\
\r\n";
        parse_message(raw).unwrap()
    }

    #[test]
    fn accepts_a_well_formed_invite() {
        assert!(validate(&sample_invite()).is_ok());
    }

    #[test]
    fn rejects_a_via_branch_without_the_magic_cookie() {
        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n";
        let msg = parse_message(raw).unwrap();
        assert!(validate(&msg).is_err());
    }

    #[test]
    fn rejects_a_missing_from_tag() {
        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n";
        let msg = parse_message(raw).unwrap();
        assert!(validate(&msg).is_err());
    }

    #[test]
    fn rewrites_via_when_peer_address_differs() {
        let mut msg = sample_invite();
        rewrite_via_for_peer(
            &mut msg,
            PeerAddr { protocol: TransportKind::Udp, ip: "10.0.0.73", port: 12335 },
        );
        let via = msg.headers.topmost_via().unwrap();
        assert_eq!(via.received(), Some("10.0.0.73"));
        assert_eq!(via.params.get("rport").flatten(), Some("12335"));
        assert_eq!(via.sent_by_host, "pc33.atlanta.com");
    }

    #[test]
    fn ws_transport_is_exempt_from_via_rewrite() {
        let mut msg = sample_invite();
        rewrite_via_for_peer(
            &mut msg,
            PeerAddr { protocol: TransportKind::Ws, ip: "10.0.0.73", port: 12335 },
        );
        let via = msg.headers.topmost_via().unwrap();
        assert_eq!(via.received(), None);
    }
}
