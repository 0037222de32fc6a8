//! Transaction-key derivation (spec §4.6, component C6): the identities the
//! router and transaction state machines use to find a message's owning
//! transaction.

use std::fmt;

use crate::error::{Error, Result};
use crate::method::Method;
use crate::types::header_name::HeaderName;
use crate::types::header_value::HeaderValue;
use crate::types::message::{Message, StartLine};

/// Canonicalise `method` the way transaction keys require: an ACK matches
/// the INVITE it acknowledges, so it is folded to `Invite` for key purposes
/// only (never for dispatch or CSeq checks elsewhere).
fn canonicalise(method: &Method) -> Method {
    match method {
        Method::Ack => Method::Invite,
        other => other.clone(),
    }
}

fn method_fold(method: &Method) -> String {
    canonicalise(method).as_str().to_ascii_uppercase()
}

/// `(branch, method)`, identifying a client transaction. Method is
/// canonicalised (ACK -> INVITE) and folded case-insensitively for hashing
/// and equality.
#[derive(Debug, Clone)]
pub struct ClientKey {
    branch: String,
    method: String,
}

impl ClientKey {
    fn new(branch: impl Into<String>, method: &Method) -> Self {
        ClientKey { branch: branch.into(), method: method_fold(method) }
    }
}

impl PartialEq for ClientKey {
    fn eq(&self, other: &Self) -> bool {
        self.branch == other.branch && self.method == other.method
    }
}
impl Eq for ClientKey {}

impl std::hash::Hash for ClientKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.branch.hash(state);
        self.method.hash(state);
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.method)
    }
}

/// `(branch, method, sent_by)`, identifying a server transaction. `sent_by`
/// is the topmost Via's `(host, port)` taken verbatim, not normalised.
#[derive(Debug, Clone)]
pub struct ServerKey {
    branch: String,
    method: String,
    sent_by: (String, u16),
}

impl ServerKey {
    fn new(branch: impl Into<String>, method: &Method, sent_by: (String, u16)) -> Self {
        ServerKey { branch: branch.into(), method: method_fold(method), sent_by }
    }
}

impl PartialEq for ServerKey {
    fn eq(&self, other: &Self) -> bool {
        self.branch == other.branch && self.method == other.method && self.sent_by == other.sent_by
    }
}
impl Eq for ServerKey {}

impl std::hash::Hash for ServerKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.branch.hash(state);
        self.method.hash(state);
        self.sent_by.hash(state);
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}", self.branch, self.method, self.sent_by.0, self.sent_by.1)
    }
}

fn topmost_branch(msg: &Message) -> Result<&str> {
    msg.headers
        .topmost_via()
        .and_then(|v| v.branch())
        .ok_or_else(|| Error::Validation("no Via branch to key on".to_string()))
}

fn cseq_method(msg: &Message) -> Result<Method> {
    match msg.headers.fetch(&HeaderName::CSeq) {
        Some(HeaderValue::CSeq(_, m)) => Ok(m.clone()),
        _ => Err(Error::Validation("CSeq header did not parse as CSeq".to_string())),
    }
}

/// Client key from an outgoing request, keyed on the request's own method
/// and its topmost Via's branch.
pub fn client_key_for_request(msg: &Message) -> Result<ClientKey> {
    let branch = topmost_branch(msg)?;
    let method = match &msg.start_line {
        StartLine::Request(r) => &r.method,
        StartLine::Status(_) => return Err(Error::Validation("not a request".to_string())),
    };
    Ok(ClientKey::new(branch, method))
}

/// Client key from an incoming response, keyed on its `CSeq` method and its
/// topmost Via's branch (spec §4.6).
pub fn client_key_for_response(msg: &Message) -> Result<ClientKey> {
    let branch = topmost_branch(msg)?;
    let method = cseq_method(msg)?;
    Ok(ClientKey::new(branch, &method))
}

/// Server key from an incoming request: branch, method, and `sent_by` taken
/// verbatim from the topmost Via.
pub fn server_key_for_request(msg: &Message) -> Result<ServerKey> {
    let via = msg
        .headers
        .topmost_via()
        .ok_or_else(|| Error::Validation("no Via header to key on".to_string()))?;
    let branch = via.branch().ok_or_else(|| Error::Validation("no Via branch to key on".to_string()))?;
    let method = match &msg.start_line {
        StartLine::Request(r) => &r.method,
        StartLine::Status(_) => return Err(Error::Validation("not a request".to_string())),
    };
    Ok(ServerKey::new(branch, method, via.sent_by()))
}

/// Server key from an outgoing response, keyed the same way as the request
/// it answers: branch and `sent_by` from its own topmost Via, method from
/// `CSeq`.
pub fn server_key_for_response(msg: &Message) -> Result<ServerKey> {
    let via = msg
        .headers
        .topmost_via()
        .ok_or_else(|| Error::Validation("no Via header to key on".to_string()))?;
    let branch = via.branch().ok_or_else(|| Error::Validation("no Via branch to key on".to_string()))?;
    let method = cseq_method(msg)?;
    Ok(ServerKey::new(branch, &method, via.sent_by()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_message;

    fn invite() -> Message {
        parse_message(
            b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n",
        )
        .unwrap()
    }

    fn ack() -> Message {
        parse_message(
            b"ACK sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>;tag=8675309\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 ACK\r\n\
Content-Length: 0\r\n\
\r\n",
        )
        .unwrap()
    }

    #[test]
    fn ack_and_invite_share_the_same_server_key() {
        let invite_key = server_key_for_request(&invite()).unwrap();
        let ack_key = server_key_for_request(&ack()).unwrap();
        assert_eq!(invite_key, ack_key);
    }

    #[test]
    fn server_key_display_is_branch_method_sentby() {
        let key = server_key_for_request(&invite()).unwrap();
        assert_eq!(key.to_string(), "z9hG4bK776asdhds/INVITE/pc33.atlanta.com:5060");
    }

    #[test]
    fn differing_branch_yields_a_different_key() {
        let a = client_key_for_request(&invite()).unwrap();
        let mut other = invite();
        other.headers.update_front(&HeaderName::Via, |v| {
            let HeaderValue::MultipleVias(vias) = v else { return v.clone() };
            let mut vias = vias.clone();
            vias[0].params.set("branch", Some("z9hG4bKdifferent".to_string()));
            HeaderValue::MultipleVias(vias)
        });
        let b = client_key_for_request(&other).unwrap();
        assert_ne!(a, b);
    }
}
