//! Stack façade (spec §4.9, component C9): the single entry point an
//! embedder talks to — name a stack, register its transports and core, then
//! drive it with `send`/`receive_raw`/`terminate`.

use std::sync::Arc;

use sipmw_sip_core::validate::{rewrite_via_for_peer, validate, validate_transport, PeerAddr, TransportKind};
use sipmw_sip_core::{parse_message, Message};

use crate::error::{Error, Result};
use crate::router::{Core, Registry};
use crate::timer::TimerConfig;
use crate::transaction::TransactionKey;
use crate::transport::{Protocol, Transport};

fn transport_kind_for(protocol: Protocol) -> TransportKind {
    match protocol {
        Protocol::Udp => TransportKind::Udp,
        Protocol::Tcp => TransportKind::Tcp,
        Protocol::Tls => TransportKind::Tls,
        Protocol::Ws => TransportKind::Ws,
        Protocol::Wss => TransportKind::Wss,
        // Non-wire-format protocols (SCTP, DTLS, AMQP, DCCP, STOMP) are
        // exempt from the Via-rewrite distinction; treat them like TCP.
        _ => TransportKind::Tcp,
    }
}

/// A named SIP stack: one registry, one core, any number of transports
/// (spec §4.9).
pub struct Stack {
    pub name: String,
    registry: Arc<Registry>,
}

impl Stack {
    /// `new(name, core)` (spec §4.9).
    pub fn new(name: impl Into<String>, core: Arc<dyn Core>, config: TimerConfig) -> Self {
        Stack { name: name.into(), registry: Registry::new(core, config) }
    }

    /// `register_transport(name, protocol, reliable?)`. The transport's own
    /// `reliable()` decides retransmission policy; `reliable?` here is the
    /// stack-facing query, not a registration input (spec §4.9 item 6).
    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.registry.register_transport(transport)
    }

    /// `send(name, message)`: dispatch a request, response, or ACK per §4.8.
    pub async fn send(&self, message: Message) -> Result<()> {
        if message.is_request() {
            self.registry.egress_request(message).await
        } else {
            self.registry.egress_response(message).await
        }
    }

    /// `terminate(name, key)`: force-stop a transaction.
    pub async fn terminate(&self, key: &TransactionKey) {
        self.registry.terminate(key).await;
    }

    /// `reliable?(name, message)`: look up the topmost-Via protocol's
    /// transport and report whether it needs retransmission timers.
    pub fn reliable(&self, message: &Message) -> Result<bool> {
        let via = message
            .headers
            .topmost_via()
            .ok_or_else(|| Error::Other("message carries no Via to look up a transport for".to_string()))?;
        let protocol = protocol_from_via_tag(&via.protocol)?;
        self.registry.reliable(protocol)
    }

    /// `receive_raw(name, bytes, (protocol, peer_ip, peer_port))`: normalise,
    /// parse, validate, rewrite Via, and route a datagram/stream chunk
    /// (spec §4.9 item 5).
    pub async fn receive_raw(&self, bytes: &[u8], protocol: Protocol, peer_ip: &str, peer_port: u16) -> Result<()> {
        let mut message = parse_message(bytes)?;
        validate(&message)?;
        validate_transport(&message, transport_kind_for(protocol))?;

        let peer = PeerAddr { protocol: transport_kind_for(protocol), ip: peer_ip, port: peer_port };
        rewrite_via_for_peer(&mut message, peer);

        if message.is_request() {
            self.registry.ingress_request(message, (protocol, peer_ip.to_string(), peer_port)).await
        } else {
            self.registry.ingress_response(message).await
        }
    }
}

fn protocol_from_via_tag(tag: &str) -> Result<Protocol> {
    match tag.to_ascii_uppercase().as_str() {
        "UDP" => Ok(Protocol::Udp),
        "TCP" => Ok(Protocol::Tcp),
        "TLS" => Ok(Protocol::Tls),
        "SCTP" => Ok(Protocol::Sctp),
        "DTLS" => Ok(Protocol::Dtls),
        "WS" => Ok(Protocol::Ws),
        "WSS" => Ok(Protocol::Wss),
        "AMQP" => Ok(Protocol::Amqp),
        "DCCP" => Ok(Protocol::Dccp),
        "STOMP" => Ok(Protocol::Stomp),
        other => Err(Error::Other(format!("unknown protocol tag {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sipmw_sip_core::txnkey::{ClientKey, ServerKey};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct RecordingTransport {
        sent: mpsc::UnboundedSender<Message>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn protocol(&self) -> Protocol {
            Protocol::Udp
        }

        async fn send(&self, message: &Message, _host: &str, _port: u16) -> Result<()> {
            let _ = self.sent.send(message.clone());
            Ok(())
        }
    }

    struct RecordingCore {
        requests: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Core for RecordingCore {
        async fn receive_request(&self, request: Message, _server_key: Option<ServerKey>) {
            self.requests.lock().expect("requests mutex poisoned").push(request);
        }
        async fn receive_response(&self, _response: Message, _client_key: Option<ClientKey>) {}
        async fn receive_error(&self, _reason: String, _key: Option<TransactionKey>) {}
    }

    #[tokio::test]
    async fn receive_raw_routes_a_well_formed_invite_to_the_core() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport { sent: tx });
        let core = Arc::new(RecordingCore { requests: Mutex::new(Vec::new()) });
        let stack = Stack::new("test", core.clone(), TimerConfig::default());
        stack.register_transport(transport).unwrap();

        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n";
        stack.receive_raw(raw, Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();
        // Invite Server spawns; its `enter(proceeding)` emits IncomingRequest
        // to the core asynchronously through the event pump task.
        for _ in 0..50 {
            if !core.requests.lock().expect("requests mutex poisoned").is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(core.requests.lock().expect("requests mutex poisoned").len(), 1);
    }

    #[tokio::test]
    async fn receive_raw_rejects_a_malformed_message() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport { sent: tx });
        let core = Arc::new(RecordingCore { requests: Mutex::new(Vec::new()) });
        let stack = Stack::new("test", core, TimerConfig::default());
        stack.register_transport(transport).unwrap();

        let raw = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=nope\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n";
        let result = stack.receive_raw(raw, Protocol::Udp, "pc33.atlanta.com", 5060).await;
        assert!(result.is_err());
    }
}
