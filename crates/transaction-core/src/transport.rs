//! The transport contract (spec §6 External Interfaces): the boundary
//! between the transaction layer and whatever moves bytes on the wire.
//!
//! A transport implementation owns exactly one `(protocol_tag, reliable?)`
//! pair within a stack (spec §4.9 `register_transport`). It is handed
//! outgoing messages to send and, independently, feeds `receive_raw` bytes
//! back into the stack as they arrive off the wire; this crate only
//! specifies the send half.

use async_trait::async_trait;
use sipmw_sip_core::Message;

use crate::error::Result;

/// One of the protocol tags named in spec §6; default ports per scheme are
/// carried on [`Uri`](sipmw_sip_core::Uri), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
    Tls,
    Sctp,
    Dtls,
    Ws,
    Wss,
    Amqp,
    Dccp,
    Stomp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Tls => "TLS",
            Protocol::Sctp => "SCTP",
            Protocol::Dtls => "DTLS",
            Protocol::Ws => "WS",
            Protocol::Wss => "WSS",
            Protocol::Amqp => "AMQP",
            Protocol::Dccp => "DCCP",
            Protocol::Stomp => "STOMP",
        }
    }

    /// Stream-oriented, in-order, loss-free delivery: retransmission
    /// timers are unnecessary (spec glossary "Reliable transport").
    pub fn is_reliable(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Tls | Protocol::Sctp | Protocol::Ws | Protocol::Wss)
    }

    /// Default port per spec §6: UDP/TCP/WS -> 5060, TLS/WSS -> 5061, else 0.
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Udp | Protocol::Tcp | Protocol::Ws => 5060,
            Protocol::Tls | Protocol::Wss => 5061,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transport implementation's send half: every transaction actor holds a
/// `Arc<dyn Transport>` and calls `send` rather than touching sockets
/// directly (spec §5 "Blocking I/O does not belong in transaction code").
#[async_trait]
pub trait Transport: Send + Sync {
    /// The protocol this instance was registered under.
    fn protocol(&self) -> Protocol;

    /// Whether this instance's delivery model makes retransmission timers
    /// unnecessary.
    fn reliable(&self) -> bool {
        self.protocol().is_reliable()
    }

    /// Send `message` to `(host, port)`. Fire-and-forget for datagram
    /// transports; delegated to the stream connection for stream ones. A
    /// failure here is reported back to the originating transaction as a
    /// `TransportError` command, not returned synchronously to arbitrary
    /// callers (spec §6 "on network I/O failure, calls
    /// receive_transport_error").
    async fn send(&self, message: &Message, host: &str, port: u16) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_protocols_are_reliable() {
        assert!(Protocol::Tcp.is_reliable());
        assert!(Protocol::Tls.is_reliable());
        assert!(!Protocol::Udp.is_reliable());
    }

    #[test]
    fn default_ports_follow_scheme_conventions() {
        assert_eq!(Protocol::Udp.default_port(), 5060);
        assert_eq!(Protocol::Tls.default_port(), 5061);
        assert_eq!(Protocol::Sctp.default_port(), 0);
    }
}
