//! Router / registry (spec §4.8, component C8): a per-stack table keyed by
//! transaction identity, deciding whether an inbound message belongs to an
//! existing transaction, starts a new one, or escalates straight to the
//! core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sipmw_sip_core::txnkey::{
    client_key_for_request, client_key_for_response, server_key_for_request, server_key_for_response, ClientKey,
    ServerKey,
};
use sipmw_sip_core::types::header_name::HeaderName;
use sipmw_sip_core::types::message::StartLine;
use sipmw_sip_core::{Message, Method};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{InviteClientLogic, NonInviteClientLogic};
use crate::error::{Error, Result};
use crate::server::{InviteServerLogic, NonInviteServerLogic};
use crate::timer::TimerConfig;
use crate::transaction::logic::TransactionLogic;
use crate::transaction::runner::spawn_transaction;
use crate::transaction::{InternalTransactionCommand, TransactionEvent, TransactionKey, TransactionKind, TransactionState};
use crate::transport::{Protocol, Transport};

pub const MAGIC_COOKIE: &str = "z9hG4bK";

/// The Transaction User contract the embedder implements (spec §6 "Core
/// contract").
#[async_trait]
pub trait Core: Send + Sync {
    /// A request reaching the core directly: either an out-of-transaction
    /// ACK (`server_key` is `None`) or the first delivery from a freshly
    /// started server transaction.
    async fn receive_request(&self, request: Message, server_key: Option<ServerKey>);

    /// A response reaching the core directly: a stray retransmission with
    /// no owning client transaction (`client_key` is `None`).
    async fn receive_response(&self, response: Message, client_key: Option<ClientKey>);

    /// A transaction timed out, went idle, or its transport failed.
    async fn receive_error(&self, reason: String, key: Option<TransactionKey>);
}

fn protocol_from_tag(tag: &str) -> Option<Protocol> {
    match tag.to_ascii_uppercase().as_str() {
        "UDP" => Some(Protocol::Udp),
        "TCP" => Some(Protocol::Tcp),
        "TLS" => Some(Protocol::Tls),
        "SCTP" => Some(Protocol::Sctp),
        "DTLS" => Some(Protocol::Dtls),
        "WS" => Some(Protocol::Ws),
        "WSS" => Some(Protocol::Wss),
        "AMQP" => Some(Protocol::Amqp),
        "DCCP" => Some(Protocol::Dccp),
        "STOMP" => Some(Protocol::Stomp),
        _ => None,
    }
}

/// Where to send `msg` and over which registered protocol (spec §4.8
/// "Destination selection").
fn select_destination(msg: &Message) -> Result<(Protocol, String, u16)> {
    if let Some(target) = &msg.target {
        let protocol = protocol_from_tag(&target.protocol)
            .ok_or_else(|| Error::Other(format!("unknown target protocol {}", target.protocol)))?;
        return Ok((protocol, target.host.clone(), target.port));
    }

    match &msg.start_line {
        StartLine::Status(_) => {
            let via = msg
                .headers
                .topmost_via()
                .ok_or_else(|| Error::Other("response carries no Via to route on".to_string()))?;
            let protocol = protocol_from_tag(&via.protocol)
                .ok_or_else(|| Error::Other(format!("unknown Via protocol {}", via.protocol)))?;
            let host = via.received().map(str::to_string).unwrap_or_else(|| via.sent_by_host.clone());
            let port = via
                .params
                .get("rport")
                .flatten()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or_else(|| via.effective_port());
            Ok((protocol, host, port))
        }
        StartLine::Request(r) => {
            let uri = &r.request_uri;
            let protocol = uri
                .transport()
                .and_then(protocol_from_tag)
                .or_else(|| msg.headers.topmost_via().and_then(|v| protocol_from_tag(&v.protocol)))
                .unwrap_or(Protocol::Udp);
            Ok((protocol, uri.host.clone(), uri.effective_port()))
        }
    }
}

/// Deterministic branch for a stateless ACK to a non-2xx, so its
/// retransmissions are stable (spec §4.8 "Stateless ACK branch derivation").
pub fn derive_stateless_ack_branch(hmac_key: &[u8], original_request: &Message) -> Result<String> {
    type HmacRipemd160 = Hmac<Ripemd160>;

    let via = original_request
        .headers
        .topmost_via()
        .ok_or_else(|| Error::Other("request carries no Via to derive an ACK branch from".to_string()))?;
    let old_branch = via.branch().unwrap_or_default();

    let input = if old_branch.starts_with(MAGIC_COOKIE) {
        old_branch.to_string()
    } else {
        let request_uri = original_request
            .request_line()
            .ok_or_else(|| Error::Other("ACK branch derivation needs a request".to_string()))?
            .request_uri
            .to_string();
        let call_id = original_request.headers.fetch(&HeaderName::CallId).map(|v| v.to_string()).unwrap_or_default();
        let from_tag = original_request
            .headers
            .fetch(&HeaderName::From)
            .and_then(|v| match v {
                sipmw_sip_core::HeaderValue::SingleContactParams(_, _, params) => params.get("tag").flatten(),
                _ => None,
            })
            .unwrap_or_default();
        let to_tag = original_request
            .headers
            .fetch(&HeaderName::To)
            .and_then(|v| match v {
                sipmw_sip_core::HeaderValue::SingleContactParams(_, _, params) => params.get("tag").flatten(),
                _ => None,
            })
            .unwrap_or_default();
        let cseq_number = match original_request.headers.fetch(&HeaderName::CSeq) {
            Some(sipmw_sip_core::HeaderValue::CSeq(n, _)) => n.to_string(),
            _ => String::new(),
        };
        format!(
            "{request_uri}|{}|{}|{}|{call_id}|{from_tag}|{to_tag}|{cseq_number}|branch={old_branch}",
            via.protocol, via.sent_by_host, via.effective_port()
        )
    };

    let mut mac = HmacRipemd160::new_from_slice(hmac_key).map_err(|e| Error::Other(e.to_string()))?;
    mac.update(input.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(format!("{MAGIC_COOKIE}{}", base64_url_no_pad(&digest)))
}

fn base64_url_no_pad(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The per-stack registry: which transaction, if any, owns each key, and
/// which transport handles each registered protocol.
pub struct Registry {
    transports: Mutex<HashMap<Protocol, Arc<dyn Transport>>>,
    client_transactions: Mutex<HashMap<ClientKey, mpsc::Sender<InternalTransactionCommand>>>,
    server_transactions: Mutex<HashMap<ServerKey, mpsc::Sender<InternalTransactionCommand>>>,
    core: Arc<dyn Core>,
    config: TimerConfig,
    tu_tx: mpsc::Sender<TransactionEvent>,
}

impl Registry {
    pub fn new(core: Arc<dyn Core>, config: TimerConfig) -> Arc<Self> {
        let (tu_tx, tu_rx) = mpsc::channel(256);
        let registry = Arc::new(Registry {
            transports: Mutex::new(HashMap::new()),
            client_transactions: Mutex::new(HashMap::new()),
            server_transactions: Mutex::new(HashMap::new()),
            core,
            config,
            tu_tx,
        });
        tokio::spawn(pump_transaction_events(Arc::clone(&registry), tu_rx));
        registry
    }

    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let protocol = transport.protocol();
        let mut guard = self.transports.lock().expect("transports mutex poisoned");
        if guard.contains_key(&protocol) {
            return Err(Error::AlreadyRegisteredTransport(protocol.to_string()));
        }
        guard.insert(protocol, transport);
        Ok(())
    }

    pub fn transport_for(&self, protocol: Protocol) -> Result<Arc<dyn Transport>> {
        self.transports
            .lock()
            .expect("transports mutex poisoned")
            .get(&protocol)
            .cloned()
            .ok_or_else(|| Error::UnregisteredTransport(protocol.to_string()))
    }

    pub fn reliable(&self, protocol: Protocol) -> Result<bool> {
        Ok(self.transport_for(protocol)?.reliable())
    }

    fn spawn_client(&self, key: ClientKey, kind: TransactionKind, request: Message, destination: (Protocol, String, u16)) -> Result<()> {
        let transport = self.transport_for(destination.0)?;
        let logic: Arc<dyn TransactionLogic> = match kind {
            TransactionKind::InviteClient => Arc::new(InviteClientLogic),
            TransactionKind::NonInviteClient => Arc::new(NonInviteClientLogic),
            _ => unreachable!("spawn_client only spawns client-side kinds"),
        };
        let start_state = match kind {
            TransactionKind::InviteClient => TransactionState::Calling,
            TransactionKind::NonInviteClient => TransactionState::Trying,
            _ => unreachable!(),
        };
        let sender = spawn_transaction(
            TransactionKey::Client(key.clone()),
            kind,
            request,
            transport,
            (destination.1, destination.2),
            self.config,
            start_state,
            logic,
            self.tu_tx.clone(),
        );
        self.client_transactions.lock().expect("client transactions mutex poisoned").insert(key, sender);
        Ok(())
    }

    fn spawn_server(&self, key: ServerKey, kind: TransactionKind, request: Message, destination: (Protocol, String, u16)) -> Result<()> {
        let transport = self.transport_for(destination.0)?;
        let logic: Arc<dyn TransactionLogic> = match kind {
            TransactionKind::InviteServer => Arc::new(InviteServerLogic),
            TransactionKind::NonInviteServer => Arc::new(NonInviteServerLogic),
            _ => unreachable!("spawn_server only spawns server-side kinds"),
        };
        let start_state = match kind {
            TransactionKind::InviteServer => TransactionState::Proceeding,
            TransactionKind::NonInviteServer => TransactionState::Trying,
            _ => unreachable!(),
        };
        let sender = spawn_transaction(
            TransactionKey::Server(key.clone()),
            kind,
            request,
            transport,
            (destination.1, destination.2),
            self.config,
            start_state,
            logic,
            self.tu_tx.clone(),
        );
        self.server_transactions.lock().expect("server transactions mutex poisoned").insert(key, sender);
        Ok(())
    }

    /// Ingress for a request (spec §4.8 "Ingress for a request R").
    pub async fn ingress_request(&self, request: Message, peer: (Protocol, String, u16)) -> Result<()> {
        let key = server_key_for_request(&request)?;
        let existing = self.server_transactions.lock().expect("server transactions mutex poisoned").get(&key).cloned();
        if let Some(sender) = existing {
            let _ = sender.send(InternalTransactionCommand::ProcessMessage(request)).await;
            return Ok(());
        }

        if request.method() == Some(&Method::Ack) {
            self.core.receive_request(request, None).await;
            return Ok(());
        }

        let kind =
            if request.method() == Some(&Method::Invite) { TransactionKind::InviteServer } else { TransactionKind::NonInviteServer };
        if self.server_transactions.lock().expect("server transactions mutex poisoned").contains_key(&key) {
            return Err(Error::AlreadyStarted(key.to_string()));
        }
        self.spawn_server(key, kind, request, peer)
    }

    /// Ingress for a response (spec §4.8 "Ingress for a response S").
    pub async fn ingress_response(&self, response: Message) -> Result<()> {
        let key = client_key_for_response(&response)?;
        let existing = self.client_transactions.lock().expect("client transactions mutex poisoned").get(&key).cloned();
        match existing {
            Some(sender) => {
                let _ = sender.send(InternalTransactionCommand::ProcessMessage(response)).await;
            }
            None => self.core.receive_response(response, None).await,
        }
        Ok(())
    }

    /// Egress for an outgoing request (spec §4.8 "Egress for an outgoing request").
    pub async fn egress_request(&self, request: Message) -> Result<()> {
        let destination = select_destination(&request)?;
        if request.method() == Some(&Method::Ack) {
            let transport = self.transport_for(destination.0)?;
            transport.send(&request, &destination.1, destination.2).await.map_err(|e| Error::Transport(e.to_string()))?;
            return Ok(());
        }
        let key = client_key_for_request(&request)?;
        if self.client_transactions.lock().expect("client transactions mutex poisoned").contains_key(&key) {
            return Err(Error::AlreadyStarted(key.to_string()));
        }
        let kind =
            if request.method() == Some(&Method::Invite) { TransactionKind::InviteClient } else { TransactionKind::NonInviteClient };
        self.spawn_client(key, kind, request, destination)
    }

    /// Egress for an outgoing response (spec §4.8 "Egress for an outgoing response").
    pub async fn egress_response(&self, response: Message) -> Result<()> {
        let key = server_key_for_response(&response)?;
        let sender = self
            .server_transactions
            .lock()
            .expect("server transactions mutex poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NoTransaction(key.to_string()))?;
        let _ = sender.send(InternalTransactionCommand::SendResponse(response)).await;
        Ok(())
    }

    pub async fn terminate(&self, key: &TransactionKey) {
        let sender = match key {
            TransactionKey::Client(k) => self.client_transactions.lock().expect("client transactions mutex poisoned").get(k).cloned(),
            TransactionKey::Server(k) => self.server_transactions.lock().expect("server transactions mutex poisoned").get(k).cloned(),
        };
        if let Some(sender) = sender {
            let _ = sender.send(InternalTransactionCommand::Terminate).await;
        }
    }
}

async fn pump_transaction_events(registry: Arc<Registry>, mut tu_rx: mpsc::Receiver<TransactionEvent>) {
    while let Some(event) = tu_rx.recv().await {
        match event {
            TransactionEvent::IncomingRequest { transaction_id, message } => {
                let server_key = match &transaction_id {
                    TransactionKey::Server(k) => Some(k.clone()),
                    TransactionKey::Client(_) => None,
                };
                registry.core.receive_request(message, server_key).await;
            }
            TransactionEvent::IncomingResponse { transaction_id, message } => {
                let client_key = match &transaction_id {
                    TransactionKey::Client(k) => Some(k.clone()),
                    TransactionKey::Server(_) => None,
                };
                registry.core.receive_response(message, client_key).await;
            }
            TransactionEvent::Error { transaction_id, error } => {
                registry.core.receive_error(error, transaction_id).await;
            }
            TransactionEvent::TransportError { transaction_id } => {
                registry.core.receive_error("transport failure".to_string(), Some(transaction_id)).await;
            }
            TransactionEvent::StateChanged { transaction_id, previous_state, new_state } => {
                debug!(%transaction_id, ?previous_state, ?new_state, "transaction state changed");
            }
            TransactionEvent::TransactionTerminated { transaction_id } => {
                match &transaction_id {
                    TransactionKey::Client(k) => {
                        registry.client_transactions.lock().expect("client transactions mutex poisoned").remove(k);
                    }
                    TransactionKey::Server(k) => {
                        registry.server_transactions.lock().expect("server transactions mutex poisoned").remove(k);
                    }
                }
                debug!(%transaction_id, "transaction deregistered");
            }
        }
    }
    warn!("transaction event pump exited: sender side dropped");
}
