//! Concrete scenarios from spec §8: Invite Client happy path and timeout,
//! Invite Server auto-100, ACK out-of-transaction, and the §4.5 Via
//! rewrite, driven end-to-end through the [`Stack`] façade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sipmw_sip_core::parse_message;
use sipmw_sip_core::txnkey::{ClientKey, ServerKey};
use sipmw_sip_core::Message;
use sipmw_transaction_core::{Core, Protocol, Stack, TimerConfig, TransactionKey, Transport};

struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(RecordingTransport { sent: Mutex::new(Vec::new()) })
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent mutex poisoned").len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn send(&self, message: &Message, _host: &str, _port: u16) -> sipmw_transaction_core::Result<()> {
        self.sent.lock().expect("sent mutex poisoned").push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingCore {
    requests: Mutex<Vec<(Message, Option<ServerKey>)>>,
    responses: Mutex<Vec<(Message, Option<ClientKey>)>>,
    errors: Mutex<Vec<String>>,
}

#[async_trait]
impl Core for RecordingCore {
    async fn receive_request(&self, request: Message, server_key: Option<ServerKey>) {
        self.requests.lock().expect("requests mutex poisoned").push((request, server_key));
    }
    async fn receive_response(&self, response: Message, client_key: Option<ClientKey>) {
        self.responses.lock().expect("responses mutex poisoned").push((response, client_key));
    }
    async fn receive_error(&self, reason: String, _key: Option<TransactionKey>) {
        self.errors.lock().expect("errors mutex poisoned").push(reason);
    }
}

async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true within the deadline");
}

fn invite_request() -> Message {
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
    .expect("fixture invite parses")
}

fn response(status_line: &str) -> Vec<u8> {
    format!(
        "{status_line}\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds\r\n\
To: Bob <sip:bob@biloxi.com>;tag=8675309\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Length: 0\r\n\
\r\n"
    )
    .into_bytes()
}

#[tokio::test]
async fn invite_client_happy_path_sees_no_retransmissions() {
    let transport = RecordingTransport::new();
    let core = Arc::new(RecordingCore::default());
    let stack = Stack::new("happy-path", core.clone(), TimerConfig::default());
    stack.register_transport(transport.clone()).unwrap();

    stack.send(invite_request()).await.unwrap();
    wait_until(|| transport.sent_count() >= 1).await;

    stack.receive_raw(&response("SIP/2.0 180 Ringing"), Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();
    wait_until(|| core.responses.lock().expect("responses mutex poisoned").len() >= 1).await;

    stack.receive_raw(&response("SIP/2.0 200 OK"), Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();
    wait_until(|| core.responses.lock().expect("responses mutex poisoned").len() >= 2).await;

    let responses = core.responses.lock().expect("responses mutex poisoned");
    assert_eq!(responses[0].0.status_code(), Some(180));
    assert_eq!(responses[1].0.status_code(), Some(200));
    // Only the original INVITE was ever sent: no retransmissions, no ACK
    // (2xx ACKs are dialog-level, outside this layer).
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test]
async fn invite_client_times_out_against_a_black_hole() {
    let transport = RecordingTransport::new();
    let core = Arc::new(RecordingCore::default());
    let fast = TimerConfig::new(10, 40, 50);
    let stack = Stack::new("timeout", core.clone(), fast);
    stack.register_transport(transport.clone()).unwrap();

    let start = std::time::Instant::now();
    stack.send(invite_request()).await.unwrap();
    wait_until(|| !core.errors.lock().expect("errors mutex poisoned").is_empty()).await;
    let elapsed = start.elapsed();

    assert!(core.errors.lock().expect("errors mutex poisoned")[0].contains("timed out"));
    // Timer A doubles uncapped from T1=10ms (10/30/70/150/310/630ms), giving
    // exactly ceil(log2(64))=6 retransmissions before Timer B's independent
    // 64*T1=640ms deadline fires: the original INVITE plus 6 retransmits.
    assert_eq!(transport.sent_count(), 7, "expected the original INVITE plus 6 retransmissions");
    assert!(elapsed >= Duration::from_millis(630), "timer B fired before its last scheduled retransmit, got {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(900), "timer B fired far later than its 64*T1=640ms deadline, got {elapsed:?}");
}

#[tokio::test]
async fn invite_server_synthesises_a_100_trying_when_the_core_is_slow() {
    let transport = RecordingTransport::new();
    let core = Arc::new(RecordingCore::default());
    let stack = Stack::new("auto-100", core.clone(), TimerConfig::default());
    stack.register_transport(transport.clone()).unwrap();

    let raw = invite_request().to_bytes();
    stack.receive_raw(&raw, Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();

    // still_trying fires at 200ms; give it margin.
    wait_until(|| transport.sent_count() >= 1).await;
    assert_eq!(transport.sent.lock().expect("sent mutex poisoned")[0].status_code(), Some(100));

    // A retransmitted INVITE within idle re-emits the same 100.
    stack.receive_raw(&raw, Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();
    wait_until(|| transport.sent_count() >= 2).await;
    assert_eq!(transport.sent.lock().expect("sent mutex poisoned")[1].status_code(), Some(100));
}

#[tokio::test]
async fn a_stray_2xx_retransmission_reaches_the_core_with_no_transaction() {
    let transport = RecordingTransport::new();
    let core = Arc::new(RecordingCore::default());
    let stack = Stack::new("stray-2xx", core.clone(), TimerConfig::default());
    stack.register_transport(transport.clone()).unwrap();

    // No Invite Client was ever started for this branch/CSeq.
    stack.receive_raw(&response("SIP/2.0 200 OK"), Protocol::Udp, "pc33.atlanta.com", 5060).await.unwrap();
    wait_until(|| !core.responses.lock().expect("responses mutex poisoned").is_empty()).await;

    let responses = core.responses.lock().expect("responses mutex poisoned");
    assert_eq!(responses[0].0.status_code(), Some(200));
    assert!(responses[0].1.is_none(), "stray 2xx must carry client_key = nil");
}

#[tokio::test]
async fn via_is_rewritten_with_received_and_rport_for_a_mismatched_peer() {
    let transport = RecordingTransport::new();
    let core = Arc::new(RecordingCore::default());
    let stack = Stack::new("via-rewrite", core.clone(), TimerConfig::default());
    stack.register_transport(transport.clone()).unwrap();

    let raw = b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP client.example.com:5060;branch=z9hG4bKviarewrite\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: viarewrite@client.example.com\r\n\
CSeq: 1 OPTIONS\r\n\
Content-Length: 0\r\n\
\r\n";
    stack.receive_raw(raw, Protocol::Udp, "10.0.0.73", 12335).await.unwrap();
    wait_until(|| !core.requests.lock().expect("requests mutex poisoned").is_empty()).await;

    let requests = core.requests.lock().expect("requests mutex poisoned");
    let via = requests[0].0.headers.topmost_via().expect("request carries a Via");
    assert_eq!(via.received(), Some("10.0.0.73"));
    assert_eq!(via.params.get("rport").flatten(), Some("12335"));
    assert_eq!(via.sent_by_host, "client.example.com");
    assert_eq!(via.sent_by_port, Some(5060));
}
