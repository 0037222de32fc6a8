//! Shared transaction types: state, keys, the command/event vocabulary the
//! generic [`runner`] loop and the four per-kind [`logic`] implementations
//! share.
//!
//! ## RFC 3261 §17 context
//!
//! All four transaction machines (Invite/Non-Invite, Client/Server) are
//! built from the same three ingredients:
//! - a [`TransactionState`] the machine currently occupies,
//! - a handful of single-shot [`TimerName`]s armed and cancelled as states
//!   change, and
//! - a [`TransactionKey`] identifying which machine a given message belongs
//!   to.
//!
//! This module defines that shared vocabulary once; [`logic`] is the seam
//! where the four machines actually differ, and [`runner`] is the loop that
//! drives any of them uniformly. Splitting it this way means a bug fix to
//! retransmission bookkeeping, say, touches one machine's `logic` file and
//! never risks disturbing the loop the other three also depend on.

pub mod logic;
pub mod runner;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sipmw_sip_core::txnkey::{ClientKey, ServerKey};
use sipmw_sip_core::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result, TransactionErrorKind};
use crate::timer::TimerConfig;
use crate::transport::Transport;

/// Which of the four RFC 3261 §17 machines a transaction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    InviteClient,
    NonInviteClient,
    InviteServer,
    NonInviteServer,
}

/// The union of states across all four machines (spec §4.7.1-4); each kind
/// only ever occupies the subset its section names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Bootstrap sentinel before the first real `enter` action has run;
    /// never reachable once a transaction has started (the runner enters
    /// the actual starting state, `Calling`/`Trying`, as its very first
    /// transition so that state's `enter` action still fires).
    Created,
    Calling,
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A transaction's identity: either a client key `(branch, method)` or a
/// server key `(branch, method, sent_by)` (spec §4.6).
#[derive(Debug, Clone)]
pub enum TransactionKey {
    Client(ClientKey),
    Server(ServerKey),
}

impl From<ClientKey> for TransactionKey {
    fn from(k: ClientKey) -> Self {
        TransactionKey::Client(k)
    }
}

impl From<ServerKey> for TransactionKey {
    fn from(k: ServerKey) -> Self {
        TransactionKey::Server(k)
    }
}

impl std::fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKey::Client(k) => write!(f, "client:{k}"),
            TransactionKey::Server(k) => write!(f, "server:{k}"),
        }
    }
}

/// The single-shot timers named across RFC 3261 §17.1-17.2. A given
/// transaction kind only ever arms the subset relevant to it; firing one
/// against a state it wasn't armed for is a silent no-op in the owning
/// `logic` implementation rather than an error, since a timer can still be
/// in flight for a moment after the state that armed it has already moved
/// on (the runner races the timer task's own message against whatever
/// transition happens to land first).
///
/// Several pairs here are deliberately *independent* of each other even
/// though they watch the same state: A and B both fire against Invite
/// client `calling`, but A just retransmits on an uncapped doubling cadence
/// while B alone enforces the overall `64*T1` deadline — conflating the two
/// into one timer with an embedded deadline check changes either the
/// retransmission count or the deadline, never preserves both at once. The
/// same split applies to G/H in the Invite server's `completed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    /// Invite client retransmit (unreliable `calling`): fires at T1, then
    /// doubles unboundedly on every fire. Cut off by `B`, not by a deadline
    /// check of its own.
    A,
    /// Invite client overall deadline, `64*T1`, armed once on entering
    /// `calling` regardless of transport reliability.
    B,
    /// Invite client `completed` absorber.
    D,
    /// Non-Invite client retransmit.
    E,
    /// Non-Invite client deadline.
    F,
    /// Invite server `completed` retransmit (unreliable): fires at T1,
    /// doubling and capping at T2. Cut off by `H`, not by a deadline check
    /// of its own.
    G,
    /// Invite server `completed` overall deadline, `64*T1`, armed on
    /// entering `completed` regardless of transport reliability.
    H,
    /// Invite server `confirmed` absorber.
    I,
    /// Non-Invite server `completed` absorber.
    J,
    /// Non-Invite client `completed` absorber.
    K,
    /// Invite server auto-100 deadline.
    StillTrying,
    /// Generic idle deadline (Invite server post-100, Non-Invite server `trying`).
    Idle,
}

/// Events delivered to the Transaction User (the stack/core), mirroring the
/// core contract in spec §6.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    StateChanged { transaction_id: TransactionKey, previous_state: TransactionState, new_state: TransactionState },
    /// A request reaching the core for the first time, or an ACK delivered
    /// out-of-transaction (handled by the router, not this event).
    IncomingRequest { transaction_id: TransactionKey, message: Message },
    IncomingResponse { transaction_id: TransactionKey, message: Message },
    TransportError { transaction_id: TransactionKey },
    Error { transaction_id: Option<TransactionKey>, error: String },
    TransactionTerminated { transaction_id: TransactionKey },
}

/// Commands an actor's own mailbox accepts; these drive the event loop in
/// [`runner::run_transaction_loop`].
#[derive(Debug)]
pub enum InternalTransactionCommand {
    TransitionTo(TransactionState),
    /// An incoming request or response routed to this transaction.
    ProcessMessage(Message),
    /// The core's outgoing response, for server transactions.
    SendResponse(Message),
    Timer(TimerName),
    TransportError,
    Terminate,
}

/// The hundreds digit of a status code: `1` for provisional, `2` for
/// success, etc. (spec §4.7 "Class 1xx", "Class 2xx", ...).
pub fn status_class(code: u16) -> u8 {
    (code / 100) as u8
}

/// Tracks the retransmit cadence shared by every timer that doubles an
/// interval until either a cap or an overall deadline (Invite client
/// `calling`, Non-Invite client/server retransmits, Invite server
/// `completed`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetransmitState {
    pub last: Duration,
    pub elapsed: Duration,
}

#[derive(Default)]
struct TimerHandles(HashMap<TimerName, JoinHandle<()>>);

impl TimerHandles {
    fn cancel(&mut self, name: TimerName) {
        if let Some(handle) = self.0.remove(&name) {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.0.drain() {
            handle.abort();
        }
    }

    fn insert(&mut self, name: TimerName, handle: JoinHandle<()>) {
        self.cancel(name);
        self.0.insert(name, handle);
    }
}

/// Shared state and channels for one transaction actor. Kind-specific logic
/// (in [`logic`]) reads and mutates this through `&Arc<TransactionData>`
/// rather than owning its own copy, so the generic runner can drive any of
/// the four kinds uniformly.
pub struct TransactionData {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    /// The request this transaction was created for: the outgoing request
    /// (client side) or the first incoming request (server side).
    pub request: Message,
    pub transport: Arc<dyn Transport>,
    pub destination: (String, u16),
    pub config: TimerConfig,
    state: Mutex<TransactionState>,
    pub last_response: Mutex<Option<Message>>,
    /// The ACK built for the last final response (Invite client only; spec §4.8).
    pub ack: Mutex<Option<Message>>,
    pub retransmit: Mutex<RetransmitState>,
    /// When the overall transaction deadline (Timer B/F/H) started
    /// counting down; re-armed with the *remaining* time across a
    /// transition, since timers are otherwise cancelled wholesale on every
    /// state change (spec §5 "long timers" survive within one FSM run).
    pub deadline_started: Mutex<Option<std::time::Instant>>,
    timers: Mutex<TimerHandles>,
    tu_tx: mpsc::Sender<TransactionEvent>,
    self_tx: mpsc::Sender<InternalTransactionCommand>,
}

impl TransactionData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: TransactionKey,
        kind: TransactionKind,
        request: Message,
        transport: Arc<dyn Transport>,
        destination: (String, u16),
        config: TimerConfig,
        initial_state: TransactionState,
        tu_tx: mpsc::Sender<TransactionEvent>,
        self_tx: mpsc::Sender<InternalTransactionCommand>,
    ) -> Self {
        TransactionData {
            key,
            kind,
            request,
            transport,
            destination,
            config,
            state: Mutex::new(initial_state),
            last_response: Mutex::new(None),
            ack: Mutex::new(None),
            retransmit: Mutex::new(RetransmitState::default()),
            deadline_started: Mutex::new(None),
            timers: Mutex::new(TimerHandles::default()),
            tu_tx,
            self_tx,
        }
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().expect("transaction state mutex poisoned")
    }

    /// Set the state, returning the previous one.
    pub fn set_state(&self, new_state: TransactionState) -> TransactionState {
        let mut guard = self.state.lock().expect("transaction state mutex poisoned");
        std::mem::replace(&mut *guard, new_state)
    }

    pub fn reliable(&self) -> bool {
        self.transport.reliable()
    }

    pub async fn send_message(&self, message: &Message) -> Result<()> {
        self.transport.send(message, &self.destination.0, self.destination.1).await
    }

    pub async fn emit(&self, event: TransactionEvent) {
        let _ = self.tu_tx.send(event).await;
    }

    pub fn self_sender(&self) -> mpsc::Sender<InternalTransactionCommand> {
        self.self_tx.clone()
    }

    /// Arm `name` to fire `after` from now, replacing any existing timer of
    /// the same name.
    pub fn arm_timer(&self, name: TimerName, after: Duration) {
        let self_tx = self.self_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = self_tx.send(InternalTransactionCommand::Timer(name)).await;
        });
        self.timers.lock().expect("timer mutex poisoned").insert(name, handle);
    }

    pub fn cancel_timer(&self, name: TimerName) {
        self.timers.lock().expect("timer mutex poisoned").cancel(name);
    }

    pub fn cancel_all_timers(&self) {
        self.timers.lock().expect("timer mutex poisoned").cancel_all();
    }

    /// Remaining time until the overall transaction deadline, starting the
    /// clock on first call. Lets Timer B/F/H be re-armed across a state
    /// transition without resetting the overall budget, even though the
    /// runner cancels every timer on every transition.
    pub fn remaining_deadline(&self) -> Duration {
        let mut guard = self.deadline_started.lock().expect("deadline mutex poisoned");
        let started = *guard.get_or_insert_with(std::time::Instant::now);
        self.config.deadline().saturating_sub(started.elapsed())
    }

    /// Shut down with `kind`: emit the error to the TU and request a
    /// transition to `Terminated` (spec §7 item 3: delivered exactly once).
    pub async fn shutdown(&self, kind: TransactionErrorKind) -> Result<Option<TransactionState>> {
        self.emit(TransactionEvent::Error {
            transaction_id: Some(self.key.clone()),
            error: Error::transaction(kind).to_string(),
        })
        .await;
        Ok(Some(TransactionState::Terminated))
    }
}
