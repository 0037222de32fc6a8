//! The generic transaction event loop: a single-threaded actor per
//! transaction, translating commands into state transitions by delegating
//! the kind-specific behaviour to a [`TransactionLogic`].
//!
//! ## RFC 3261 context
//!
//! All four machines in RFC 3261 §17 reduce to the same shape once their
//! per-kind behaviour is factored out: receive a command (a message, a
//! timer firing, a transport failure), ask the logic what state that
//! implies, apply the transition, and notify the transaction user. Nothing
//! in this file knows whether it's driving an Invite or Non-Invite,
//! client or server machine — that's entirely [`TransactionLogic`]'s job.
//!
//! ## Architecture
//!
//! One actor per transaction, `tokio::spawn`ed from [`spawn_transaction`]
//! and driven by its own `mpsc` mailbox ([`InternalTransactionCommand`]).
//! Keeping each transaction's state behind its own task rather than a
//! shared lock means the four machines never contend with each other, and a
//! slow or wedged transaction can't stall the registry or its siblings —
//! only whoever is waiting on that one transaction's own events notices.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::logic::TransactionLogic;
use super::{InternalTransactionCommand, TransactionData, TransactionEvent, TransactionKey, TransactionKind, TransactionState};
use crate::timer::TimerConfig;
use crate::transport::Transport;
use sipmw_sip_core::Message;

/// Construct a transaction's shared data and spawn its event loop, then
/// immediately request the transition into `start_state` so that state's
/// `enter` action runs as the very first thing the actor does (spec §4.7:
/// "every state has an enter action run on transition").
#[allow(clippy::too_many_arguments)]
pub fn spawn_transaction(
    key: TransactionKey,
    kind: TransactionKind,
    request: Message,
    transport: Arc<dyn Transport>,
    destination: (String, u16),
    config: TimerConfig,
    start_state: TransactionState,
    logic: Arc<dyn TransactionLogic>,
    tu_tx: mpsc::Sender<TransactionEvent>,
) -> mpsc::Sender<InternalTransactionCommand> {
    let (self_tx, cmd_rx) = mpsc::channel(64);
    let data = Arc::new(TransactionData::new(
        key,
        kind,
        request,
        transport,
        destination,
        config,
        TransactionState::Created,
        tu_tx,
        self_tx.clone(),
    ));
    tokio::spawn(run_transaction_loop(Arc::clone(&data), logic, cmd_rx));
    let bootstrap = self_tx.clone();
    tokio::spawn(async move {
        let _ = bootstrap.send(InternalTransactionCommand::TransitionTo(start_state)).await;
    });
    self_tx
}

/// Drive one transaction's command mailbox until it reaches `Terminated`.
/// Intended to be the body of a `tokio::spawn`ed task per transaction.
pub async fn run_transaction_loop(
    data: Arc<TransactionData>,
    logic: Arc<dyn TransactionLogic>,
    mut cmd_rx: mpsc::Receiver<InternalTransactionCommand>,
) {
    let key = data.key.clone();
    debug!(%key, state = %data.state(), "transaction loop starting");

    while let Some(command) = cmd_rx.recv().await {
        let current = data.state();

        let outcome = match command {
            InternalTransactionCommand::TransitionTo(next) => {
                apply_transition(&data, &logic, current, next).await;
                continue;
            }
            InternalTransactionCommand::ProcessMessage(message) => logic.on_message(&data, message, current).await,
            InternalTransactionCommand::SendResponse(message) => {
                logic.on_outgoing_response(&data, message, current).await
            }
            InternalTransactionCommand::Timer(timer) => logic.on_timer(&data, timer, current).await,
            InternalTransactionCommand::TransportError => {
                data.emit(TransactionEvent::TransportError { transaction_id: key.clone() }).await;
                Ok(Some(TransactionState::Terminated))
            }
            InternalTransactionCommand::Terminate => Ok(Some(TransactionState::Terminated)),
        };

        match outcome {
            Ok(Some(next)) => apply_transition(&data, &logic, current, next).await,
            Ok(None) => {}
            Err(e) => {
                error!(%key, error = %e, ?current, "transaction logic error");
                data.emit(TransactionEvent::Error { transaction_id: Some(key.clone()), error: e.to_string() }).await;
            }
        }

        if data.state() == TransactionState::Terminated {
            break;
        }
    }

    data.cancel_all_timers();
    debug!(%key, "transaction loop ended");
    data.emit(TransactionEvent::TransactionTerminated { transaction_id: key }).await;
}

async fn apply_transition(
    data: &Arc<TransactionData>,
    logic: &Arc<dyn TransactionLogic>,
    current: TransactionState,
    next: TransactionState,
) {
    if current == next {
        return;
    }
    data.cancel_all_timers();
    let previous = data.set_state(next);
    data.emit(TransactionEvent::StateChanged {
        transaction_id: data.key.clone(),
        previous_state: previous,
        new_state: next,
    })
    .await;
    if let Err(e) = logic.on_enter(data, next).await {
        warn!(key = %data.key, error = %e, ?next, "error entering state");
        data.emit(TransactionEvent::Error { transaction_id: Some(data.key.clone()), error: e.to_string() }).await;
    }
}
