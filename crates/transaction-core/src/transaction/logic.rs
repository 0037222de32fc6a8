//! The per-kind behaviour the generic [`runner`](super::runner) delegates
//! to: one implementation per RFC 3261 §17 state machine.
//!
//! Each of the four implementations (`client::invite`, `client::non_invite`,
//! `server::invite`, `server::non_invite`) only ever has to answer four
//! questions — what happens on entering a state, what a given timer means
//! in the current state, what an incoming message means in the current
//! state, and (server side only) what sending a response means in the
//! current state. The runner owns everything else: applying the resulting
//! transition, cancelling stale timers, and reporting state changes to the
//! transaction user uniformly across all four kinds. A new transaction type
//! would need only a new [`TransactionLogic`] impl, not a new loop.

use std::sync::Arc;

use async_trait::async_trait;
use sipmw_sip_core::Message;

use crate::error::Result;

use super::{TimerName, TransactionData, TransactionKind, TransactionState};

/// Kind-specific behaviour for one of the four transaction state machines.
/// Every method receives the shared [`TransactionData`] and returns the
/// state to transition to, if any; the runner performs the actual
/// transition, cancels timers, and reports it to the TU uniformly.
#[async_trait]
pub trait TransactionLogic: Send + Sync {
    fn kind(&self) -> TransactionKind;

    /// Run `new_state`'s enter action (spec §4.7: "every state has an enter
    /// action run on transition").
    async fn on_enter(&self, data: &Arc<TransactionData>, new_state: TransactionState) -> Result<()>;

    /// A single-shot timer fired while in `current`.
    async fn on_timer(
        &self,
        data: &Arc<TransactionData>,
        timer: TimerName,
        current: TransactionState,
    ) -> Result<Option<TransactionState>>;

    /// An incoming request or response routed to this transaction by the
    /// router.
    async fn on_message(
        &self,
        data: &Arc<TransactionData>,
        message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>>;

    /// The core's outgoing response (server transactions only); client
    /// logics never receive this command.
    async fn on_outgoing_response(
        &self,
        _data: &Arc<TransactionData>,
        _message: Message,
        _current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        Ok(None)
    }
}
