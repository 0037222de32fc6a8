//! Non-Invite Server transaction (RFC 3261 §17.2.2, spec §4.7.4).
//!
//! States: `trying -> proceeding -> completed -> (terminated)`. No
//! retransmission timers of its own: every retransmit here is a resend of
//! the last response on a duplicate incoming request.

use std::sync::Arc;

use async_trait::async_trait;
use sipmw_sip_core::Message;

use crate::error::{Result, TransactionErrorKind};
use crate::transaction::logic::TransactionLogic;
use crate::transaction::{
    status_class, TimerName, TransactionData, TransactionEvent, TransactionKind, TransactionState,
};

pub struct NonInviteServerLogic;

#[async_trait]
impl TransactionLogic for NonInviteServerLogic {
    fn kind(&self) -> TransactionKind {
        TransactionKind::NonInviteServer
    }

    async fn on_enter(&self, data: &Arc<TransactionData>, new_state: TransactionState) -> Result<()> {
        match new_state {
            TransactionState::Trying => {
                data.emit(TransactionEvent::IncomingRequest { transaction_id: data.key.clone(), message: data.request.clone() })
                    .await;
                data.arm_timer(TimerName::Idle, data.config.trying_idle());
            }
            TransactionState::Completed => {
                data.arm_timer(TimerName::J, data.config.j());
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_timer(
        &self,
        data: &Arc<TransactionData>,
        timer: TimerName,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match (timer, current) {
            (TimerName::Idle, TransactionState::Trying) => data.shutdown(TransactionErrorKind::Idle).await,
            (TimerName::J, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            _ => Ok(None),
        }
    }

    async fn on_message(
        &self,
        data: &Arc<TransactionData>,
        _message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match current {
            // A retransmitted request while the core hasn't answered yet
            // (still `trying`) has nothing to resend; just absorb it.
            TransactionState::Trying => Ok(None),
            TransactionState::Proceeding | TransactionState::Completed => {
                if let Some(last) = data.last_response.lock().expect("last_response mutex poisoned").clone() {
                    data.send_message(&last).await?;
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn on_outgoing_response(
        &self,
        data: &Arc<TransactionData>,
        message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        if !matches!(current, TransactionState::Trying | TransactionState::Proceeding) {
            return Ok(None);
        }
        data.send_message(&message).await?;
        let class = message.status_code().map(status_class).unwrap_or(0);
        *data.last_response.lock().expect("last_response mutex poisoned") = Some(message);
        if class == 1 {
            Ok(Some(TransactionState::Proceeding))
        } else {
            Ok(Some(TransactionState::Completed))
        }
    }
}
