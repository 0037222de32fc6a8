//! Non-Invite Client transaction (RFC 3261 §17.1.2, spec §4.7.2).
//!
//! States: `trying -> proceeding -> completed -> (terminated)`.

use std::sync::Arc;

use async_trait::async_trait;
use sipmw_sip_core::Message;

use crate::error::{Result, TransactionErrorKind};
use crate::transaction::logic::TransactionLogic;
use crate::transaction::{
    status_class, RetransmitState, TimerName, TransactionData, TransactionEvent, TransactionKind,
    TransactionState,
};

pub struct NonInviteClientLogic;

#[async_trait]
impl TransactionLogic for NonInviteClientLogic {
    fn kind(&self) -> TransactionKind {
        TransactionKind::NonInviteClient
    }

    async fn on_enter(&self, data: &Arc<TransactionData>, new_state: TransactionState) -> Result<()> {
        match new_state {
            TransactionState::Trying => {
                data.send_message(&data.request).await?;
                data.arm_timer(TimerName::F, data.remaining_deadline());
                if !data.reliable() {
                    let t1 = data.config.t1;
                    *data.retransmit.lock().expect("retransmit mutex poisoned") = RetransmitState { last: t1, elapsed: t1 };
                    data.arm_timer(TimerName::E, t1);
                }
            }
            TransactionState::Proceeding => {
                data.arm_timer(TimerName::F, data.remaining_deadline());
                if !data.reliable() {
                    data.arm_timer(TimerName::E, data.config.t2);
                }
            }
            TransactionState::Completed => {
                if data.reliable() {
                    let _ = data
                        .self_sender()
                        .send(crate::transaction::InternalTransactionCommand::TransitionTo(TransactionState::Terminated))
                        .await;
                } else {
                    data.arm_timer(TimerName::K, data.config.k());
                }
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
            (TimerName::F, _) => data.shutdown(TransactionErrorKind::Timeout).await,
            (TimerName::E, TransactionState::Trying) => {
                data.send_message(&data.request).await?;
                let next = {
                    let rs = *data.retransmit.lock().expect("retransmit mutex poisoned");
                    data.config.next_retransmit(rs.last)
                };
                *data.retransmit.lock().expect("retransmit mutex poisoned") =
                    RetransmitState { last: next, elapsed: Default::default() };
                data.arm_timer(TimerName::E, next);
                Ok(None)
            }
            (TimerName::E, TransactionState::Proceeding) => {
                data.send_message(&data.request).await?;
                data.arm_timer(TimerName::E, data.config.t2);
                Ok(None)
            }
            (TimerName::K, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            _ => Ok(None),
        }
    }

    async fn on_message(
        &self,
        data: &Arc<TransactionData>,
        message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match current {
            TransactionState::Trying | TransactionState::Proceeding => {
                data.emit(TransactionEvent::IncomingResponse { transaction_id: data.key.clone(), message: message.clone() })
                    .await;
                let class = message.status_code().map(status_class).unwrap_or(0);
                if class == 1 {
                    Ok(Some(TransactionState::Proceeding))
                } else {
                    Ok(Some(TransactionState::Completed))
                }
            }
            // Completed absorbs any further response silently (spec §4.7.2).
            TransactionState::Completed => Ok(None),
            _ => Ok(None),
        }
    }
}
