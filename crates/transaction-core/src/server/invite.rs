//! Invite Server transaction (RFC 3261 §17.2.1, spec §4.7.3).
//!
//! States: `proceeding -> completed -> confirmed -> (terminated)`, with a
//! direct `proceeding -> terminated` shortcut on a 2xx final response.

use std::sync::Arc;

use async_trait::async_trait;
use sipmw_sip_core::types::header_name::HeaderName;
use sipmw_sip_core::types::header_value::HeaderValue;
use sipmw_sip_core::{Message, Method};

use crate::error::{Result, TransactionErrorKind};
use crate::transaction::logic::TransactionLogic;
use crate::transaction::{
    status_class, InternalTransactionCommand, RetransmitState, TimerName, TransactionData,
    TransactionEvent, TransactionKind, TransactionState,
};

/// A bare 100 Trying, carrying just enough dialog-matching headers back to
/// the peer (spec §4.7.3 "synthesise 100 Trying").
fn synthesize_trying(request: &Message) -> Message {
    let mut trying = Message::response(100, Some("Trying".to_string()));
    for name in [HeaderName::Via, HeaderName::From, HeaderName::To, HeaderName::CallId, HeaderName::CSeq] {
        if let Some(value) = request.headers.fetch(&name) {
            trying.headers.put_back(name, value.clone());
        }
    }
    trying.headers.put_back(HeaderName::ContentLength, HeaderValue::SingleInteger(0));
    trying
}

pub struct InviteServerLogic;

#[async_trait]
impl TransactionLogic for InviteServerLogic {
    fn kind(&self) -> TransactionKind {
        TransactionKind::InviteServer
    }

    async fn on_enter(&self, data: &Arc<TransactionData>, new_state: TransactionState) -> Result<()> {
        match new_state {
            TransactionState::Proceeding => {
                data.emit(TransactionEvent::IncomingRequest { transaction_id: data.key.clone(), message: data.request.clone() })
                    .await;
                data.arm_timer(TimerName::StillTrying, data.config.still_trying());
            }
            TransactionState::Completed => {
                data.arm_timer(TimerName::H, data.remaining_deadline());
                if !data.reliable() {
                    let t1 = data.config.t1;
                    *data.retransmit.lock().expect("retransmit mutex poisoned") = RetransmitState { last: t1, elapsed: t1 };
                    data.arm_timer(TimerName::G, t1);
                }
            }
            TransactionState::Confirmed => {
                if data.reliable() {
                    let _ = data
                        .self_sender()
                        .send(InternalTransactionCommand::TransitionTo(TransactionState::Terminated))
                        .await;
                } else {
                    data.arm_timer(TimerName::I, data.config.i());
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
            (TimerName::StillTrying, TransactionState::Proceeding) => {
                let already_responded = data.last_response.lock().expect("last_response mutex poisoned").is_some();
                if !already_responded {
                    let trying = synthesize_trying(&data.request);
                    data.send_message(&trying).await?;
                    *data.last_response.lock().expect("last_response mutex poisoned") = Some(trying);
                }
                data.arm_timer(TimerName::Idle, data.config.server_idle());
                Ok(None)
            }
            (TimerName::Idle, TransactionState::Proceeding) => data.shutdown(TransactionErrorKind::Idle).await,
            (TimerName::G, TransactionState::Completed) => {
                let new_last = {
                    let rs = *data.retransmit.lock().expect("retransmit mutex poisoned");
                    data.config.next_retransmit(rs.last)
                };
                if let Some(last) = data.last_response.lock().expect("last_response mutex poisoned").clone() {
                    data.send_message(&last).await?;
                }
                *data.retransmit.lock().expect("retransmit mutex poisoned") =
                    RetransmitState { last: new_last, elapsed: Default::default() };
                data.arm_timer(TimerName::G, new_last);
                Ok(None)
            }
            (TimerName::H, TransactionState::Completed) => data.shutdown(TransactionErrorKind::Timeout).await,
            (TimerName::I, TransactionState::Confirmed) => Ok(Some(TransactionState::Terminated)),
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
            TransactionState::Proceeding => {
                if let Some(last) = data.last_response.lock().expect("last_response mutex poisoned").clone() {
                    data.send_message(&last).await?;
                }
                Ok(None)
            }
            TransactionState::Completed => match message.method() {
                Some(Method::Invite) => {
                    if let Some(last) = data.last_response.lock().expect("last_response mutex poisoned").clone() {
                        data.send_message(&last).await?;
                    }
                    Ok(None)
                }
                Some(Method::Ack) => Ok(Some(TransactionState::Confirmed)),
                _ => data.shutdown(TransactionErrorKind::InvalidMethod).await,
            },
            // `confirmed` absorbs everything (spec §4.7.3).
            _ => Ok(None),
        }
    }

    async fn on_outgoing_response(
        &self,
        data: &Arc<TransactionData>,
        message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        if current != TransactionState::Proceeding {
            return Ok(None);
        }
        data.send_message(&message).await?;
        let class = message.status_code().map(status_class).unwrap_or(0);
        *data.last_response.lock().expect("last_response mutex poisoned") = Some(message);
        match class {
            1 => Ok(None),
            2 => Ok(Some(TransactionState::Terminated)),
            _ => Ok(Some(TransactionState::Completed)),
        }
    }
}
