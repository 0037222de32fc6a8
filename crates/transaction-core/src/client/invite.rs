//! Invite Client transaction (RFC 3261 §17.1.1, spec §4.7.1).
//!
//! States: `calling -> proceeding -> completed -> (terminated)`, with direct
//! `calling -> terminated` and `proceeding -> terminated` shortcuts on a
//! 2xx final response.

use std::sync::Arc;

use async_trait::async_trait;
use sipmw_sip_core::types::header_name::HeaderName;
use sipmw_sip_core::types::header_value::HeaderValue;
use sipmw_sip_core::{Message, Method};

use crate::error::{Result, TransactionErrorKind};
use crate::transaction::{
    status_class, InternalTransactionCommand, RetransmitState, TimerName, TransactionData,
    TransactionEvent, TransactionKind, TransactionState,
};
use crate::transaction::logic::TransactionLogic;

/// Build the ACK for a non-2xx final response (spec §4.7.1 "enter(completed)").
/// ACK to a 2xx is a separate, dialog-level message the core sends on its
/// own and is out of scope here.
fn build_ack(original_request: &Message, response: &Message) -> Message {
    let request_uri = original_request.request_line().expect("ACK built from a request").request_uri.clone();
    let mut ack = Message::request(Method::Ack, request_uri);

    if let Some(HeaderValue::MultipleVias(vias)) = original_request.headers.fetch(&HeaderName::Via) {
        if let Some(top) = vias.first() {
            ack.headers.put_back(HeaderName::Via, HeaderValue::MultipleVias(vec![top.clone()]));
        }
    }
    if let Some(route) = original_request.headers.fetch(&HeaderName::Route) {
        ack.headers.put_back(HeaderName::Route, route.clone());
    }
    if let Some(from) = original_request.headers.fetch(&HeaderName::From) {
        ack.headers.put_back(HeaderName::From, from.clone());
    }
    if let Some(to) = response.headers.fetch(&HeaderName::To) {
        ack.headers.put_back(HeaderName::To, to.clone());
    }
    if let Some(call_id) = original_request.headers.fetch(&HeaderName::CallId) {
        ack.headers.put_back(HeaderName::CallId, call_id.clone());
    }
    if let Some(HeaderValue::CSeq(n, _)) = original_request.headers.fetch(&HeaderName::CSeq) {
        ack.headers.put_back(HeaderName::CSeq, HeaderValue::CSeq(*n, Method::Ack));
    }
    let max_forwards = match original_request.headers.fetch(&HeaderName::MaxForwards) {
        Some(HeaderValue::SingleInteger(n)) => *n,
        _ => 70,
    };
    ack.headers.put_back(HeaderName::MaxForwards, HeaderValue::SingleInteger(max_forwards));
    ack.headers.put_back(HeaderName::ContentLength, HeaderValue::SingleInteger(0));
    ack
}

pub struct InviteClientLogic;

#[async_trait]
impl TransactionLogic for InviteClientLogic {
    fn kind(&self) -> TransactionKind {
        TransactionKind::InviteClient
    }

    async fn on_enter(&self, data: &Arc<TransactionData>, new_state: TransactionState) -> Result<()> {
        match new_state {
            TransactionState::Calling => {
                data.send_message(&data.request).await?;
                data.arm_timer(TimerName::B, data.config.deadline());
                if !data.reliable() {
                    let first = data.config.t1;
                    *data.retransmit.lock().expect("retransmit mutex poisoned") =
                        RetransmitState { last: first, elapsed: first };
                    data.arm_timer(TimerName::A, first);
                }
            }
            TransactionState::Completed => {
                let response = data.last_response.lock().expect("last_response mutex poisoned").clone();
                if let Some(response) = response {
                    let ack = build_ack(&data.request, &response);
                    data.send_message(&ack).await?;
                    *data.ack.lock().expect("ack mutex poisoned") = Some(ack);
                }
                if data.reliable() {
                    let _ = data.self_sender().send(InternalTransactionCommand::TransitionTo(TransactionState::Terminated)).await;
                } else {
                    data.arm_timer(TimerName::D, data.config.d());
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
            (TimerName::B, TransactionState::Calling) => data.shutdown(TransactionErrorKind::Timeout).await,
            (TimerName::A, TransactionState::Calling) => {
                let new_last = data.retransmit.lock().expect("retransmit mutex poisoned").last * 2;
                data.send_message(&data.request).await?;
                *data.retransmit.lock().expect("retransmit mutex poisoned") =
                    RetransmitState { last: new_last, elapsed: Default::default() };
                data.arm_timer(TimerName::A, new_last);
                Ok(None)
            }
            (TimerName::D, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            _ => Ok(None),
        }
    }

    async fn on_message(
        &self,
        data: &Arc<TransactionData>,
        message: Message,
        current: TransactionState,
    ) -> Result<Option<TransactionState>> {
        let class = message.status_code().map(status_class).unwrap_or(0);
        match current {
            TransactionState::Calling | TransactionState::Proceeding => {
                data.emit(TransactionEvent::IncomingResponse { transaction_id: data.key.clone(), message: message.clone() })
                    .await;
                match class {
                    1 => Ok(Some(TransactionState::Proceeding)),
                    2 => Ok(Some(TransactionState::Terminated)),
                    _ => {
                        *data.last_response.lock().expect("last_response mutex poisoned") = Some(message);
                        Ok(Some(TransactionState::Completed))
                    }
                }
            }
            TransactionState::Completed => {
                if class >= 3 {
                    if let Some(ack) = data.ack.lock().expect("ack mutex poisoned").clone() {
                        data.send_message(&ack).await?;
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}
