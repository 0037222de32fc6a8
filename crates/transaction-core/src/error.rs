//! Errors surfaced by the transaction layer (spec §7): the three kinds that
//! cross component boundaries are parse/validation errors from `sip-core`
//! (propagated verbatim) and transaction errors raised by the FSMs
//! themselves.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The distinguished transaction-error reasons delivered to the core via
/// `receive_error` (spec §7 item 3) before a transaction stops.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    #[error("transaction timed out")]
    Timeout,
    #[error("transaction went idle waiting for the core")]
    Idle,
    #[error("request method invalid for the transaction's current state")]
    InvalidMethod,
    #[error("transaction was shut down")]
    Shutdown,
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Sip(#[from] sipmw_sip_core::Error),

    #[error("{kind}")]
    Transaction {
        kind: TransactionErrorKind,
        #[source]
        transport: Option<std::sync::Arc<Error>>,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no transaction owns key {0}")]
    NoTransaction(String),

    #[error("a transaction already owns key {0}")]
    AlreadyStarted(String),

    #[error("protocol {0} has no registered transport")]
    UnregisteredTransport(String),

    #[error("protocol {0} is already registered to a transport")]
    AlreadyRegisteredTransport(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn transaction(kind: TransactionErrorKind) -> Self {
        Error::Transaction { kind, transport: None }
    }
}
