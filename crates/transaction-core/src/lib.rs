//! RFC 3261 §17 transaction layer, router, and stack façade (spec §4.7-4.9,
//! components C7-C9): the four transaction state machines, the keyed
//! registry that matches inbound messages to them, and the per-stack
//! façade an embedder drives.

pub mod client;
pub mod error;
pub mod router;
pub mod server;
pub mod stack;
pub mod timer;
pub mod transaction;
pub mod transport;

pub use error::{Error, Result, TransactionErrorKind};
pub use router::{derive_stateless_ack_branch, Core};
pub use stack::Stack;
pub use timer::TimerConfig;
pub use transaction::{TransactionEvent, TransactionKey, TransactionKind, TransactionState};
pub use transport::{Protocol, Transport};
