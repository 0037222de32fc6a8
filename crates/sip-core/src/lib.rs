//! SIP (RFC 3261) message model, tokenising primitives and the header
//! parser dispatch table.
//!
//! This crate covers components C1-C4 of the middleware toolkit: byte-level
//! tokenising (`tokenizer`), the SIP-URI grammar (`uri`), per-header value
//! parsing (`parser`), the typed header/message model (`types`), and the
//! message validator (`validate`) and transaction-key derivation (`txnkey`)
//! built on top of them. `transaction-core` consumes this crate's `Message`
//! and `Uri` types as the wire model for its transaction state machines.

pub mod error;
pub mod method;
pub mod params;
pub mod parser;
pub mod status;
pub mod tokenizer;
pub mod txnkey;
pub mod types;
pub mod uri;
pub mod validate;

pub use error::{Error, ParseErrorKind, Result};
pub use method::Method;
pub use params::Params;
pub use parser::parse_message;
pub use types::{
    ContactEntry, ContactList, HeaderName, HeaderTable, HeaderValue, Message, RequestLine,
    StartLine, StatusLine, Target, Version, ViaEntry, WarningEntry,
};
pub use uri::{Scheme, Uri};
