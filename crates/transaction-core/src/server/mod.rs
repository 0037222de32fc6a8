//! Server transaction logics (spec §4.7.3, §4.7.4).

pub mod invite;
pub mod non_invite;

pub use invite::InviteServerLogic;
pub use non_invite::NonInviteServerLogic;
