//! Client transaction logics (spec §4.7.1, §4.7.2).

pub mod invite;
pub mod non_invite;

pub use invite::InviteClientLogic;
pub use non_invite::NonInviteClientLogic;
