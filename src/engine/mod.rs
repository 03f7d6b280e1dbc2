//! Core engine: wager execution and live automation sessions.

pub mod executor;
pub mod session;
