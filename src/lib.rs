//! LC Automator: roulette strategy automation.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod strategy;
pub mod simulation;
pub mod engine;
pub mod storage;
pub mod api;
