//! Integration tests for the public `lc_automator` API.

mod api;
mod evaluator;
mod mock_exchange;
mod sessions;
