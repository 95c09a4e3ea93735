//! Session-level integration tests.
//!
//! Everything except `live_test` runs against scripted responses.

pub mod common;
pub mod live_test;
pub mod session_test;
pub mod statement_test;
pub mod token_test;
pub mod transaction_test;
