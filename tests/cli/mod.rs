//! Tests for the `fmsql` binary.

pub mod common;
pub mod usage_test;
