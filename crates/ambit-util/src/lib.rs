//! Shared utilities for the Ambit scanner.
//!
//! This crate provides cross-cutting concerns used by all other Ambit crates:
//! error types and forward-slash path helpers.

pub mod errors;
pub mod paths;
