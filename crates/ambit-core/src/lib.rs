//! Core data types for the Ambit scanner.
//!
//! This crate defines the fundamental types shared by the scan pipeline and
//! its plugins: the inventory model (packages, secrets, sensitive-data and
//! embedded-filesystem markers, findings), the plugin capability model, the
//! extractor and detector contracts, the lazily-stat'ing per-inode file
//! handle, and the scan configuration.
//!
//! This crate is intentionally free of traversal logic and network I/O.

pub mod cancel;
pub mod capabilities;
pub mod config;
pub mod fileapi;
pub mod finding;
pub mod inventory;
pub mod plugin;
pub mod sensitive;
pub mod stats;
pub mod status;
