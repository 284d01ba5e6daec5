//! AUTORENT — rent hashing rigs and pay for them in bitcoin.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod engine;
