//! `imago-loadgen` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod pool;
pub mod reporter;
pub mod stats;
pub mod submitter;
