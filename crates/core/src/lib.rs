//! Shared data model for the imago load-generation harness.
//!
//! Pure types with no I/O: the job batch sent to the conversion service,
//! the attempt outcome, and the run counters aggregated across workers.

pub mod error;
pub mod job;
pub mod stats;
pub mod types;
