//! HTTP client for the imago conversion service.
//!
//! Wraps the two endpoints the load generator drives: batch submission
//! and job status lookup.

pub mod api;

pub use api::{ImagoApi, ImagoApiError, StatusResponse, SubmitResponse};
