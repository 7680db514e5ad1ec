//! # HTTP Middleware
//!
//! Metrics recording. Authentication lives in [`crate::auth`].

pub mod metrics;
