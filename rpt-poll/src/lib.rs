//! rpt-poll library interface
//!
//! Exposes the polling pipeline for integration testing: sampler,
//! recognizer and catalog clients, enrichment, registry, and the
//! scheduler that ties them together.

pub mod error;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod services;

pub use error::PollError;
