//! # RPT Common Library
//!
//! Shared code for the radio play tracker services including:
//! - Error types
//! - Configuration loading
//! - Catalog domain models
//! - SQLite access layer (schema, upserts, play records, polling state)

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{Error, Result};
