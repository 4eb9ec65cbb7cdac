//! # Recon Common Library
//!
//! Shared code for the contact reconciliation service:
//! - Error taxonomy (validation, conflict, storage, invariant violations)
//! - Configuration resolution (CLI/env, TOML file, compiled defaults)
//! - Database initialization, schema migrations and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
