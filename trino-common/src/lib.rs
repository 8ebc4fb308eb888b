//! # TRINO Common Library
//!
//! Shared code for the TRINO bird identification service:
//! - Database pool initialization and schema
//! - Database row models
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
