//! # SWM Common Library
//!
//! Shared code for the stream water monitoring workspace including:
//! - Database schema initialization and shared row models
//! - Configuration loading and root folder resolution
//! - Logging bootstrap and per-component log contexts
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use db::models::Domain;
pub use error::{Error, Result};
pub use logging::LogContext;
