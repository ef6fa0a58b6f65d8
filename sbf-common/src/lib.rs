//! # SBF Common Library
//!
//! Shared code for the SmartBarangay Forms services:
//! - Error types
//! - TOML configuration (logging and reconciliation settings)
//! - Configuration file resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
