//! Core driver logic for pyrite
//!
//! This crate provides the foundational types, error handling,
//! configuration, and logging infrastructure for the driver.

pub mod config;
pub mod error;
pub mod logging;

pub use config::DriverConfig;
pub use error::{GlError, Result};
