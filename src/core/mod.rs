//! IP Lens Core Module
//!
//! Application configuration and the top-level error type.

pub mod config;
pub mod error;

pub use self::config::{AppConfig, ConfigError};
pub use error::{ErrorKind, LensError, Result};
