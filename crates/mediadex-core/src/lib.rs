//! Shared configuration, error and domain types for mediadex.

pub mod config;
pub mod error;
pub mod types;

pub use config::MediadexConfig;
pub use error::{MediadexError, Result};
pub use types::*;
