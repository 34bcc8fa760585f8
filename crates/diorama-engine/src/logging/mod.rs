//! Logging utilities.
//!
//! This module centralizes logger initialization and the formatting of error
//! chains for log output. It avoids imposing a specific logging backend
//! beyond the standard `log` facade.

mod chain;
mod init;

pub use chain::error_chain;
pub use init::{init_logging, LoggingConfig};
