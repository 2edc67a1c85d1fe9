//! Logging utilities.
//!
//! The pacer only ever talks to the `log` facade. This module offers a
//! one-shot `env_logger` setup for binaries that do not install their own.

mod init;

pub use init::{init_logging, LoggingConfig};
