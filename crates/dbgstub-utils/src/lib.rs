//! # dbgstub Utilities
//!
//! Shared helpers for the dbgstub workspace; currently the `tracing` setup
//! used by the command-line host.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, LogConfig, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
