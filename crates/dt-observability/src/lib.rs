//! # dt-observability
//!
//! Structured logging for dyntag, built on `tracing-subscriber`.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
