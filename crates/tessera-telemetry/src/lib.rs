//! Structured logging for Tessera.
//!
//! Every crate of the workspace emits [`tracing`] events:
//!
//! | Level | Event |
//! |-------|-------|
//! | debug | stage transitions, parser selection, short-circuits |
//! | warn | a response interceptor returned no response |
//! | error | unresolved services (with the expected list), handler panics |
//!
//! This crate installs the subscriber that prints them.
//!
//! ```rust,no_run
//! use tessera_telemetry::{init_logging, LogConfig};
//!
//! let config = LogConfig {
//!     level: "tessera_middleware=debug,info".to_string(),
//!     ..LogConfig::production()
//! };
//! init_logging(&config).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, init_test_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
