//! Typed configuration for Tessera.
//!
//! [`TesseraConfig`] gathers the knobs of the request pipeline:
//!
//! - [`BodyConfig`] - request body ceiling
//! - [`MultipartConfig`] - upload limits and the upload directory
//! - [`HandlerConfig`] - what a panicking route handler answers
//! - [`LogConfig`](tessera_telemetry::LogConfig) - log level and format
//!
//! It is loaded in layers by the [`ConfigLoader`]:
//! defaults → TOML/JSON file → `.env` → environment variables, then validated.
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::ConfigLoader;
//!
//! # fn main() -> Result<(), tessera_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("tessera.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("TESSERA")
//!     .load()?;
//!
//! let options = config.handler_options();
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [body]
//! max_size = 52428800
//!
//! [multipart]
//! min_file_size = 1
//! max_file_size = 10485760
//! max_total_file_size = 52428800
//! max_files = 20
//! upload_dir = "/var/lib/tessera/uploads"
//!
//! [handler]
//! panic_policy = "empty_payload"
//!
//! [logging]
//! level = "info"
//! json_format = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `TESSERA__BODY__MAX_SIZE=1048576`
//! - `TESSERA__MULTIPART__MAX_FILES=5`
//! - `TESSERA__HANDLER__PANIC_POLICY=internal_error`
//! - `TESSERA__LOGGING__LEVEL=tessera_middleware=debug,info`

#![doc(html_root_url = "https://docs.rs/tessera-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{BodyConfig, HandlerConfig, MultipartConfig, TesseraConfig};
pub use error::ConfigError;
pub use loader::ConfigLoader;
