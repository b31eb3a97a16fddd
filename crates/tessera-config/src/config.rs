//! Configuration types.
//!
//! This module provides the top-level [`TesseraConfig`] struct and its sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tessera_extract::{
    MultipartLimits, ParserOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_FILES,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_TOTAL_FILE_SIZE, DEFAULT_MIN_FILE_SIZE,
};
use tessera_middleware::{HandlerOptions, PanicPolicy};
use tessera_telemetry::LogConfig;

use crate::ConfigError;

/// Complete Tessera configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use tessera_config::TesseraConfig;
///
/// let config = TesseraConfig::default();
/// assert_eq!(config.body.max_size, 50 * 1024 * 1024);
/// assert_eq!(config.multipart.max_files, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    /// Request body limits.
    #[serde(default)]
    pub body: BodyConfig,

    /// `multipart/form-data` limits.
    #[serde(default)]
    pub multipart: MultipartConfig,

    /// Handler behaviour.
    #[serde(default)]
    pub handler: HandlerConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LogConfig,
}

/// Request body limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BodyConfig {
    /// Maximum body size in bytes.
    pub max_size: u64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// `multipart/form-data` limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MultipartConfig {
    /// Minimum size of one file in bytes.
    pub min_file_size: u64,
    /// Maximum size of one file in bytes.
    pub max_file_size: u64,
    /// Maximum size of all files of a request in bytes.
    pub max_total_file_size: u64,
    /// Maximum number of files per request.
    pub max_files: usize,
    /// Directory uploaded files are written to. Files stay in memory when unset.
    pub upload_dir: Option<PathBuf>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_file_size: DEFAULT_MAX_TOTAL_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            upload_dir: None,
        }
    }
}

/// Handler behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// What a panicking route handler answers.
    pub panic_policy: PanicPolicy,
}

impl TesseraConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The body or file limits are zero
    /// - `min_file_size` exceeds `max_file_size`
    /// - `max_file_size` exceeds `max_total_file_size`
    /// - The log filter does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body.max_size == 0 {
            return Err(ConfigError::invalid_value(
                "body.max_size",
                "must be greater than 0",
            ));
        }

        let multipart = &self.multipart;
        if multipart.max_files == 0 {
            return Err(ConfigError::invalid_value(
                "multipart.max_files",
                "must be at least 1",
            ));
        }
        if multipart.max_file_size == 0 {
            return Err(ConfigError::invalid_value(
                "multipart.max_file_size",
                "must be greater than 0",
            ));
        }
        if multipart.min_file_size > multipart.max_file_size {
            return Err(ConfigError::invalid_value(
                "multipart.min_file_size",
                format!(
                    "{} exceeds multipart.max_file_size ({})",
                    multipart.min_file_size, multipart.max_file_size
                ),
            ));
        }
        if multipart.max_file_size > multipart.max_total_file_size {
            return Err(ConfigError::invalid_value(
                "multipart.max_file_size",
                format!(
                    "{} exceeds multipart.max_total_file_size ({})",
                    multipart.max_file_size, multipart.max_total_file_size
                ),
            ));
        }

        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))
    }

    /// Create a development configuration preset.
    ///
    /// Pretty debug logging, and panicking handlers answer 500 so they show up.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::TesseraConfig;
    ///
    /// let config = TesseraConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            handler: HandlerConfig {
                panic_policy: PanicPolicy::InternalError,
            },
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Create a production configuration preset.
    ///
    /// JSON logging at info level with the default limits.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::TesseraConfig;
    ///
    /// let config = TesseraConfig::production();
    /// assert!(config.logging.json_format);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Body parser limits for the pipeline.
    #[must_use]
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            max_body_size: self.body.max_size,
            multipart: MultipartLimits {
                max_file_size: self.multipart.max_file_size,
                max_total_file_size: self.multipart.max_total_file_size,
                min_file_size: self.multipart.min_file_size,
                max_files: self.multipart.max_files,
                upload_dir: self.multipart.upload_dir.clone(),
            },
        }
    }

    /// Handler options with the default parser registry.
    #[must_use]
    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions::new()
            .parser(self.parser_options())
            .panic_policy(self.handler.panic_policy)
    }

    /// Logging configuration for `tessera_telemetry::init_logging`.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        self.logging.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TesseraConfig::default();
        assert_eq!(config.body.max_size, 50 * 1024 * 1024);
        assert_eq!(config.multipart.min_file_size, 1);
        assert_eq!(config.multipart.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.multipart.max_total_file_size, 50 * 1024 * 1024);
        assert_eq!(config.multipart.max_files, 20);
        assert_eq!(config.handler.panic_policy, PanicPolicy::EmptyPayload);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_body_size() {
        let mut config = TesseraConfig::default();
        config.body.max_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "body.max_size"
        ));
    }

    #[test]
    fn test_validate_min_above_max() {
        let mut config = TesseraConfig::default();
        config.multipart.min_file_size = 2048;
        config.multipart.max_file_size = 1024;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "multipart.min_file_size"
        ));
    }

    #[test]
    fn test_validate_file_above_total() {
        let mut config = TesseraConfig::default();
        config.multipart.max_total_file_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_no_files() {
        let mut config = TesseraConfig::default();
        config.multipart.max_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_development_preset() {
        let config = TesseraConfig::development();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json_format);
        assert_eq!(config.handler.panic_policy, PanicPolicy::InternalError);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_preset() {
        let config = TesseraConfig::production();
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.handler.panic_policy, PanicPolicy::EmptyPayload);
    }

    #[test]
    fn test_parser_options() {
        let mut config = TesseraConfig::default();
        config.body.max_size = 4096;
        config.multipart.max_files = 3;
        config.multipart.upload_dir = Some(PathBuf::from("/tmp/uploads"));

        let options = config.parser_options();
        assert_eq!(options.max_body_size, 4096);
        assert_eq!(options.multipart.max_files, 3);
        assert_eq!(
            options.multipart.upload_dir,
            Some(PathBuf::from("/tmp/uploads"))
        );
    }

    #[test]
    fn test_default_parser_options_match() {
        assert_eq!(
            TesseraConfig::default().parser_options(),
            ParserOptions::default()
        );
    }

    #[test]
    fn test_handler_options() {
        let mut config = TesseraConfig::default();
        config.body.max_size = 10;
        config.handler.panic_policy = PanicPolicy::InternalError;

        let options = config.handler_options();
        assert_eq!(options.parser.max_body_size, 10);
        assert_eq!(options.panic_policy, PanicPolicy::InternalError);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = TesseraConfig::development();
        let text = toml::to_string(&config).unwrap();
        let parsed: TesseraConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
