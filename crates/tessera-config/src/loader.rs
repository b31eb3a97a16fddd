//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! defaults, files, `.env` files and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tessera_middleware::PanicPolicy;

use crate::{ConfigError, TesseraConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values (or a preset)
/// 2. Configuration file (TOML or JSON)
/// 3. `.env` file entries
/// 4. Process environment variables
///
/// # Example
///
/// ```no_run
/// use tessera_config::ConfigLoader;
///
/// # fn main() -> Result<(), tessera_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("tessera.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TESSERA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TesseraConfig,
    env_prefix: Option<String>,
    dotenv: HashMap<String, String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TesseraConfig::default(),
            env_prefix: None,
            dotenv: HashMap::new(),
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = TesseraConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TesseraConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TesseraConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats, chosen by extension.
    /// Sections missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        tracing::debug!(path = %path.display(), "configuration file loaded");

        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// `format` is either "toml" or "json".
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [multipart]
    ///     max_files = 2
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.multipart.max_files, 2);
    /// assert_eq!(config.body.max_size, 50 * 1024 * 1024);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `TESSERA__BODY__MAX_SIZE=1048576` or `TESSERA__LOGGING__LEVEL=debug`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load the `.env` file of the working directory (or a parent) into the
    /// process environment.
    ///
    /// Variables already set in the environment are kept. A missing file is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DotenvError` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), ".env file loaded");
                Ok(self)
            }
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Read override entries from a specific `.env` file.
    ///
    /// The entries are applied before the process environment, which wins on
    /// conflicts. The process environment itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DotenvError` if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        for entry in dotenvy::from_path_iter(path.as_ref())? {
            let (key, value) = entry?;
            self.dotenv.insert(key, value);
        }
        Ok(self)
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies `.env` and environment variable overrides (if a prefix was set)
    /// and validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<TesseraConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let dotenv = std::mem::take(&mut self.dotenv);
            self.apply_overrides(&prefix, dotenv)?;
            self.apply_overrides(&prefix, env::vars())?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TesseraConfig {
        self.config
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<TesseraConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_overrides(
        &mut self,
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if key.starts_with(&marker) {
                self.apply_env_var(&key, &value, prefix)?;
            }
        }
        Ok(())
    }

    // Apply a single environment variable
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            // Body section
            ["BODY", "MAX_SIZE"] => {
                self.config.body.max_size = parse_int(key, value)?;
            }

            // Multipart section
            ["MULTIPART", "MIN_FILE_SIZE"] => {
                self.config.multipart.min_file_size = parse_int(key, value)?;
            }
            ["MULTIPART", "MAX_FILE_SIZE"] => {
                self.config.multipart.max_file_size = parse_int(key, value)?;
            }
            ["MULTIPART", "MAX_TOTAL_FILE_SIZE"] => {
                self.config.multipart.max_total_file_size = parse_int(key, value)?;
            }
            ["MULTIPART", "MAX_FILES"] => {
                self.config.multipart.max_files = parse_int(key, value)?;
            }
            ["MULTIPART", "UPLOAD_DIR"] => {
                self.config.multipart.upload_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            // Handler section
            ["HANDLER", "PANIC_POLICY"] => {
                self.config.handler.panic_policy = match value.to_lowercase().as_str() {
                    "empty_payload" => PanicPolicy::EmptyPayload,
                    "internal_error" => PanicPolicy::InternalError,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'empty_payload' or 'internal_error'",
                        ))
                    }
                };
            }

            // Logging section
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_flag(key, value)?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "JSON_FORMAT"] => {
                self.config.logging.json_format = parse_flag(key, value)?;
            }
            ["LOGGING", "SPAN_EVENTS"] => {
                self.config.logging.span_events = parse_flag(key, value)?;
            }
            ["LOGGING", "FILE_LINE_INFO"] => {
                self.config.logging.file_line_info = parse_flag(key, value)?;
            }
            ["LOGGING", "INCLUDE_TARGET"] => {
                self.config.logging.include_target = parse_flag(key, value)?;
            }

            _ => {
                tracing::debug!(var = key, "ignoring unknown configuration variable");
            }
        }

        Ok(())
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, TesseraConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.handler.panic_policy, PanicPolicy::InternalError);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"body": {"max_size": 2048}, "handler": {"panic_policy": "internal_error"}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.body.max_size, 2048);
        assert_eq!(config.handler.panic_policy, PanicPolicy::InternalError);
        assert_eq!(config.multipart.max_files, 20);
    }

    #[test]
    fn test_loader_rejects_unknown_field() {
        let toml = r#"
            [body]
            max_bytes = 10
        "#;
        assert!(matches!(
            ConfigLoader::new().with_string(toml, "toml"),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_loader_unsupported_format() {
        assert!(matches!(
            ConfigLoader::new().with_string("", "yaml"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/tessera.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/tessera.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.body.max_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_load_validates() {
        let toml = r#"
            [multipart]
            min_file_size = 100
            max_file_size = 10
        "#;
        let loader = ConfigLoader::new().with_string(toml, "toml").unwrap();
        assert!(matches!(
            loader.load(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_unvalidated() {
        let mut config = ConfigLoader::new().load_unvalidated();
        config.multipart.max_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_limits() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__BODY__MAX_SIZE", "1024", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__MULTIPART__MAX_FILES", "5", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__MULTIPART__UPLOAD_DIR", "/var/uploads", "TEST")
            .unwrap();
        assert_eq!(loader.config.body.max_size, 1024);
        assert_eq!(loader.config.multipart.max_files, 5);
        assert_eq!(
            loader.config.multipart.upload_dir,
            Some(PathBuf::from("/var/uploads"))
        );
    }

    #[test]
    fn test_apply_env_var_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__LOGGING__LEVEL", "tessera_middleware=debug", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__LOGGING__JSON_FORMAT", "off", "TEST")
            .unwrap();
        assert_eq!(loader.config.logging.level, "tessera_middleware=debug");
        assert!(!loader.config.logging.json_format);
    }

    #[test]
    fn test_apply_env_var_panic_policy() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__HANDLER__PANIC_POLICY", "INTERNAL_ERROR", "TEST")
            .unwrap();
        assert_eq!(loader.config.handler.panic_policy, PanicPolicy::InternalError);

        let result = loader.apply_env_var("TEST__HANDLER__PANIC_POLICY", "crash", "TEST");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__MULTIPART__MAX_FILES", "many", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_unknown_key_is_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__PORT", "8080", "TEST")
            .unwrap();
        assert_eq!(loader.config, TesseraConfig::default());
    }

    #[test]
    fn test_overrides_skip_other_prefixes() {
        let mut loader = ConfigLoader::new();
        let vars = vec![
            ("TESSERAX__BODY__MAX_SIZE".to_string(), "oops".to_string()),
            ("TESSERA__BODY__MAX_SIZE".to_string(), "64".to_string()),
        ];
        loader.apply_overrides("TESSERA", vars).unwrap();
        assert_eq!(loader.config.body.max_size, 64);
    }
}
