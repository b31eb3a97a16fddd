//! Parser limits.

use std::path::PathBuf;

/// Default maximum body size (50 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 50 * 1024 * 1024;

/// Default maximum size of one uploaded file (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default maximum size of all uploaded files together (50 MiB).
pub const DEFAULT_MAX_TOTAL_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default minimum file size; empty files are rejected.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 1;

/// Default maximum number of uploaded files.
pub const DEFAULT_MAX_FILES: usize = 20;

/// Limits applied to `multipart/form-data` bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartLimits {
    /// Maximum size of one file in bytes.
    pub max_file_size: u64,
    /// Maximum size of all files in bytes.
    pub max_total_file_size: u64,
    /// Minimum size of one file in bytes.
    pub min_file_size: u64,
    /// Maximum number of files.
    pub max_files: usize,
    /// Directory files are persisted to, if any.
    pub upload_dir: Option<PathBuf>,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_file_size: DEFAULT_MAX_TOTAL_FILE_SIZE,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            upload_dir: None,
        }
    }
}

/// Options handed to every body parser.
///
/// # Example
///
/// ```
/// use tessera_extract::ParserOptions;
///
/// let options = ParserOptions::new().max_body_size(1024).max_files(2);
/// assert_eq!(options.max_body_size, 1024);
/// assert_eq!(options.multipart.max_files, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum body size in bytes.
    pub max_body_size: u64,
    /// Multipart limits.
    pub multipart: MultipartLimits,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            multipart: MultipartLimits::default(),
        }
    }
}

impl ParserOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum body size.
    #[must_use]
    pub const fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Sets the per-file ceiling.
    #[must_use]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.multipart.max_file_size = bytes;
        self
    }

    /// Sets the total file ceiling.
    #[must_use]
    pub const fn max_total_file_size(mut self, bytes: u64) -> Self {
        self.multipart.max_total_file_size = bytes;
        self
    }

    /// Sets the minimum file size.
    #[must_use]
    pub const fn min_file_size(mut self, bytes: u64) -> Self {
        self.multipart.min_file_size = bytes;
        self
    }

    /// Sets the maximum file count.
    #[must_use]
    pub const fn max_files(mut self, count: usize) -> Self {
        self.multipart.max_files = count;
        self
    }

    /// Sets the upload directory.
    #[must_use]
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.multipart.upload_dir = Some(dir.into());
        self
    }
}
