//! File upload schemas.

use crate::error::TesseraError;
use crate::upload::Files;
use indexmap::IndexMap;
use std::path::PathBuf;

/// How many files a field takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one file.
    Single,
    /// Any number of files, optionally capped.
    Many(Option<usize>),
}

/// Rules for one file field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileField {
    /// Whether the field may be absent.
    pub optional: bool,
    /// How many files the field takes.
    pub multiple: Multiplicity,
}

/// Declared file fields and upload limits.
///
/// # Example
///
/// ```
/// use tessera_core::schema::FileSchema;
///
/// let schema = FileSchema::new()
///     .required("avatar")
///     .many("attachments", Some(3))
///     .max_file_size(1024 * 1024);
/// assert_eq!(schema.field_names(), vec!["avatar", "attachments"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSchema {
    fields: IndexMap<String, FileField>,
    /// Directory uploaded files are persisted to.
    pub upload_dir: Option<PathBuf>,
    /// Per-file ceiling in bytes.
    pub max_file_size: Option<u64>,
    /// Ceiling for all files together in bytes.
    pub max_total_file_size: Option<u64>,
    /// Maximum number of files.
    pub max_files: Option<usize>,
}

impl FileSchema {
    /// Creates an empty file schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required single-file field.
    #[must_use]
    pub fn required(self, name: impl Into<String>) -> Self {
        self.field(name, false, Multiplicity::Single)
    }

    /// Declares an optional single-file field.
    #[must_use]
    pub fn optional(self, name: impl Into<String>) -> Self {
        self.field(name, true, Multiplicity::Single)
    }

    /// Declares a required multi-file field.
    #[must_use]
    pub fn many(self, name: impl Into<String>, max: Option<usize>) -> Self {
        self.field(name, false, Multiplicity::Many(max))
    }

    /// Declares a field with explicit rules.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, optional: bool, multiple: Multiplicity) -> Self {
        self.fields
            .insert(name.into(), FileField { optional, multiple });
        self
    }

    /// Sets the upload directory.
    #[must_use]
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    /// Sets the per-file ceiling.
    #[must_use]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Sets the total ceiling.
    #[must_use]
    pub const fn max_total_file_size(mut self, bytes: u64) -> Self {
        self.max_total_file_size = Some(bytes);
        self
    }

    /// Sets the maximum file count.
    #[must_use]
    pub const fn max_files(mut self, count: usize) -> Self {
        self.max_files = Some(count);
        self
    }

    /// Returns the declared fields.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, FileField> {
        &self.fields
    }

    /// Returns the declared field names in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Returns `true` if the field is declared.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Merges `contributor` underneath this schema; this schema wins.
    pub fn absorb(&mut self, contributor: &FileSchema) {
        for (name, field) in &contributor.fields {
            self.fields.entry(name.clone()).or_insert(*field);
        }
        if self.upload_dir.is_none() {
            self.upload_dir.clone_from(&contributor.upload_dir);
        }
        self.max_file_size = self.max_file_size.or(contributor.max_file_size);
        self.max_total_file_size = self.max_total_file_size.or(contributor.max_total_file_size);
        self.max_files = self.max_files.or(contributor.max_files);
    }

    /// Checks received files against the declared fields.
    pub fn validate(&self, files: &Files) -> Result<(), TesseraError> {
        let expected = self.field_names().join(", ");
        for (name, field) in &self.fields {
            let count = files.get(name).map_or(0, Vec::len);
            if count == 0 {
                if field.optional {
                    continue;
                }
                return Err(TesseraError::bad_request_with_details(
                    format!(
                        "This route expects a file field named \"{name}\" to be present! \
                         Expected file fields: {expected}"
                    ),
                    serde_json::json!({ "field": name, "expected": self.field_names() }),
                ));
            }
            match field.multiple {
                Multiplicity::Single if count > 1 => {
                    return Err(TesseraError::bad_request(format!(
                        "The file field \"{name}\" accepts a single file but received {count}"
                    )));
                }
                Multiplicity::Many(Some(max)) if count > max => {
                    return Err(TesseraError::bad_request(format!(
                        "The file field \"{name}\" accepts at most {max} files but received {count}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
