//! Uploaded files.

use bytes::Bytes;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Files of a request, grouped by form field name.
pub type Files = IndexMap<String, Vec<UploadedFile>>;

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The form field the file was sent under.
    pub field: String,
    /// The client-supplied file name, if any.
    pub file_name: Option<String>,
    /// The part's declared content type, if any.
    pub content_type: Option<String>,
    /// The file contents.
    pub data: Bytes,
    /// Where the file was persisted, when an upload directory is configured.
    pub path: Option<PathBuf>,
}

impl UploadedFile {
    /// Returns the file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
