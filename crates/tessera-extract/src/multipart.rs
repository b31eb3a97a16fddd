//! `multipart/form-data` parsing.
//!
//! Parts are streamed through [`multer`]. Parts with a file name become
//! [`UploadedFile`]s; every other part becomes a string field of the body.
//! Size limits are checked while chunks arrive, so an oversized upload is
//! rejected without buffering it.

use crate::body::{BodyParser, ParseInput, ParsedBody};
use crate::query::pairs_to_object;
use bytes::BytesMut;
use serde_json::Value;
use std::path::Path;
use tessera_core::schema::FileSchema;
use tessera_core::{BodyStream, BoxFuture, Files, TesseraError, UploadedFile};
use uuid::Uuid;

/// Parser for `multipart/form-data`.
///
/// Limits come from the route's file schema when it declares them,
/// otherwise from [`ParserOptions::multipart`](crate::ParserOptions).
/// When a file schema is present, files sent under undeclared fields are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartParser;

impl BodyParser for MultipartParser {
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>> {
        Box::pin(parse_multipart(stream, input))
    }
}

struct Limits {
    max_file_size: u64,
    max_total_file_size: u64,
    min_file_size: u64,
    max_files: usize,
}

async fn parse_multipart(stream: BodyStream, input: ParseInput) -> Result<ParsedBody, TesseraError> {
    let boundary = input
        .content_type
        .boundary()
        .ok_or_else(|| {
            TesseraError::bad_request(
                "A multipart/form-data request must declare a boundary in its Content-Type header!",
            )
        })?
        .to_string();

    let defaults = &input.options.multipart;
    let schema = input.files.as_ref();
    let limits = Limits {
        max_file_size: schema
            .and_then(|s| s.max_file_size)
            .unwrap_or(defaults.max_file_size),
        max_total_file_size: schema
            .and_then(|s| s.max_total_file_size)
            .unwrap_or(defaults.max_total_file_size),
        min_file_size: defaults.min_file_size,
        max_files: schema.and_then(|s| s.max_files).unwrap_or(defaults.max_files),
    };
    let upload_dir = schema
        .and_then(|s| s.upload_dir.clone())
        .or_else(|| defaults.upload_dir.clone());

    let constraints = multer::Constraints::new().size_limit(
        multer::SizeLimit::new().whole_stream(input.options.max_body_size),
    );
    let multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    let mut files = Files::new();
    match read_parts(multipart, &limits, schema, upload_dir.as_deref(), &mut files).await {
        Ok(fields) => {
            let body = (!fields.is_empty()).then(|| Value::Object(pairs_to_object(fields)));
            Ok(ParsedBody {
                body,
                files,
                form_encoded: true,
            })
        }
        Err(err) => {
            discard_uploads(&files).await;
            Err(err)
        }
    }
}

async fn read_parts(
    mut multipart: multer::Multipart<'static>,
    limits: &Limits,
    schema: Option<&FileSchema>,
    upload_dir: Option<&Path>,
    files: &mut Files,
) -> Result<Vec<(String, String)>, TesseraError> {
    let mut fields = Vec::new();
    let mut file_count = 0usize;
    let mut total = 0u64;

    while let Some(mut field) = multipart.next_field().await.map_err(map_multer_error)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field.text().await.map_err(map_multer_error)?;
            fields.push((name, text));
            continue;
        };

        if let Some(schema) = schema {
            if !schema.declares(&name) {
                tracing::debug!(field = %name, "skipping undeclared file field");
                continue;
            }
        }

        file_count += 1;
        if file_count > limits.max_files {
            return Err(TesseraError::bad_request(format!(
                "Too many files were uploaded, at most {} are accepted",
                limits.max_files
            )));
        }

        let content_type = field.content_type().map(ToString::to_string);
        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(map_multer_error)? {
            let size = (data.len() + chunk.len()) as u64;
            if size > limits.max_file_size {
                tracing::debug!(field = %name, limit = limits.max_file_size, "uploaded file exceeds limit");
                return Err(TesseraError::payload_too_large(limits.max_file_size));
            }
            if total + size > limits.max_total_file_size {
                tracing::debug!(limit = limits.max_total_file_size, "uploaded files exceed total limit");
                return Err(TesseraError::payload_too_large(limits.max_total_file_size));
            }
            data.extend_from_slice(&chunk);
        }
        let size = data.len() as u64;
        if size < limits.min_file_size {
            return Err(TesseraError::bad_request(format!(
                "The file \"{file_name}\" sent as \"{name}\" is smaller than {} bytes",
                limits.min_file_size
            )));
        }
        total += size;

        let mut file = UploadedFile {
            field: name.clone(),
            file_name: Some(file_name),
            content_type,
            data: data.freeze(),
            path: None,
        };
        if let Some(dir) = upload_dir {
            file.path = Some(persist(dir, &file).await?);
        }
        files.entry(name).or_default().push(file);
    }

    Ok(fields)
}

/// Removes every persisted file of a rejected request.
///
/// Files kept only in memory are ignored. Removal failures are logged.
pub async fn discard_uploads(files: &Files) {
    for file in files.values().flatten() {
        let Some(path) = &file.path else { continue };
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "discarded uploaded file"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to discard uploaded file");
            }
        }
    }
}

async fn persist(dir: &Path, file: &UploadedFile) -> Result<std::path::PathBuf, TesseraError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| TesseraError::internal_with_source("Failed to create the upload directory", e))?;
    let path = dir.join(Uuid::now_v7().to_string());
    tokio::fs::write(&path, &file.data)
        .await
        .map_err(|e| TesseraError::internal_with_source("Failed to persist an uploaded file", e))?;
    tracing::debug!(field = %file.field, path = %path.display(), "persisted uploaded file");
    Ok(path)
}

fn map_multer_error(err: multer::Error) -> TesseraError {
    match err {
        multer::Error::StreamSizeExceeded { limit } => TesseraError::payload_too_large(limit),
        multer::Error::FieldSizeExceeded { limit, .. } => TesseraError::payload_too_large(limit),
        other => TesseraError::bad_request(format!("The multipart body is malformed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_type::resolve_content_type;
    use crate::options::ParserOptions;
    use bytes::Bytes;
    use serde_json::json;
    use std::io;
    use tessera_core::schema::FileSchema;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn part(name: &str, file_name: Option<&str>, data: &str) -> String {
        let disposition = match file_name {
            Some(f) => format!("form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: text/plain"),
            None => format!("form-data; name=\"{name}\""),
        };
        format!("--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\n\r\n{data}\r\n")
    }

    fn body(parts: &[String]) -> BodyStream {
        let text = format!("{}--{BOUNDARY}--\r\n", parts.concat());
        Box::pin(futures_util::stream::iter(vec![Ok::<_, io::Error>(Bytes::from(text))]))
    }

    fn input(files: Option<FileSchema>, options: ParserOptions) -> ParseInput {
        ParseInput {
            content_type: resolve_content_type(&format!("multipart/form-data; boundary={BOUNDARY}"))
                .unwrap(),
            files,
            options,
        }
    }

    #[tokio::test]
    async fn test_fields_and_files() {
        let parsed = MultipartParser
            .parse(
                body(&[
                    part("title", None, "hello"),
                    part("doc", Some("a.txt"), "abc"),
                    part("doc", Some("b.txt"), "def"),
                ]),
                input(None, ParserOptions::default()),
            )
            .await
            .unwrap();
        assert_eq!(parsed.body.unwrap(), json!({"title": "hello"}));
        assert_eq!(parsed.files["doc"].len(), 2);
        assert_eq!(parsed.files["doc"][1].file_name.as_deref(), Some("b.txt"));
        assert_eq!(&parsed.files["doc"][0].data[..], b"abc");
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let err = MultipartParser
            .parse(
                body(&[part("doc", Some("a.txt"), "")]),
                input(None, ParserOptions::default()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_file_size_limit() {
        let err = MultipartParser
            .parse(
                body(&[part("doc", Some("a.txt"), "0123456789")]),
                input(None, ParserOptions::default().max_file_size(4)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_total_size_limit() {
        let err = MultipartParser
            .parse(
                body(&[part("a", Some("a.txt"), "1234"), part("b", Some("b.txt"), "5678")]),
                input(None, ParserOptions::default().max_total_file_size(6)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_max_files() {
        let err = MultipartParser
            .parse(
                body(&[part("a", Some("a.txt"), "1"), part("a", Some("b.txt"), "2")]),
                input(None, ParserOptions::default().max_files(1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_schema_limits_override_options() {
        let schema = FileSchema::new().required("doc").max_file_size(2);
        let err = MultipartParser
            .parse(
                body(&[part("doc", Some("a.txt"), "abc")]),
                input(Some(schema), ParserOptions::default()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_undeclared_file_fields_skipped() {
        let schema = FileSchema::new().required("doc");
        let parsed = MultipartParser
            .parse(
                body(&[part("doc", Some("a.txt"), "abc"), part("other", Some("b.txt"), "def")]),
                input(Some(schema), ParserOptions::default()),
            )
            .await
            .unwrap();
        assert!(parsed.files.contains_key("doc"));
        assert!(!parsed.files.contains_key("other"));
    }

    #[tokio::test]
    async fn test_persists_to_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let parsed = MultipartParser
            .parse(
                body(&[part("doc", Some("a.txt"), "abc")]),
                input(None, ParserOptions::default().upload_dir(dir.path())),
            )
            .await
            .unwrap();
        let path = parsed.files["doc"][0].path.clone().unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_failure_after_persisting_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = MultipartParser
            .parse(
                body(&[
                    part("a", Some("a.txt"), "1"),
                    part("b", Some("b.txt"), "2"),
                    part("c", Some("c.txt"), "3"),
                ]),
                input(None, ParserOptions::default().upload_dir(dir.path()).max_files(2)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let stream: BodyStream = Box::pin(futures_util::stream::iter(vec![Ok::<_, io::Error>(
            Bytes::from(format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\ntruncated"
            )),
        )]));
        let err = MultipartParser
            .parse(stream, input(None, ParserOptions::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
