//! Content negotiation and body validation.

use crate::body::{ParseInput, ParsedBody};
use crate::content_type::resolve_content_type;
use crate::multipart::discard_uploads;
use crate::options::ParserOptions;
use crate::registry::BodyParserRegistry;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_core::schema::{BodySchema, FileSchema};
use tessera_core::{
    BodyStream, BoxFuture, Files, RawExchange, RawFlow, RawInterceptor, Request, TesseraError,
};

/// A parsed and validated body.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBody {
    /// The validated body, if one was sent.
    pub body: Option<Value>,
    /// Uploaded files.
    pub files: Files,
}

/// Negotiates, parses and validates a request body.
///
/// 1. The `Content-Type` header is resolved; a missing header fails with
///    Unsupported Media Type.
/// 2. A parser is looked up; none fails with Unsupported Media Type.
/// 3. If the body schema restricts the accepted types and the actual type
///    is not among them, the call fails with Bad Request.
/// 4. File fields require `multipart/form-data`.
/// 5. The body is parsed, then checked against the body and file schemas.
///
/// Files persisted to an upload directory are removed again when the body
/// is rejected.
pub async fn read_body(
    headers: &HeaderMap,
    stream: BodyStream,
    body_schema: Option<&BodySchema>,
    file_schema: Option<&FileSchema>,
    registry: &BodyParserRegistry,
    options: &ParserOptions,
) -> Result<ValidatedBody, TesseraError> {
    let raw = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| TesseraError::unsupported_media_type("none"))?;
    let content_type = resolve_content_type(raw)?;

    let parser = registry
        .get(content_type.mime())
        .ok_or_else(|| TesseraError::unsupported_media_type(content_type.mime()))?;

    if let Some(schema) = body_schema {
        if !schema.accepts(content_type.mime()) {
            return Err(TesseraError::bad_request_with_details(
                format!(
                    "This route does not accept \"{}\" bodies! Accepted content types: {}",
                    content_type.mime(),
                    schema.accepted().join(", ")
                ),
                json!({ "source": "body", "accepted": schema.accepted() }),
            ));
        }
    }
    if file_schema.is_some() && !content_type.is_multipart() {
        return Err(TesseraError::bad_request(format!(
            "This route expects files, which must be sent as multipart/form-data, not \"{}\"!",
            content_type.mime()
        )));
    }

    tracing::debug!(content_type = %content_type.mime(), "parsing request body");
    let parsed = parser
        .parse(
            stream,
            ParseInput {
                content_type,
                files: file_schema.cloned(),
                options: options.clone(),
            },
        )
        .await?;

    let ParsedBody {
        body,
        files,
        form_encoded,
    } = parsed;
    match check(body, form_encoded, &files, body_schema, file_schema) {
        Ok(body) => Ok(ValidatedBody { body, files }),
        Err(err) => {
            discard_uploads(&files).await;
            Err(err)
        }
    }
}

fn check(
    body: Option<Value>,
    form_encoded: bool,
    files: &Files,
    body_schema: Option<&BodySchema>,
    file_schema: Option<&FileSchema>,
) -> Result<Option<Value>, TesseraError> {
    let body = match body_schema {
        Some(schema) => {
            let value = body.unwrap_or(Value::Null);
            let validated = schema.validate(&value, form_encoded).map_err(|violation| {
                TesseraError::bad_request_with_details(
                    format!("The request body could not be validated! {violation}"),
                    json!({
                        "source": "body",
                        "path": violation.path,
                        "expected": schema.describe(),
                    }),
                )
            })?;
            Some(validated)
        }
        None => body,
    };

    if let Some(schema) = file_schema {
        schema.validate(files)?;
    }

    Ok(body)
}

/// Raw interceptor that reads the body off the exchange.
///
/// Takes the exchange's body stream, so it should run once per request.
#[derive(Debug, Clone)]
pub struct BodyInterceptor {
    body: Option<BodySchema>,
    files: Option<FileSchema>,
    registry: Arc<BodyParserRegistry>,
    options: ParserOptions,
}

impl BodyInterceptor {
    /// Creates an interceptor with the default parsers and limits.
    #[must_use]
    pub fn new(body: Option<BodySchema>, files: Option<FileSchema>) -> Self {
        Self {
            body,
            files,
            registry: Arc::new(BodyParserRegistry::with_defaults()),
            options: ParserOptions::default(),
        }
    }

    /// Uses a shared parser registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<BodyParserRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets parser limits.
    #[must_use]
    pub fn options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }
}

impl RawInterceptor for BodyInterceptor {
    fn name(&self) -> &str {
        "body-parser"
    }

    fn intercept<'a>(
        &'a self,
        exchange: &'a mut RawExchange,
        request: &'a mut Request,
    ) -> BoxFuture<'a, RawFlow> {
        Box::pin(async move {
            let stream = exchange.take_body();
            let result = read_body(
                &exchange.headers,
                stream,
                self.body.as_ref(),
                self.files.as_ref(),
                &self.registry,
                &self.options,
            )
            .await;
            match result {
                Ok(validated) => {
                    request.set_body(validated.body);
                    request.set_files(validated.files);
                    RawFlow::Continue
                }
                Err(err) => RawFlow::Reject(err),
            }
        })
    }
}
