//! Streaming body accumulation and the built-in textual parsers.
//!
//! Every textual parser funnels through [`accumulate_body`], which reads
//! the stream chunk by chunk and gives up the moment the accumulated size
//! would exceed the ceiling. The stream is dropped at that point, so no
//! further data is pulled from the transport.

use crate::content_type::ContentType;
use crate::options::ParserOptions;
use crate::query::pairs_to_object;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use tessera_core::schema::FileSchema;
use tessera_core::{BodyStream, BoxFuture, Files, TesseraError};

/// Everything a parser gets besides the stream.
#[derive(Debug, Clone)]
pub struct ParseInput {
    /// The resolved content type.
    pub content_type: ContentType,
    /// The route's file schema, if any.
    pub files: Option<FileSchema>,
    /// Parser limits.
    pub options: ParserOptions,
}

/// What a parser produced.
#[derive(Debug, Clone, Default)]
pub struct ParsedBody {
    /// The parsed body, if any.
    pub body: Option<Value>,
    /// Uploaded files.
    pub files: Files,
    /// Set when every body value arrived as text (forms), so schema
    /// validation converts strings to the declared scalar types.
    pub form_encoded: bool,
}

impl ParsedBody {
    /// Creates a result holding just a body.
    #[must_use]
    pub fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }
}

/// A streaming body parser for one content type.
pub trait BodyParser: Send + Sync + 'static {
    /// Consumes the stream and produces the parsed body.
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>>;
}

/// Adapts an async closure into a [`BodyParser`].
///
/// # Example
///
/// ```
/// use tessera_extract::{accumulate_body, FnBodyParser, ParsedBody};
/// use serde_json::json;
///
/// let csv = FnBodyParser::new(|stream, input| async move {
///     let bytes = accumulate_body(stream, input.options.max_body_size).await?;
///     let rows: Vec<String> = String::from_utf8_lossy(&bytes)
///         .lines()
///         .map(str::to_string)
///         .collect();
///     Ok::<_, tessera_core::TesseraError>(ParsedBody::body(json!(rows)))
/// });
/// # let _ = csv;
/// ```
pub struct FnBodyParser<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnBodyParser<F, Fut>
where
    F: Fn(BodyStream, ParseInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ParsedBody, TesseraError>> + Send + 'static,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, Fut> BodyParser for FnBodyParser<F, Fut>
where
    F: Fn(BodyStream, ParseInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ParsedBody, TesseraError>> + Send + 'static,
{
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>> {
        Box::pin((self.f)(stream, input))
    }
}

/// Reads a body stream to the end under a size ceiling.
///
/// Fails with Payload Too Large as soon as the next chunk would push the
/// total past `limit`; the buffer never grows beyond `limit`. Stream errors
/// fail with Bad Request.
pub async fn accumulate_body(mut stream: BodyStream, limit: u64) -> Result<Bytes, TesseraError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            TesseraError::bad_request(format!("Failed to read the request body: {e}"))
        })?;
        if (buffer.len() + chunk.len()) as u64 > limit {
            drop(stream);
            tracing::debug!(limit, received = buffer.len() + chunk.len(), "request body exceeds limit");
            return Err(TesseraError::payload_too_large(limit));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// Decodes bytes in the given charset.
///
/// UTF-8 and Latin-1 (`latin1`, `binary`, `iso-8859-1`) are supported;
/// other charsets fail with Unsupported Media Type.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String, TesseraError> {
    match charset.unwrap_or("utf8").to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" | "us-ascii" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|_| TesseraError::bad_request("The request body is not valid UTF-8!")),
        "latin1" | "binary" | "iso-8859-1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        other => Err(TesseraError::unsupported_media_type(format!(
            "charset={other}"
        ))),
    }
}

/// Removes every object key named `__proto__`, recursively.
#[must_use]
pub fn strip_proto_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "__proto__")
                .map(|(key, v)| (key, strip_proto_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_proto_keys).collect()),
        other => other,
    }
}

/// Parser for `application/json`.
///
/// JSON text is UTF-8 on the wire, so the bytes are decoded as such
/// whatever charset the header resolved to. An empty body parses to no
/// body at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl BodyParser for JsonParser {
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>> {
        Box::pin(async move {
            let bytes = accumulate_body(stream, input.options.max_body_size).await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(ParsedBody::default());
            }
            let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                TesseraError::bad_request(format!("The request body is not valid JSON: {e}"))
            })?;
            Ok(ParsedBody::body(strip_proto_keys(value)))
        })
    }
}

/// Parser for `application/x-www-form-urlencoded`.
///
/// Percent-escapes are decoded to bytes, which are then read in the
/// charset the header resolved to.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedParser;

impl BodyParser for UrlEncodedParser {
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>> {
        Box::pin(async move {
            let bytes = accumulate_body(stream, input.options.max_body_size).await?;
            let pairs = form_pairs(&bytes, input.content_type.charset())?;
            Ok(ParsedBody {
                body: Some(Value::Object(pairs_to_object(pairs))),
                files: Files::new(),
                form_encoded: true,
            })
        })
    }
}

fn form_pairs(bytes: &[u8], charset: Option<&str>) -> Result<Vec<(String, String)>, TesseraError> {
    let utf8 = charset.map_or(true, |c| c.eq_ignore_ascii_case("utf8") || c.eq_ignore_ascii_case("utf-8"));
    if utf8 {
        return serde_urlencoded::from_bytes(bytes).map_err(|e| {
            TesseraError::bad_request(format!("The request body is not a valid form: {e}"))
        });
    }
    bytes
        .split(|&b| b == b'&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, |&b| b == b'=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            Ok((form_component(key, charset)?, form_component(value, charset)?))
        })
        .collect()
}

fn form_component(raw: &[u8], charset: Option<&str>) -> Result<String, TesseraError> {
    let spaced: Vec<u8> = raw.iter().map(|&b| if b == b'+' { b' ' } else { b }).collect();
    decode_text(&urlencoding::decode_binary(&spaced), charset)
}

/// Parser for `text/plain`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl BodyParser for TextParser {
    fn parse(
        &self,
        stream: BodyStream,
        input: ParseInput,
    ) -> BoxFuture<'static, Result<ParsedBody, TesseraError>> {
        Box::pin(async move {
            let bytes = accumulate_body(stream, input.options.max_body_size).await?;
            let text = decode_text(&bytes, input.content_type.charset())?;
            Ok(ParsedBody::body(Value::String(text)))
        })
    }
}
