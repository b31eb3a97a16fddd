//! Test request building.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use tessera_core::{BodyStream, RawExchange};

use crate::error::TestError;

/// A fluent builder for the [`RawExchange`] a handler receives.
///
/// The body is delivered as a stream; [`TestRequest::chunked`] splits it
/// into small chunks to exercise streaming accumulation.
///
/// # Example
///
/// ```
/// use tessera_test::TestRequest;
/// use serde_json::json;
///
/// let exchange = TestRequest::post("/users")
///     .query("notify", "true")
///     .header("x-api-key", "secret")
///     .json(&json!({"name": "Alice"}))
///     .build()
///     .unwrap();
///
/// assert_eq!(exchange.uri.query(), Some("notify=true"));
/// assert_eq!(exchange.header("content-type"), Some("application/json"));
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    chunk_size: Option<usize>,
    error: Option<TestError>,
}

impl TestRequest {
    /// Creates a request builder.
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        Self {
            method,
            path: path.as_ref().to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            chunk_size: None,
            error: None,
        }
    }

    /// Creates a new GET request.
    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a new POST request.
    pub fn post(path: impl AsRef<str>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a new PUT request.
    pub fn put(path: impl AsRef<str>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a new PATCH request.
    pub fn patch(path: impl AsRef<str>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a new DELETE request.
    pub fn delete(path: impl AsRef<str>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets a header, replacing earlier values.
    ///
    /// An invalid name or value is reported by [`TestRequest::build`].
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Adds a cookie to the Cookie header.
    pub fn cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let pair = format!("{}={}", name.as_ref(), value.as_ref());
        let cookie = match self
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{existing}; {pair}"),
            None => pair,
        };
        self.header(header::COOKIE.as_str(), cookie)
    }

    /// Adds a query parameter; it is percent-encoded on build.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a `text/plain` body.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(text.into())
            .content_type("text/plain; charset=utf-8")
    }

    /// Sets the request body as JSON.
    ///
    /// This also sets the `Content-Type` header to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Bytes::from(bytes),
            Err(e) => self.fail(e.into()),
        }
        self.content_type("application/json")
    }

    /// Sets the request body as form-urlencoded.
    ///
    /// This also sets the `Content-Type` header to `application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => self.body = Bytes::from(encoded),
            Err(e) => self.fail(e.into()),
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(self, form: MultipartForm) -> Self {
        let content_type = form.content_type();
        self.body(form.into_body()).content_type(content_type)
    }

    /// Delivers the body in chunks of at most `size` bytes.
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Builds the exchange.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by the builder methods, or
    /// [`TestError::RequestBuild`] if the URI does not parse.
    pub fn build(self) -> Result<RawExchange, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut uri = self.path;
        if !self.query.is_empty() {
            let encoded = serde_urlencoded::to_string(&self.query)?;
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&encoded);
        }
        let uri: Uri = uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        let chunks = split(self.body, self.chunk_size);
        let stream: BodyStream = Box::pin(futures_util::stream::iter(
            chunks.into_iter().map(Ok::<_, io::Error>),
        ));

        Ok(RawExchange::new(self.method, uri, self.headers, stream))
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn split(body: Bytes, size: Option<usize>) -> Vec<Bytes> {
    if body.is_empty() {
        return Vec::new();
    }
    match size {
        Some(size) => {
            let mut chunks = Vec::with_capacity(body.len().div_ceil(size));
            let mut rest = body;
            while rest.len() > size {
                chunks.push(rest.split_to(size));
            }
            chunks.push(rest);
            chunks
        }
        None => vec![body],
    }
}

/// Default boundary used by [`MultipartForm`].
pub const DEFAULT_BOUNDARY: &str = "tessera-test-boundary";

#[derive(Debug, Clone)]
enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        data: Bytes,
    },
}

/// A `multipart/form-data` body.
///
/// # Example
///
/// ```
/// use tessera_test::{MultipartForm, TestRequest};
///
/// let form = MultipartForm::new()
///     .text("title", "holiday")
///     .file("photo", "beach.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
///
/// let exchange = TestRequest::post("/albums").multipart(form).build().unwrap();
/// assert!(exchange
///     .header("content-type")
///     .unwrap()
///     .starts_with("multipart/form-data; boundary="));
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates an empty form with the default boundary.
    pub fn new() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
            parts: Vec::new(),
        }
    }

    /// Replaces the boundary.
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    /// The Content-Type header value, boundary included.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Renders the body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        let mut body = BytesMut::new();
        for part in self.parts {
            body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.put_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.put_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    body.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.put_slice(&data);
                }
            }
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body.freeze()
    }
}
