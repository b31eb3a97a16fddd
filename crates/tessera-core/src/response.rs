//! Pipeline responses.
//!
//! A [`Response`] is what every pipeline stage produces when it ends the
//! request: a status, a payload and the [`InterceptionMoment`] that explains
//! which stage produced it.

use crate::error::{ErrorDetail, TesseraError};
use crate::moment::InterceptionMoment;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

/// A response payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// A JSON body.
    Json(Value),
    /// A UTF-8 text body.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
}

impl Payload {
    /// Serializes a value into a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, TesseraError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| TesseraError::internal_with_source("Failed to serialize payload", e))
    }

    /// Returns `true` for [`Payload::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the JSON value, if this is a JSON payload.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Json(_) => Some("application/json"),
            Self::Text(_) => Some("text/plain; charset=utf-8"),
            Self::Bytes(_) => Some("application/octet-stream"),
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Json(v) => Bytes::from(v.to_string()),
            Self::Text(s) => Bytes::from(s),
            Self::Bytes(b) => b,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<()> for Payload {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// The outcome of a request.
///
/// # Example
///
/// ```
/// use tessera_core::{Response, TesseraError};
/// use serde_json::json;
///
/// let ok = Response::ok(json!({"id": 1}));
/// assert_eq!(ok.status(), 200);
/// assert!(!ok.is_error());
///
/// let denied = Response::error(&TesseraError::unauthorized("nope"));
/// assert_eq!(denied.status(), 401);
/// assert!(denied.is_error());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    payload: Payload,
    headers: HeaderMap,
    error: Option<ErrorDetail>,
    moment: Option<InterceptionMoment>,
}

impl Response {
    /// Creates a 200 response.
    pub fn ok(payload: impl Into<Payload>) -> Self {
        Self::with_status(StatusCode::OK, payload)
    }

    /// Creates a response with an explicit status.
    pub fn with_status(status: StatusCode, payload: impl Into<Payload>) -> Self {
        Self {
            status,
            payload: payload.into(),
            headers: HeaderMap::new(),
            error: None,
            moment: None,
        }
    }

    /// Creates an error response from an error kind.
    ///
    /// The body is the JSON error detail; internal details never leak.
    #[must_use]
    pub fn error(err: &TesseraError) -> Self {
        let detail = err.to_detail();
        let body = serde_json::json!({ "error": &detail });
        Self {
            status: err.status_code(),
            payload: Payload::Json(body),
            headers: HeaderMap::new(),
            error: Some(detail),
            moment: None,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the payload.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replaces the payload.
    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns mutable headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns the error detail, for responses built from an error.
    #[must_use]
    pub const fn error_detail(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// Returns `true` if the status is 400 or above.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// Returns the moment that produced this response, once set.
    #[must_use]
    pub const fn moment(&self) -> Option<InterceptionMoment> {
        self.moment
    }

    /// Tags the response with the moment that produced it.
    pub fn set_moment(&mut self, moment: InterceptionMoment) {
        self.moment = Some(moment);
    }

    /// Converts into an `http` response, merging `extra` headers first.
    #[must_use]
    pub fn into_http(self, extra: HeaderMap) -> http::Response<Full<Bytes>> {
        let content_type = self.payload.content_type();
        let mut response = http::Response::new(Full::new(self.payload.into_bytes()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        let mut last = None;
        for (name, value) in extra {
            // Repeated values arrive with `None` after the first one.
            if let Some(name) = name {
                last = Some(name);
            }
            if let Some(name) = &last {
                headers.append(name.clone(), value);
            }
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        if let Some(content_type) = content_type {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }
        response
    }
}

/// What a route handler or interceptor produced on success.
#[derive(Debug)]
pub enum Reply {
    /// A payload to wrap in a 200 response.
    Payload(Payload),
    /// A complete response.
    Response(Response),
}

impl Reply {
    /// Converts into a response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Payload(payload) => Response::ok(payload),
            Self::Response(response) => response,
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Payload> for Reply {
    fn from(payload: Payload) -> Self {
        Self::Payload(payload)
    }
}

macro_rules! reply_from_payload {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Self::Payload(value.into())
                }
            }
        )*
    };
}

reply_from_payload!(Value, String, &'static str, Bytes, ());
