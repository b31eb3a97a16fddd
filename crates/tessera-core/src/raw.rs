//! The raw transport exchange and raw interceptors.
//!
//! A [`RawExchange`] is what the transport hands the pipeline: method, URI,
//! headers and a body stream, plus the response headers staged for sending
//! and a typed extension map. Raw interceptors see it before any typed
//! processing happens.

use crate::error::TesseraError;
use crate::request::Request;
use crate::response::Response;
use bytes::Bytes;
use futures_core::Stream;
use futures_util::TryStreamExt;
use http::{Extensions, HeaderMap, Method, Uri};
use http_body_util::BodyExt;
use std::future::Future;
use std::io;
use std::pin::Pin;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + 'static>>;

/// Returns a stream that yields nothing.
#[must_use]
pub fn empty_body() -> BodyStream {
    Box::pin(futures_util::stream::empty())
}

/// The raw request as received from the transport.
pub struct RawExchange {
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    body: Option<BodyStream>,
    /// Headers merged into whatever response is finally sent.
    pub response_headers: HeaderMap,
    /// Typed transport data.
    pub extensions: Extensions,
}

impl RawExchange {
    /// Creates an exchange from its parts.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            method,
            uri,
            headers,
            body: Some(body),
            response_headers: HeaderMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// Adapts any `http` request whose body yields `Bytes`.
    pub fn from_http<B>(request: http::Request<B>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();
        let stream = body.into_data_stream().map_err(io::Error::other);
        let mut exchange = Self::new(parts.method, parts.uri, parts.headers, Box::pin(stream));
        exchange.extensions = parts.extensions;
        exchange
    }

    /// Takes the body stream; later calls get an empty stream.
    pub fn take_body(&mut self) -> BodyStream {
        self.body.take().unwrap_or_else(empty_body)
    }

    /// Returns `true` if the body has already been taken.
    #[must_use]
    pub const fn body_taken(&self) -> bool {
        self.body.is_none()
    }

    /// Returns a header as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl std::fmt::Debug for RawExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawExchange")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body_taken", &self.body.is_none())
            .finish_non_exhaustive()
    }
}

/// What a raw interceptor decided.
#[derive(Debug)]
pub enum RawFlow {
    /// Proceed to the next stage.
    Continue,
    /// Stop and answer with this response.
    Respond(Response),
    /// Stop and answer with this error.
    Reject(TesseraError),
}

impl From<Result<(), TesseraError>> for RawFlow {
    fn from(result: Result<(), TesseraError>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(err) => Self::Reject(err),
        }
    }
}

/// A transport-level interceptor.
///
/// Raw interceptors run after the request is forged and before typed
/// request interceptors. They may read or mutate the exchange and the
/// request.
pub trait RawInterceptor: Send + Sync + 'static {
    /// Returns a name for logging.
    fn name(&self) -> &str;

    /// Inspects the exchange.
    fn intercept<'a>(
        &'a self,
        exchange: &'a mut RawExchange,
        request: &'a mut Request,
    ) -> BoxFuture<'a, RawFlow>;
}
