//! Test client for in-memory pipeline testing.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use tessera_core::{RawExchange, UrlParams};
use tessera_middleware::Handler;

use crate::error::TestError;
use crate::request::{MultipartForm, TestRequest};
use crate::response::TestResponse;

/// Sends requests straight into a [`Handler`].
///
/// No server or socket is involved; each request is turned into a
/// [`RawExchange`] and run through the full pipeline. The client is cheap to
/// clone and can be shared between tasks.
///
/// # Example
///
/// ```
/// use tessera_core::di::Container;
/// use tessera_core::{Request, TesseraError};
/// use tessera_middleware::{handler_fn, Handler, Route, Services};
/// use tessera_test::TestClient;
/// use http::{Method, StatusCode};
///
/// # tokio_test::block_on(async {
/// let route = Route::builder(Method::GET, "/ping")
///     .handler(handler_fn(|_: &Request, _: Services| async {
///         Ok::<_, TesseraError>("pong")
///     }))
///     .build();
/// let client = TestClient::new(Handler::new(&Container::new(), route));
///
/// client
///     .get("/ping")
///     .send()
///     .await
///     .assert_status(StatusCode::OK)
///     .assert_text("pong");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    handler: Arc<Handler>,
    url_params: UrlParams,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client around a handler.
    pub fn new(handler: Handler) -> Self {
        Self {
            handler: Arc::new(handler),
            url_params: UrlParams::new(),
            default_headers: Vec::new(),
        }
    }

    /// Sets a URL parameter the router would have extracted.
    pub fn with_url_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(name.into(), Some(value.into()));
        self
    }

    /// Adds a default header that will be included in all requests.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, path: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, path)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, path)
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, path: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::new(method, path))
    }

    /// Runs a prepared exchange through the handler.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::BodyRead`] if the response body cannot be read.
    pub async fn execute(&self, mut exchange: RawExchange) -> Result<TestResponse, TestError> {
        let response = self.handler.process(&mut exchange, &self.url_params).await;
        let moment = response.moment();
        let response = response.into_http(std::mem::take(&mut exchange.response_headers));
        Ok(TestResponse::from_http(response).await?.with_moment(moment))
    }
}

/// A request builder bound to a test client.
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    request: TestRequest,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, request: TestRequest) -> Self {
        let mut request = request;
        for (name, value) in &client.default_headers {
            request = request.header(name, value);
        }
        Self { client, request }
    }

    fn map(mut self, f: impl FnOnce(TestRequest) -> TestRequest) -> Self {
        self.request = f(self.request);
        self
    }

    /// Sets a header on the request.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|r| r.header(name, value))
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.map(|r| r.content_type(content_type))
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.map(|r| r.bearer_token(token))
    }

    /// Adds a cookie.
    pub fn cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|r| r.cookie(name, value))
    }

    /// Adds a query parameter.
    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map(|r| r.query(key, value))
    }

    /// Sets the raw request body.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.map(|r| r.body(body))
    }

    /// Sets a `text/plain` body.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.map(|r| r.text(text))
    }

    /// Sets the request body as JSON.
    pub fn json<T: Serialize>(self, value: &T) -> Self {
        self.map(|r| r.json(value))
    }

    /// Sets the request body as form-urlencoded.
    pub fn form<T: Serialize>(self, value: &T) -> Self {
        self.map(|r| r.form(value))
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(self, form: MultipartForm) -> Self {
        self.map(|r| r.multipart(form))
    }

    /// Delivers the body in chunks of at most `size` bytes.
    pub fn chunked(self, size: usize) -> Self {
        self.map(|r| r.chunked(size))
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let exchange = self.request.build()?;
        self.client.execute(exchange).await
    }
}
