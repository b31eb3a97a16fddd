//! Route descriptors and handler functions.

use crate::guard::GuardStep;
use crate::interceptor::{RequestInterceptorStep, ResponseInterceptorStep};
use crate::services::{DeclaresParameters, Services, Signature};
use http::Method;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::di::Binding;
use tessera_core::schema::{BodySchema, FieldSchema, FileSchema, SchemaSet};
use tessera_core::{BoxFuture, RawInterceptor, Reply, Request, TesseraError};

/// Payload of the handler installed when a route declares none.
pub const DEFAULT_HANDLER_MESSAGE: &str =
    "Default route handler, provide a function to override this behaviour!";

/// The terminal function of a route.
pub trait RouteHandler: Send + Sync + 'static {
    /// Handles the request.
    fn call<'a>(
        &'a self,
        request: &'a Request,
        services: Services,
    ) -> BoxFuture<'a, Result<Reply, TesseraError>>;

    /// Declared parameters; the first one is the request.
    fn parameters(&self) -> Signature {
        Signature::default()
    }
}

impl DeclaresParameters for dyn RouteHandler {
    fn parameters(&self) -> Signature {
        RouteHandler::parameters(self)
    }
}

/// Adapts a closure into a [`RouteHandler`].
///
/// # Example
///
/// ```
/// use tessera_middleware::{handler_fn, Services};
/// use tessera_core::{Request, TesseraError};
/// use serde_json::json;
///
/// let handler = handler_fn(|req: &Request, _: Services| {
///     let path = req.path().to_string();
///     async move { Ok::<_, TesseraError>(json!({ "path": path })) }
/// });
/// # let _ = handler;
/// ```
pub struct FnHandler<F, Fut> {
    f: F,
    signature: Signature,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut, T> FnHandler<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TesseraError>> + Send + 'static,
    T: Into<Reply>,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            signature: Signature::default(),
            _marker: PhantomData,
        }
    }

    /// Declares the parameter list.
    #[must_use]
    pub fn inject<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature = Signature::new(params);
        self
    }
}

impl<F, Fut, T> RouteHandler for FnHandler<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TesseraError>> + Send + 'static,
    T: Into<Reply>,
{
    fn call<'a>(
        &'a self,
        request: &'a Request,
        services: Services,
    ) -> BoxFuture<'a, Result<Reply, TesseraError>> {
        let fut = (self.f)(request, services);
        Box::pin(async move { fut.await.map(Into::into) })
    }

    fn parameters(&self) -> Signature {
        self.signature.clone()
    }
}

/// Wraps a closure as a route handler.
pub fn handler_fn<F, Fut, T>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TesseraError>> + Send + 'static,
    T: Into<Reply>,
{
    FnHandler::new(f)
}

struct DefaultHandler;

impl RouteHandler for DefaultHandler {
    fn call<'a>(
        &'a self,
        _request: &'a Request,
        _services: Services,
    ) -> BoxFuture<'a, Result<Reply, TesseraError>> {
        Box::pin(async { Ok(Reply::from(DEFAULT_HANDLER_MESSAGE)) })
    }
}

/// A declarative endpoint.
///
/// # Example
///
/// ```
/// use tessera_middleware::{handler_fn, Route, Services};
/// use tessera_core::schema::{FieldSchema, Validator};
/// use tessera_core::{Request, TesseraError};
/// use http::Method;
///
/// let route = Route::builder(Method::GET, "/items")
///     .query_params(FieldSchema::new().field("limit", Validator::integer().optional()))
///     .handler(handler_fn(|req: &Request, _: Services| {
///         let limit = req.query_params().get("limit").cloned();
///         async move { Ok::<_, TesseraError>(serde_json::json!({ "limit": limit })) }
///     }))
///     .build();
/// assert_eq!(route.url(), "/items");
/// ```
#[derive(Clone)]
pub struct Route {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) schema: SchemaSet,
    pub(crate) raw_interceptors: Vec<Arc<dyn RawInterceptor>>,
    pub(crate) request_interceptors: Vec<RequestInterceptorStep>,
    pub(crate) guards: Vec<GuardStep>,
    pub(crate) response_interceptors: Vec<ResponseInterceptorStep>,
    pub(crate) handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// Starts a route.
    pub fn builder(method: Method, url: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(method, url)
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URL pattern.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the route's own schema contribution.
    #[must_use]
    pub const fn schema(&self) -> &SchemaSet {
        &self.schema
    }

    /// Returns the raw interceptors.
    #[must_use]
    pub fn raw_interceptors(&self) -> &[Arc<dyn RawInterceptor>] {
        &self.raw_interceptors
    }

    /// Returns the request interceptors.
    #[must_use]
    pub fn request_interceptors(&self) -> &[RequestInterceptorStep] {
        &self.request_interceptors
    }

    /// Returns the guards.
    #[must_use]
    pub fn guards(&self) -> &[GuardStep] {
        &self.guards
    }

    /// Returns the response interceptors.
    #[must_use]
    pub fn response_interceptors(&self) -> &[ResponseInterceptorStep] {
        &self.response_interceptors
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn RouteHandler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("schema", &self.schema)
            .field(
                "raw_interceptors",
                &self.raw_interceptors.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("request_interceptors", &self.request_interceptors.len())
            .field("guards", &self.guards.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Route`].
#[must_use]
pub struct RouteBuilder {
    route: Route,
}

impl RouteBuilder {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            route: Route {
                method,
                url: url.into(),
                schema: SchemaSet::new(),
                raw_interceptors: Vec::new(),
                request_interceptors: Vec::new(),
                guards: Vec::new(),
                response_interceptors: Vec::new(),
                handler: Arc::new(DefaultHandler),
            },
        }
    }

    /// Declares the body schema.
    pub fn body(mut self, body: BodySchema) -> Self {
        self.route.schema.body = Some(body);
        self
    }

    /// Declares the header schema.
    pub fn headers(mut self, headers: FieldSchema) -> Self {
        self.route.schema.headers = Some(headers);
        self
    }

    /// Declares the cookie schema.
    pub fn cookies(mut self, cookies: FieldSchema) -> Self {
        self.route.schema.cookies = Some(cookies);
        self
    }

    /// Declares the URL parameter schema.
    pub fn url_params(mut self, url_params: FieldSchema) -> Self {
        self.route.schema.url_params = Some(url_params);
        self
    }

    /// Declares the query parameter schema.
    pub fn query_params(mut self, query_params: FieldSchema) -> Self {
        self.route.schema.query_params = Some(query_params);
        self
    }

    /// Declares the file schema.
    pub fn files(mut self, files: FileSchema) -> Self {
        self.route.schema.files = Some(files);
        self
    }

    /// Adds a binding to the route scope.
    pub fn register(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.route.schema.register.insert(name.into(), binding);
        self
    }

    /// Appends a raw interceptor.
    pub fn raw_interceptor(mut self, interceptor: impl RawInterceptor) -> Self {
        self.route.raw_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Appends a request interceptor, bare or named.
    pub fn request_interceptor(mut self, interceptor: impl Into<RequestInterceptorStep>) -> Self {
        self.route.request_interceptors.push(interceptor.into());
        self
    }

    /// Appends a guard, bare or named.
    pub fn guard(mut self, guard: impl Into<GuardStep>) -> Self {
        self.route.guards.push(guard.into());
        self
    }

    /// Appends a response interceptor, bare or named.
    pub fn response_interceptor(
        mut self,
        interceptor: impl Into<ResponseInterceptorStep>,
    ) -> Self {
        self.route.response_interceptors.push(interceptor.into());
        self
    }

    /// Sets the handler.
    pub fn handler(mut self, handler: impl RouteHandler) -> Self {
        self.route.handler = Arc::new(handler);
        self
    }

    /// Finishes the route.
    #[must_use]
    pub fn build(self) -> Route {
        self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::guard_fn;
    use crate::step::Named;
    use http::Uri;
    use serde_json::json;
    use tessera_core::di::{Container, ServiceProvider};
    use tessera_core::schema::Validator;

    #[tokio::test]
    async fn test_default_handler_message() {
        let route = Route::builder(Method::GET, "/").build();
        let request = Request::new(
            Method::GET,
            Uri::from_static("/"),
            Container::new().create_scope(),
        );
        let reply = route.handler().call(&request, Services::new()).await.unwrap();
        let response = reply.into_response();
        assert_eq!(response.payload().as_json(), None);
        assert_eq!(
            response.payload(),
            &tessera_core::Payload::Text(DEFAULT_HANDLER_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_builder_collects_steps() {
        let route = Route::builder(Method::POST, "/users")
            .headers(FieldSchema::new().present("x-api-key"))
            .query_params(FieldSchema::new().field("dry_run", Validator::boolean().optional()))
            .guard(guard_fn(|_: &Request, _| async { true }))
            .guard(Named::guard("admin", guard_fn(|_: &Request, _| async { true })))
            .register("greeting", Binding::value(json!("hi")))
            .build();
        assert_eq!(route.method(), &Method::POST);
        assert_eq!(route.guards().len(), 2);
        assert_eq!(route.guards()[1].name(), Some("admin"));
        assert!(route.schema().headers.is_some());
        assert!(route.schema().register.contains_key("greeting"));
    }
}
