//! The per-route request state machine.
//!
//! A [`Handler`] owns one route and runs every request of that route
//! through the same fixed sequence:
//!
//! 1. **Forge** - build the typed request and validate it
//! 2. **Raw interceptors** - transport-level checks
//! 3. **Request interceptors** - may replace the request
//! 4. **Guards** - authorize
//! 5. **Route handler** - produce the response
//! 6. **Response interceptors** - always run, filtered by moment
//!
//! The first stage that answers ends the sequence; its response is tagged
//! with the [`InterceptionMoment`] that explains why, and handed to the
//! response interceptors.

use crate::aggregate::aggregate_schema;
use crate::forge::{forge_request, ForgeError};
use crate::interceptor::{Intercepted, RequestInterceptorStep, ResponseInterceptorStep};
use crate::options::{HandlerOptions, PanicPolicy};
use crate::route::Route;
use crate::services::{CallableKey, DeclaresParameters, ServiceResolver, Services, Stage};
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::Full;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tessera_core::di::{Bindings, Scope, ServiceProvider};
use tessera_core::schema::SchemaSet;
use tessera_core::{
    InterceptionMoment, RawExchange, RawFlow, Request, Response, TesseraError, UrlParams,
};
use tracing::Instrument;

/// Message of the error answered when a route handler panics under
/// [`PanicPolicy::InternalError`].
pub const HANDLER_PANIC_MESSAGE: &str = "The route handler failed unexpectedly";

/// A terminal response and the request it belongs to.
struct Outcome {
    request: Request,
    response: Response,
    moment: InterceptionMoment,
}

impl Outcome {
    fn new(request: Request, response: Response, moment: InterceptionMoment) -> Self {
        Self {
            request,
            response,
            moment,
        }
    }
}

/// Runs requests for one route.
///
/// The handler is `Send + Sync`; one instance serves concurrent requests.
///
/// # Example
///
/// ```
/// use tessera_middleware::{handler_fn, Handler, Route, Services};
/// use tessera_core::di::Container;
/// use tessera_core::{empty_body, RawExchange, Request, TesseraError, UrlParams};
/// use http::{HeaderMap, Method, Uri};
///
/// # tokio_test::block_on(async {
/// let route = Route::builder(Method::GET, "/ping")
///     .handler(handler_fn(|_: &Request, _: Services| async { Ok::<_, TesseraError>("pong") }))
///     .build();
/// let handler = Handler::new(&Container::new(), route);
///
/// let exchange = RawExchange::new(Method::GET, Uri::from_static("/ping"), HeaderMap::new(), empty_body());
/// let response = handler.handle(exchange, &UrlParams::new()).await;
/// assert_eq!(response.status(), 200);
/// # });
/// ```
pub struct Handler {
    name: String,
    route: Route,
    schema: SchemaSet,
    route_scope: Scope,
    resolver: ServiceResolver,
    options: HandlerOptions,
}

impl Handler {
    /// Creates a handler with default options.
    pub fn new(provider: &impl ServiceProvider, route: Route) -> Self {
        Self::with_options(provider, route, HandlerOptions::default())
    }

    /// Creates a handler.
    ///
    /// The effective schema is aggregated here, and the route scope is
    /// derived from `provider` with every `register` binding added.
    pub fn with_options(
        provider: &impl ServiceProvider,
        route: Route,
        options: HandlerOptions,
    ) -> Self {
        let name = format!("Handler::{}\"{}\"", route.method, route.url);
        let schema = aggregate_schema(&route);
        let route_scope = provider.create_scope();
        route_scope.register_all(&schema.register);
        tracing::debug!(
            handler = %name,
            schema = %schema.describe(),
            "handler created"
        );
        Self {
            name,
            route,
            schema,
            route_scope,
            resolver: ServiceResolver::new(),
            options,
        }
    }

    /// Returns the handler name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the route.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Returns the effective schema.
    #[must_use]
    pub const fn schema(&self) -> &SchemaSet {
        &self.schema
    }

    /// Returns the service resolver.
    #[must_use]
    pub const fn resolver(&self) -> &ServiceResolver {
        &self.resolver
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Appends a request interceptor and re-aggregates the schema.
    pub fn add_request_interceptor(&mut self, interceptor: impl Into<RequestInterceptorStep>) {
        self.route.request_interceptors.push(interceptor.into());
        self.reaggregate();
    }

    /// Appends a response interceptor.
    pub fn add_response_interceptor(&mut self, interceptor: impl Into<ResponseInterceptorStep>) {
        self.route.response_interceptors.push(interceptor.into());
    }

    fn reaggregate(&mut self) {
        self.schema = aggregate_schema(&self.route);
        self.route_scope.register_all(&self.schema.register);
    }

    /// Handles one request and converts the result for the transport.
    ///
    /// Headers staged on the exchange by raw interceptors are merged into
    /// the response. The request scope is dropped before returning.
    pub async fn handle(
        &self,
        mut exchange: RawExchange,
        url_params: &UrlParams,
    ) -> http::Response<Full<Bytes>> {
        let response = self.process(&mut exchange, url_params).await;
        response.into_http(std::mem::take(&mut exchange.response_headers))
    }

    /// Handles one request and returns the tagged response.
    pub async fn process(&self, exchange: &mut RawExchange, url_params: &UrlParams) -> Response {
        let span = tracing::info_span!(
            "request",
            handler = %self.name,
            http.method = %exchange.method,
            http.path = %exchange.uri.path(),
        );

        async move {
            let outcome = self.drive(exchange, url_params).await;
            let request_id = outcome.request.id();
            let response = self.respond(outcome).await;
            tracing::debug!(
                request_id = %request_id,
                http.status_code = response.status().as_u16(),
                moment = ?response.moment(),
                "request finished"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, exchange: &mut RawExchange, url_params: &UrlParams) -> Outcome {
        let scope = self.route_scope.create_scope();

        let mut request =
            match forge_request(exchange, url_params, &self.schema, scope, &self.options).await {
                Ok(request) => request,
                Err(ForgeError { request, error }) => {
                    tracing::debug!(error = %error, "request validation failed");
                    return Outcome::new(
                        *request,
                        Response::error(&error),
                        InterceptionMoment::DataValidationFailed,
                    );
                }
            };

        for raw in &self.route.raw_interceptors {
            match raw.intercept(exchange, &mut request).await {
                RawFlow::Continue => {}
                RawFlow::Respond(response) => {
                    tracing::debug!(interceptor = raw.name(), "raw interceptor answered");
                    let moment = InterceptionMoment::raw_interceptor(response.is_error());
                    return Outcome::new(request, response, moment);
                }
                RawFlow::Reject(err) => {
                    tracing::debug!(interceptor = raw.name(), error = %err, "raw interceptor rejected");
                    return Outcome::new(
                        request,
                        Response::error(&err),
                        InterceptionMoment::raw_interceptor(true),
                    );
                }
            }
        }

        for (index, step) in self.route.request_interceptors.iter().enumerate() {
            let services = match self.services(
                Stage::RequestInterceptor,
                index,
                step.callable().as_ref(),
                step.provide(),
                request.scope(),
            ) {
                Ok(services) => services,
                Err(err) => {
                    return Outcome::new(
                        request,
                        Response::error(&err),
                        InterceptionMoment::request_interceptor(true),
                    );
                }
            };
            match step.callable().intercept(&request, services).await {
                Intercepted::Continue => {}
                Intercepted::Replace(next) => request = *next,
                Intercepted::Respond(response) => {
                    tracing::debug!(index, name = ?step.name(), "request interceptor answered");
                    let moment = InterceptionMoment::request_interceptor(response.is_error());
                    return Outcome::new(request, response, moment);
                }
                Intercepted::Reject(err) => {
                    tracing::debug!(index, name = ?step.name(), error = %err, "request interceptor rejected");
                    return Outcome::new(
                        request,
                        Response::error(&err),
                        InterceptionMoment::request_interceptor(true),
                    );
                }
            }
        }

        for (index, step) in self.route.guards.iter().enumerate() {
            let services = match self.services(
                Stage::Guard,
                index,
                step.callable().as_ref(),
                step.provide(),
                request.scope(),
            ) {
                Ok(services) => services,
                Err(err) => {
                    return Outcome::new(
                        request,
                        Response::error(&err),
                        InterceptionMoment::GuardPreventedProgression,
                    );
                }
            };
            let verdict = step.callable().check(&request, services).await;
            if let Some(response) = verdict.into_response() {
                tracing::debug!(index, name = ?step.name(), status = %response.status(), "guard denied");
                return Outcome::new(
                    request,
                    response,
                    InterceptionMoment::GuardPreventedProgression,
                );
            }
        }

        let handler = &self.route.handler;
        let services =
            match self.services(Stage::Handler, 0, handler.as_ref(), None, request.scope()) {
                Ok(services) => services,
                Err(err) => {
                    return Outcome::new(
                        request,
                        Response::error(&err),
                        InterceptionMoment::HandlerFinishedWithErrorResponse,
                    );
                }
            };

        tracing::debug!("invoking route handler");
        let result = AssertUnwindSafe(handler.call(&request, services))
            .catch_unwind()
            .await;
        let response = match result {
            Ok(Ok(reply)) => reply.into_response(),
            Ok(Err(err)) => Response::error(&err),
            Err(panic) => self.on_panic(panic.as_ref()),
        };
        let moment = InterceptionMoment::handler(response.is_error());
        Outcome::new(request, response, moment)
    }

    async fn respond(&self, outcome: Outcome) -> Response {
        let Outcome {
            request,
            mut response,
            moment,
        } = outcome;

        for (index, step) in self.route.response_interceptors.iter().enumerate() {
            if !step.applies_at(moment) {
                continue;
            }
            let services = match self.services(
                Stage::ResponseInterceptor,
                index,
                step.callable().as_ref(),
                step.provide(),
                request.scope(),
            ) {
                Ok(services) => services,
                Err(err) => {
                    response = Response::error(&err);
                    break;
                }
            };
            match step
                .callable()
                .intercept(response.clone(), &request, moment, services)
                .await
            {
                Some(next) => response = next,
                None => tracing::warn!(
                    index,
                    name = ?step.name(),
                    "response interceptor returned no response, keeping the previous one"
                ),
            }
        }

        response.set_moment(moment);
        response
    }

    fn services<C>(
        &self,
        stage: Stage,
        index: usize,
        callable: &C,
        provide: Option<&Bindings>,
        scope: &Scope,
    ) -> Result<Services, TesseraError>
    where
        C: DeclaresParameters + ?Sized,
    {
        let names = self.resolver.service_names(
            CallableKey::new(stage, index),
            callable,
            stage.leading_params(),
        );
        let empty = Bindings::new();
        self.resolver
            .resolve(scope, &names, provide.unwrap_or(&empty))
            .map_err(|err| {
                tracing::error!(
                    handler = %self.name,
                    stage = ?stage,
                    index,
                    expected = ?names,
                    error = %err,
                    "failed to resolve services"
                );
                err
            })
    }

    fn on_panic(&self, payload: &(dyn Any + Send)) -> Response {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(
            handler = %self.name,
            panic = %message,
            policy = ?self.options.panic_policy,
            "route handler panicked"
        );
        match self.options.panic_policy {
            PanicPolicy::EmptyPayload => Response::ok(()),
            PanicPolicy::InternalError => {
                Response::error(&TesseraError::internal(HANDLER_PANIC_MESSAGE))
            }
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
