//! Request and response interceptors.
//!
//! Raw interceptors live in `tessera-core` because the body, cookie and
//! query parsers implement them; this module covers the typed stages.

use crate::services::{DeclaresParameters, Services, Signature};
use crate::step::{Named, Step};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::{BoxFuture, InterceptionMoment, Request, Response, TesseraError};

/// What a request interceptor decided.
#[derive(Debug)]
pub enum Intercepted {
    /// Keep the current request and continue.
    Continue,
    /// Continue with a new request.
    Replace(Box<Request>),
    /// Stop with a response.
    Respond(Response),
    /// Stop with an error.
    Reject(TesseraError),
}

impl From<()> for Intercepted {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

impl From<Request> for Intercepted {
    fn from(request: Request) -> Self {
        Self::Replace(Box::new(request))
    }
}

impl From<Response> for Intercepted {
    fn from(response: Response) -> Self {
        Self::Respond(response)
    }
}

impl From<TesseraError> for Intercepted {
    fn from(err: TesseraError) -> Self {
        Self::Reject(err)
    }
}

impl<T: Into<Intercepted>> From<Result<T, TesseraError>> for Intercepted {
    fn from(result: Result<T, TesseraError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::Reject(err),
        }
    }
}

/// A typed request interceptor.
///
/// # Example
///
/// ```
/// use tessera_middleware::{Intercepted, RequestInterceptor, Services};
/// use tessera_core::{BoxFuture, Request, TesseraError};
///
/// struct RequireJson;
///
/// impl RequestInterceptor for RequireJson {
///     fn intercept<'a>(&'a self, request: &'a Request, _: Services) -> BoxFuture<'a, Intercepted> {
///         Box::pin(async move {
///             match request.header("accept") {
///                 Some(accept) if accept.contains("json") => Intercepted::Continue,
///                 _ => TesseraError::bad_request("JSON only").into(),
///             }
///         })
///     }
/// }
/// ```
pub trait RequestInterceptor: Send + Sync + 'static {
    /// Inspects the request.
    fn intercept<'a>(&'a self, request: &'a Request, services: Services) -> BoxFuture<'a, Intercepted>;

    /// Declared parameters; the first one is the request.
    fn parameters(&self) -> Signature {
        Signature::default()
    }
}

impl DeclaresParameters for dyn RequestInterceptor {
    fn parameters(&self) -> Signature {
        RequestInterceptor::parameters(self)
    }
}

/// Adapts a closure into a [`RequestInterceptor`].
pub struct FnRequestInterceptor<F, Fut> {
    f: F,
    signature: Signature,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut, R> FnRequestInterceptor<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Intercepted>,
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

impl<F, Fut, R> RequestInterceptor for FnRequestInterceptor<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Intercepted>,
{
    fn intercept<'a>(&'a self, request: &'a Request, services: Services) -> BoxFuture<'a, Intercepted> {
        let fut = (self.f)(request, services);
        Box::pin(async move { fut.await.into() })
    }

    fn parameters(&self) -> Signature {
        self.signature.clone()
    }
}

/// Wraps a closure as a request interceptor.
pub fn interceptor_fn<F, Fut, R>(f: F) -> FnRequestInterceptor<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Intercepted>,
{
    FnRequestInterceptor::new(f)
}

/// A bare or named request interceptor.
pub type RequestInterceptorStep = Step<dyn RequestInterceptor>;

impl<I: RequestInterceptor> From<I> for Step<dyn RequestInterceptor> {
    fn from(interceptor: I) -> Self {
        Self::Fn(Arc::new(interceptor))
    }
}

impl Named<dyn RequestInterceptor> {
    /// Creates a named request interceptor.
    pub fn request_interceptor(name: impl Into<String>, interceptor: impl RequestInterceptor) -> Self {
        Self::from_arc(name, Arc::new(interceptor))
    }
}

/// A response interceptor.
///
/// Runs for every terminal outcome it applies to. Returning `None` keeps
/// the previous response.
pub trait ResponseInterceptor: Send + Sync + 'static {
    /// Inspects or replaces the response.
    fn intercept<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        moment: InterceptionMoment,
        services: Services,
    ) -> BoxFuture<'a, Option<Response>>;

    /// Declared parameters; the first two are the response and the request.
    fn parameters(&self) -> Signature {
        Signature::default()
    }
}

impl DeclaresParameters for dyn ResponseInterceptor {
    fn parameters(&self) -> Signature {
        ResponseInterceptor::parameters(self)
    }
}

/// Adapts a closure into a [`ResponseInterceptor`].
pub struct FnResponseInterceptor<F, Fut> {
    f: F,
    signature: Signature,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut, R> FnResponseInterceptor<F, Fut>
where
    F: Fn(Response, &Request, InterceptionMoment, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Option<Response>>,
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

impl<F, Fut, R> ResponseInterceptor for FnResponseInterceptor<F, Fut>
where
    F: Fn(Response, &Request, InterceptionMoment, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Option<Response>>,
{
    fn intercept<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        moment: InterceptionMoment,
        services: Services,
    ) -> BoxFuture<'a, Option<Response>> {
        let fut = (self.f)(response, request, moment, services);
        Box::pin(async move { fut.await.into() })
    }

    fn parameters(&self) -> Signature {
        self.signature.clone()
    }
}

/// Wraps a closure as a response interceptor.
pub fn response_interceptor_fn<F, Fut, R>(f: F) -> FnResponseInterceptor<F, Fut>
where
    F: Fn(Response, &Request, InterceptionMoment, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<Option<Response>>,
{
    FnResponseInterceptor::new(f)
}

/// A bare or named response interceptor.
pub type ResponseInterceptorStep = Step<dyn ResponseInterceptor>;

impl<I: ResponseInterceptor> From<I> for Step<dyn ResponseInterceptor> {
    fn from(interceptor: I) -> Self {
        Self::Fn(Arc::new(interceptor))
    }
}

impl Named<dyn ResponseInterceptor> {
    /// Creates a named response interceptor.
    pub fn response_interceptor(
        name: impl Into<String>,
        interceptor: impl ResponseInterceptor,
    ) -> Self {
        Self::from_arc(name, Arc::new(interceptor))
    }
}
