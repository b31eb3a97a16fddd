//! Guards.
//!
//! A guard authorizes or denies; it never changes the request.

use crate::services::{DeclaresParameters, Services, Signature};
use crate::step::{Named, Step};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::{BoxFuture, Request, Response, TesseraError};

/// Message of the generic denial.
pub const DENIED_MESSAGE: &str = "You may not access this endpoint!";

/// What a guard decided.
#[derive(Debug)]
pub enum Verdict {
    /// Continue.
    Allow,
    /// Stop with a generic Unauthorized error.
    Deny,
    /// Stop with this response.
    Respond(Response),
    /// Stop with this error.
    Reject(TesseraError),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Allow`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a stopping verdict into its response.
    ///
    /// Returns `None` for [`Verdict::Allow`].
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Allow => None,
            Self::Deny => Some(Response::error(&TesseraError::unauthorized(DENIED_MESSAGE))),
            Self::Respond(response) => Some(response),
            Self::Reject(err) => Some(Response::error(&err)),
        }
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl From<Response> for Verdict {
    fn from(response: Response) -> Self {
        Self::Respond(response)
    }
}

impl From<TesseraError> for Verdict {
    fn from(err: TesseraError) -> Self {
        Self::Reject(err)
    }
}

impl<T: Into<Verdict>> From<Result<T, TesseraError>> for Verdict {
    fn from(result: Result<T, TesseraError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::Reject(err),
        }
    }
}

/// An authorization check.
pub trait Guard: Send + Sync + 'static {
    /// Checks the request.
    fn check<'a>(&'a self, request: &'a Request, services: Services) -> BoxFuture<'a, Verdict>;

    /// Declared parameters; the first one is the request.
    fn parameters(&self) -> Signature {
        Signature::default()
    }
}

impl DeclaresParameters for dyn Guard {
    fn parameters(&self) -> Signature {
        Guard::parameters(self)
    }
}

/// Adapts a closure into a [`Guard`].
///
/// # Example
///
/// ```
/// use tessera_middleware::{guard_fn, Services};
/// use tessera_core::Request;
///
/// let admin_only = guard_fn(|req: &Request, _: Services| {
///     let allowed = req.header("x-role") == Some("admin");
///     async move { allowed }
/// });
/// # let _ = admin_only;
/// ```
pub struct FnGuard<F, Fut> {
    f: F,
    signature: Signature,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut, V> FnGuard<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
    V: Into<Verdict>,
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

impl<F, Fut, V> Guard for FnGuard<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
    V: Into<Verdict>,
{
    fn check<'a>(&'a self, request: &'a Request, services: Services) -> BoxFuture<'a, Verdict> {
        let fut = (self.f)(request, services);
        Box::pin(async move { fut.await.into() })
    }

    fn parameters(&self) -> Signature {
        self.signature.clone()
    }
}

/// Wraps a closure as a guard.
pub fn guard_fn<F, Fut, V>(f: F) -> FnGuard<F, Fut>
where
    F: Fn(&Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
    V: Into<Verdict>,
{
    FnGuard::new(f)
}

/// A bare or named guard.
pub type GuardStep = Step<dyn Guard>;

impl<G: Guard> From<G> for Step<dyn Guard> {
    fn from(guard: G) -> Self {
        Self::Fn(Arc::new(guard))
    }
}

impl Named<dyn Guard> {
    /// Creates a named guard.
    pub fn guard(name: impl Into<String>, guard: impl Guard) -> Self {
        Self::from_arc(name, Arc::new(guard))
    }
}
