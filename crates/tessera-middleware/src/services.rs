//! Declared dependencies and their resolution.
//!
//! Every handler, interceptor and guard declares its parameter list up
//! front with [`inject`]. The first parameters are the ones the pipeline
//! passes itself (the request, or the response and the request for response
//! interceptors); every name after them is a service resolved from the
//! request scope.
//!
//! ```
//! use tessera_middleware::inject;
//!
//! let signature = inject(["request", "users", "clock"]);
//! assert_eq!(signature.service_names(1), vec!["users", "clock"]);
//! ```

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tessera_core::di::{downcast, Bindings, Scope, Service, ServiceProvider};
use tessera_core::TesseraError;

/// A declared parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<String>,
}

impl Signature {
    /// Creates a signature from parameter names.
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns every declared parameter.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Returns the parameters after the first `leading` ones.
    #[must_use]
    pub fn service_names(&self, leading: usize) -> Vec<String> {
        self.params.iter().skip(leading).cloned().collect()
    }
}

/// Declares a parameter list.
pub fn inject<I, S>(params: I) -> Signature
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Signature::new(params)
}

/// Anything that declares a parameter list.
pub trait DeclaresParameters {
    /// Returns the declared parameters, leading ones included.
    fn parameters(&self) -> Signature;
}

/// Pipeline stage a callable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Request interceptors.
    RequestInterceptor,
    /// Guards.
    Guard,
    /// The route handler.
    Handler,
    /// Response interceptors.
    ResponseInterceptor,
}

impl Stage {
    /// Number of parameters the pipeline passes before any service.
    #[must_use]
    pub const fn leading_params(self) -> usize {
        match self {
            Self::ResponseInterceptor => 2,
            _ => 1,
        }
    }
}

/// Stable identity of a callable within one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableKey {
    /// The stage.
    pub stage: Stage,
    /// Position within the stage.
    pub index: usize,
}

impl CallableKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(stage: Stage, index: usize) -> Self {
        Self { stage, index }
    }
}

/// Services resolved for one call, in declaration order.
#[derive(Clone, Default)]
pub struct Services {
    entries: IndexMap<String, Service>,
}

impl Services {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named service, downcast to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, TesseraError> {
        let service = self.entries.get(name).cloned().ok_or_else(|| {
            TesseraError::internal(format!("Service \"{name}\" was not declared"))
        })?;
        downcast(name, service).map_err(|e| TesseraError::internal_with_source(e.to_string(), e))
    }

    /// Returns the service at `index`, downcast to `T`.
    pub fn at<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, TesseraError> {
        let (name, service) = self.entries.get_index(index).ok_or_else(|| {
            TesseraError::internal(format!("No service declared at position {index}"))
        })?;
        downcast(name, service.clone())
            .map_err(|e| TesseraError::internal_with_source(e.to_string(), e))
    }

    /// Returns the untyped service.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Service> {
        self.entries.get(name)
    }

    /// Returns the service names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Returns the number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no service was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("names", &self.names())
            .finish()
    }
}

/// Derives service names once per callable and resolves them per request.
#[derive(Debug, Default)]
pub struct ServiceResolver {
    cache: RwLock<HashMap<CallableKey, Arc<[String]>>>,
}

impl ServiceResolver {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the service names of a callable.
    ///
    /// The parameter list is read from `callable` the first time a key is
    /// seen and cached afterwards.
    pub fn service_names<C>(&self, key: CallableKey, callable: &C, leading: usize) -> Arc<[String]>
    where
        C: DeclaresParameters + ?Sized,
    {
        if let Some(names) = self.cache.read().get(&key) {
            return names.clone();
        }
        let names: Arc<[String]> = callable.parameters().service_names(leading).into();
        self.cache
            .write()
            .entry(key)
            .or_insert(names)
            .clone()
    }

    /// Resolves every name from `scope`.
    ///
    /// Non-empty `provide` bindings are layered over `scope` with
    /// [`Scope::overlay`], so they are only visible to this call while
    /// scoped services still come from the request scope. Any failure yields
    /// a single missing-service error listing every expected name.
    pub fn resolve(
        &self,
        scope: &Scope,
        names: &[String],
        provide: &Bindings,
    ) -> Result<Services, TesseraError> {
        if names.is_empty() {
            return Ok(Services::new());
        }
        let target = if provide.is_empty() {
            scope.clone()
        } else {
            scope.overlay(provide)
        };

        let mut entries = IndexMap::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match target.resolve(name) {
                Ok(service) => {
                    entries.insert(name.clone(), service);
                }
                Err(err) => {
                    tracing::debug!(service = %name, error = %err, "service resolution failed");
                    missing.push(err.name().to_string());
                }
            }
        }
        if missing.is_empty() {
            Ok(Services { entries })
        } else {
            Err(TesseraError::missing_service(names.to_vec(), missing.join(", ")))
        }
    }

    /// Forgets every cached name list.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Returns the number of cached callables.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}
