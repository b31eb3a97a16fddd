//! Name-keyed dependency injection.
//!
//! A [`Container`] holds the process-wide bindings. Every request works
//! against its own [`Scope`], created with [`ServiceProvider::create_scope`],
//! which can carry extra bindings of its own and caches scoped instances.
//!
//! Bindings come in three lifetimes:
//!
//! - [`Lifetime::Singleton`]: built once, the instance is cached on the binding
//! - [`Lifetime::Scoped`]: built once per scope that resolves it
//! - [`Lifetime::Transient`]: built on every resolution
//!
//! # Example
//!
//! ```rust
//! use tessera_core::di::{Binding, Container, ServiceProvider};
//!
//! struct Clock {
//!     offset: i64,
//! }
//!
//! let container = Container::new();
//! container.register("clock", Binding::value(Clock { offset: 3 }));
//!
//! let scope = container.create_scope();
//! let clock = scope.resolve_as::<Clock>("clock").unwrap();
//! assert_eq!(clock.offset, 3);
//! ```

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A resolved service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// An ordered set of named bindings.
pub type Bindings = IndexMap<String, Binding>;

type Factory = Arc<dyn Fn(&Scope) -> Result<Service, InjectionError> + Send + Sync>;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InjectionError {
    /// No binding exists for the name.
    #[error("service \"{name}\" is not registered")]
    NotRegistered {
        /// The requested service name.
        name: String,
    },

    /// The binding's factory failed.
    #[error("service \"{name}\" could not be built: {reason}")]
    Factory {
        /// The requested service name.
        name: String,
        /// Why the factory failed.
        reason: String,
    },

    /// The instance is not of the requested type.
    #[error("service \"{name}\" is not a {expected}")]
    TypeMismatch {
        /// The requested service name.
        name: String,
        /// The requested type.
        expected: &'static str,
    },
}

impl InjectionError {
    /// Creates a factory failure for the named service.
    pub fn factory(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Factory {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the service that failed.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::NotRegistered { name }
            | Self::Factory { name, .. }
            | Self::TypeMismatch { name, .. } => name,
        }
    }
}

/// How long a produced instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for every scope.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

/// A production rule for one named service.
#[derive(Clone)]
pub struct Binding {
    lifetime: Lifetime,
    factory: Factory,
    instance: Arc<Mutex<Option<Service>>>,
}

impl Binding {
    /// Binds an already built value as a singleton.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let service: Service = Arc::new(value);
        let factory_service = service.clone();
        Self {
            lifetime: Lifetime::Singleton,
            factory: Arc::new(move |_| Ok(factory_service.clone())),
            instance: Arc::new(Mutex::new(Some(service))),
        }
    }

    /// Binds a factory whose result is built once and shared.
    pub fn singleton<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> Result<T, InjectionError> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::Singleton, factory)
    }

    /// Binds a factory whose result is built once per scope.
    pub fn scoped<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> Result<T, InjectionError> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::Scoped, factory)
    }

    /// Binds a factory that runs on every resolution.
    pub fn transient<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> Result<T, InjectionError> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::Transient, factory)
    }

    fn with_lifetime<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> Result<T, InjectionError> + Send + Sync + 'static,
    {
        Self {
            lifetime,
            factory: Arc::new(move |scope| factory(scope).map(|v| Arc::new(v) as Service)),
            instance: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the binding's lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("lifetime", &self.lifetime)
            .field("built", &self.instance.lock().is_some())
            .finish_non_exhaustive()
    }
}

/// Anything services can be resolved from.
pub trait ServiceProvider: Send + Sync {
    /// Resolves the named service.
    fn resolve(&self, name: &str) -> Result<Service, InjectionError>;

    /// Creates a child scope.
    fn create_scope(&self) -> Scope;

    /// Resolves the named service and downcasts it.
    fn resolve_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, InjectionError>
    where
        Self: Sized,
    {
        downcast(name, self.resolve(name)?)
    }
}

/// Downcasts a resolved service to a concrete type.
pub fn downcast<T: Send + Sync + 'static>(
    name: &str,
    service: Service,
) -> Result<Arc<T>, InjectionError> {
    service
        .downcast::<T>()
        .map_err(|_| InjectionError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

/// The process-wide dependency container.
///
/// Cloning a `Container` is cheap and yields a handle to the same bindings.
#[derive(Clone, Default)]
pub struct Container {
    bindings: Arc<RwLock<Bindings>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a binding.
    pub fn register(&self, name: impl Into<String>, binding: Binding) {
        self.bindings.write().insert(name.into(), binding);
    }

    /// Returns `true` if a binding exists for the name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.read().get(name).cloned()
    }
}

impl ServiceProvider for Container {
    /// Resolves against a throwaway scope, so scoped bindings behave as
    /// transient ones here.
    fn resolve(&self, name: &str) -> Result<Service, InjectionError> {
        self.create_scope().resolve(name)
    }

    fn create_scope(&self) -> Scope {
        Scope::new(self.clone(), None)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.bindings.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

struct ScopeInner {
    root: Container,
    parent: Option<Scope>,
    overlay: bool,
    bindings: RwLock<Bindings>,
    instances: Mutex<HashMap<String, Service>>,
}

/// A short-lived resolution context.
///
/// Lookups walk this scope's own bindings, then its parents', then the
/// root container's. Cloning yields a handle to the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    fn new(root: Container, parent: Option<Scope>) -> Self {
        Self::build(root, parent, false)
    }

    fn build(root: Container, parent: Option<Scope>, overlay: bool) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                root,
                parent,
                overlay,
                bindings: RwLock::new(Bindings::new()),
                instances: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers a binding visible to this scope and its children.
    pub fn register(&self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        self.inner.instances.lock().remove(&name);
        self.inner.bindings.write().insert(name, binding);
    }

    /// Registers every binding of the set.
    pub fn register_all(&self, bindings: &Bindings) {
        for (name, binding) in bindings {
            self.register(name.clone(), binding.clone());
        }
    }

    /// Shortcut for registering a ready value.
    pub fn provide<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        self.register(name, Binding::value(value));
    }

    /// Creates a lookup-only layer over this scope.
    ///
    /// Names bound in `bindings` resolve in the layer. Every other name is
    /// resolved by this scope, so scoped instances stay shared with it.
    #[must_use]
    pub fn overlay(&self, bindings: &Bindings) -> Scope {
        let layer = Self::build(self.inner.root.clone(), Some(self.clone()), true);
        layer.register_all(bindings);
        layer
    }

    /// Returns `true` if the name resolves to a binding.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.inner.bindings.read().get(name) {
            return Some(binding.clone());
        }
        match &self.inner.parent {
            Some(parent) => parent.lookup(name),
            None => self.inner.root.binding(name),
        }
    }
}

impl ServiceProvider for Scope {
    fn resolve(&self, name: &str) -> Result<Service, InjectionError> {
        if self.inner.overlay && !self.inner.bindings.read().contains_key(name) {
            if let Some(parent) = &self.inner.parent {
                return parent.resolve(name);
            }
        }

        let binding = self
            .lookup(name)
            .ok_or_else(|| InjectionError::NotRegistered {
                name: name.to_string(),
            })?;

        match binding.lifetime {
            Lifetime::Transient => (binding.factory)(self),
            Lifetime::Singleton => {
                if let Some(instance) = binding.instance.lock().as_ref() {
                    return Ok(instance.clone());
                }
                let built = (binding.factory)(self)?;
                Ok(binding.instance.lock().get_or_insert(built).clone())
            }
            Lifetime::Scoped => {
                if let Some(instance) = self.inner.instances.lock().get(name) {
                    return Ok(instance.clone());
                }
                let built = (binding.factory)(self)?;
                Ok(self
                    .inner
                    .instances
                    .lock()
                    .entry(name.to_string())
                    .or_insert(built)
                    .clone())
            }
        }
    }

    fn create_scope(&self) -> Scope {
        Scope::new(self.inner.root.clone(), Some(self.clone()))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field(
                "bindings",
                &self.inner.bindings.read().keys().collect::<Vec<_>>(),
            )
            .field("has_parent", &self.inner.parent.is_some())
            .field("overlay", &self.inner.overlay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);

    fn counting(lifetime: Lifetime, calls: &Arc<AtomicUsize>) -> Binding {
        let calls = calls.clone();
        let factory = move |_: &Scope| Ok(Counter(calls.fetch_add(1, Ordering::SeqCst)));
        match lifetime {
            Lifetime::Singleton => Binding::singleton(factory),
            Lifetime::Scoped => Binding::scoped(factory),
            Lifetime::Transient => Binding::transient(factory),
        }
    }

    #[test]
    fn test_not_registered() {
        let container = Container::new();
        let err = container.create_scope().resolve("db").unwrap_err();
        assert_eq!(
            err,
            InjectionError::NotRegistered {
                name: "db".to_string()
            }
        );
        assert_eq!(err.name(), "db");
    }

    #[test]
    fn test_singleton_shared_across_scopes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.register("counter", counting(Lifetime::Singleton, &calls));

        let a = container.create_scope().resolve_as::<Counter>("counter").unwrap();
        let b = container.create_scope().resolve_as::<Counter>("counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scoped_once_per_scope() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.register("counter", counting(Lifetime::Scoped, &calls));

        let scope = container.create_scope();
        let a = scope.resolve_as::<Counter>("counter").unwrap();
        let b = scope.resolve_as::<Counter>("counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = container.create_scope();
        let c = other.resolve_as::<Counter>("counter").unwrap();
        assert_eq!(c.0, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transient_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.register("counter", counting(Lifetime::Transient, &calls));

        let scope = container.create_scope();
        scope.resolve("counter").unwrap();
        scope.resolve("counter").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_child_scope_sees_parent_bindings() {
        let container = Container::new();
        container.register("root", Binding::value(1_u8));

        let parent = container.create_scope();
        parent.provide("parent", 2_u8);
        let child = parent.create_scope();
        child.provide("child", 3_u8);

        assert_eq!(*child.resolve_as::<u8>("root").unwrap(), 1);
        assert_eq!(*child.resolve_as::<u8>("parent").unwrap(), 2);
        assert_eq!(*child.resolve_as::<u8>("child").unwrap(), 3);
        assert!(!parent.contains("child"));
    }

    #[test]
    fn test_scope_binding_shadows_root() {
        let container = Container::new();
        container.register("name", Binding::value("root"));
        let scope = container.create_scope();
        scope.provide("name", "scoped");

        assert_eq!(*scope.resolve_as::<&str>("name").unwrap(), "scoped");
        assert_eq!(*container.resolve_as::<&str>("name").unwrap(), "root");
    }

    #[test]
    fn test_factory_resolves_dependencies() {
        let container = Container::new();
        container.register("base", Binding::value(20_u32));
        container.register(
            "derived",
            Binding::transient(|scope: &Scope| {
                let base = scope.resolve_as::<u32>("base")?;
                Ok(*base + 1)
            }),
        );
        assert_eq!(*container.resolve_as::<u32>("derived").unwrap(), 21);
    }

    #[test]
    fn test_overlay_shares_scoped_instances() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.register("tx", counting(Lifetime::Scoped, &calls));

        let request = container.create_scope();
        let mut extra = Bindings::new();
        extra.insert("actor".to_string(), Binding::value("admin"));
        let layer = request.overlay(&extra);

        let seen_by_layer = layer.resolve_as::<Counter>("tx").unwrap();
        let seen_by_request = request.resolve_as::<Counter>("tx").unwrap();
        assert!(Arc::ptr_eq(&seen_by_layer, &seen_by_request));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(*layer.resolve_as::<&str>("actor").unwrap(), "admin");
        assert!(!request.contains("actor"));
    }

    #[test]
    fn test_type_mismatch() {
        let container = Container::new();
        container.register("n", Binding::value(1_u32));
        let err = container.resolve_as::<String>("n").unwrap_err();
        assert!(matches!(err, InjectionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_factory_error_propagates() {
        let container = Container::new();
        container.register(
            "broken",
            Binding::scoped(|_: &Scope| -> Result<u8, _> {
                Err(InjectionError::factory("broken", "no connection"))
            }),
        );
        let err = container.create_scope().resolve("broken").unwrap_err();
        assert!(err.to_string().contains("no connection"));
    }
}
