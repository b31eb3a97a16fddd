//! Bare or named pipeline steps.
//!
//! Request interceptors, guards and response interceptors can be given
//! either as a bare callable or as a [`Named`] descriptor. Only named steps
//! contribute schemas, extra bindings (`register`), per-call bindings
//! (`provide`) and, for response interceptors, a moment filter.

use std::fmt;
use std::sync::Arc;
use tessera_core::di::{Binding, Bindings};
use tessera_core::schema::{BodySchema, FieldSchema, FileSchema, SchemaSet};
use tessera_core::InterceptionMoment;

/// A named step with its contributions.
pub struct Named<T: ?Sized> {
    /// Step name, used in logs.
    pub name: String,
    /// The callable.
    pub step: Arc<T>,
    /// Schema contribution.
    pub schema: SchemaSet,
    /// Bindings visible only while this step resolves its services.
    pub provide: Bindings,
    /// Moments the step applies to; empty means every moment.
    pub when: Vec<InterceptionMoment>,
}

impl<T: ?Sized> Named<T> {
    /// Creates a descriptor from a shared callable.
    pub fn from_arc(name: impl Into<String>, step: Arc<T>) -> Self {
        Self {
            name: name.into(),
            step,
            schema: SchemaSet::new(),
            provide: Bindings::new(),
            when: Vec::new(),
        }
    }

    /// Replaces the whole schema contribution.
    #[must_use]
    pub fn schema(mut self, schema: SchemaSet) -> Self {
        self.schema = schema;
        self
    }

    /// Declares a body schema.
    #[must_use]
    pub fn body(mut self, body: BodySchema) -> Self {
        self.schema.body = Some(body);
        self
    }

    /// Declares a header schema.
    #[must_use]
    pub fn headers(mut self, headers: FieldSchema) -> Self {
        self.schema.headers = Some(headers);
        self
    }

    /// Declares a cookie schema.
    #[must_use]
    pub fn cookies(mut self, cookies: FieldSchema) -> Self {
        self.schema.cookies = Some(cookies);
        self
    }

    /// Declares a URL parameter schema.
    #[must_use]
    pub fn url_params(mut self, url_params: FieldSchema) -> Self {
        self.schema.url_params = Some(url_params);
        self
    }

    /// Declares a query parameter schema.
    #[must_use]
    pub fn query_params(mut self, query_params: FieldSchema) -> Self {
        self.schema.query_params = Some(query_params);
        self
    }

    /// Declares a file schema.
    #[must_use]
    pub fn files(mut self, files: FileSchema) -> Self {
        self.schema.files = Some(files);
        self
    }

    /// Adds a route-wide binding.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.schema.register.insert(name.into(), binding);
        self
    }

    /// Adds a binding visible only to this step.
    #[must_use]
    pub fn provide(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.provide.insert(name.into(), binding);
        self
    }

    /// Restricts the step to the given moments.
    #[must_use]
    pub fn when<I>(mut self, moments: I) -> Self
    where
        I: IntoIterator<Item = InterceptionMoment>,
    {
        self.when = moments.into_iter().collect();
        self
    }

    /// Returns `true` if the step applies at `moment`.
    #[must_use]
    pub fn applies_at(&self, moment: InterceptionMoment) -> bool {
        self.when.is_empty() || self.when.iter().any(|w| w.matches(moment))
    }
}

impl<T: ?Sized> Clone for Named<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            step: self.step.clone(),
            schema: self.schema.clone(),
            provide: self.provide.clone(),
            when: self.when.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Named<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Named")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("provide", &self.provide.keys().collect::<Vec<_>>())
            .field("when", &self.when)
            .finish_non_exhaustive()
    }
}

/// A bare callable or a named descriptor.
pub enum Step<T: ?Sized> {
    /// A bare callable.
    Fn(Arc<T>),
    /// A named descriptor.
    Named(Named<T>),
}

impl<T: ?Sized> Step<T> {
    /// Returns the callable.
    #[must_use]
    pub fn callable(&self) -> &Arc<T> {
        match self {
            Self::Fn(step) => step,
            Self::Named(named) => &named.step,
        }
    }

    /// Returns the name of a named step.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Fn(_) => None,
            Self::Named(named) => Some(&named.name),
        }
    }

    /// Returns the schema contribution of a named step.
    #[must_use]
    pub fn schema(&self) -> Option<&SchemaSet> {
        match self {
            Self::Fn(_) => None,
            Self::Named(named) => Some(&named.schema),
        }
    }

    /// Returns the per-call bindings.
    #[must_use]
    pub fn provide(&self) -> Option<&Bindings> {
        match self {
            Self::Fn(_) => None,
            Self::Named(named) => Some(&named.provide),
        }
    }

    /// Returns `true` if the step applies at `moment`.
    #[must_use]
    pub fn applies_at(&self, moment: InterceptionMoment) -> bool {
        match self {
            Self::Fn(_) => true,
            Self::Named(named) => named.applies_at(moment),
        }
    }
}

impl<T: ?Sized> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Fn(step) => Self::Fn(step.clone()),
            Self::Named(named) => Self::Named(named.clone()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Fn(..)"),
            Self::Named(named) => f.debug_tuple("Named").field(named).finish(),
        }
    }
}

impl<T: ?Sized> From<Named<T>> for Step<T> {
    fn from(named: Named<T>) -> Self {
        Self::Named(named)
    }
}
