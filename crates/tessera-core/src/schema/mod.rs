//! Declarative schemas for request data.
//!
//! A route, a named guard and a named request interceptor may each
//! contribute a [`SchemaSet`]. The pipeline folds all contributions into one
//! effective set with [`SchemaSet::aggregate`]:
//!
//! 1. request interceptors, in declaration order
//! 2. guards, in declaration order
//! 3. the route
//!
//! Whatever was accumulated first wins on conflict. Aggregation is
//! deterministic, so folding the same contributions twice gives the same
//! set.

mod body;
mod file;
mod validator;

pub use body::{BodyField, BodySchema, BodyType, BodyViolation};
pub use file::{FileField, FileSchema, Multiplicity};
pub use validator::{Validator, Violation};

use crate::di::Bindings;
use crate::error::TesseraError;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// The rule for one named field.
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// The field must be present; its value is not checked.
    Present,
    /// The field is checked (and converted) by a validator.
    Check(Validator),
}

impl From<Validator> for FieldRule {
    fn from(validator: Validator) -> Self {
        Self::Check(validator)
    }
}

/// Where a string-valued field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A request header.
    Header,
    /// A cookie.
    Cookie,
    /// A URL path parameter.
    UrlParam,
    /// A query string parameter.
    QueryParam,
}

impl FieldKind {
    /// Returns the label used in error messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::UrlParam => "URL parameter",
            Self::QueryParam => "query parameter",
        }
    }
}

/// Named fields and their rules.
///
/// # Example
///
/// ```
/// use tessera_core::schema::{FieldKind, FieldSchema, Validator};
/// use serde_json::{json, Map};
///
/// let schema = FieldSchema::new()
///     .present("x-api-key")
///     .field("x-page", Validator::integer().optional());
///
/// let mut headers = Map::new();
/// headers.insert("x-api-key".into(), json!("secret"));
/// headers.insert("x-page".into(), json!("2"));
///
/// let checked = schema.validate(FieldKind::Header, &headers).unwrap();
/// assert_eq!(checked["x-page"], json!(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    rules: IndexMap<String, FieldRule>,
}

impl FieldSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field that must be present.
    #[must_use]
    pub fn present(mut self, name: impl Into<String>) -> Self {
        self.rules.insert(name.into(), FieldRule::Present);
        self
    }

    /// Declares a validated field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: impl Into<FieldRule>) -> Self {
        self.rules.insert(name.into(), rule.into());
        self
    }

    /// Returns the rule for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.rules.get(name)
    }

    /// Returns the declared names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merges `contributor` underneath this schema; existing entries win.
    pub fn absorb(&mut self, contributor: &FieldSchema) {
        for (name, rule) in &contributor.rules {
            self.rules
                .entry(name.clone())
                .or_insert_with(|| rule.clone());
        }
    }

    /// Checks `source` against every declared field.
    ///
    /// Returns `source` with validated entries replaced by their converted
    /// values. Undeclared entries are kept as they are. Header names are
    /// matched case-insensitively.
    pub fn validate(
        &self,
        kind: FieldKind,
        source: &Map<String, Value>,
    ) -> Result<Map<String, Value>, TesseraError> {
        let mut out = source.clone();
        for (name, rule) in &self.rules {
            let key = if kind == FieldKind::Header {
                name.to_ascii_lowercase()
            } else {
                name.clone()
            };
            let raw = source.get(&key);
            match rule {
                FieldRule::Present => {
                    if raw.is_none() {
                        return Err(self.missing(kind, name));
                    }
                }
                FieldRule::Check(validator) => {
                    let text = raw.and_then(scalar);
                    match validator.validate(text.as_deref()) {
                        Ok(Some(value)) => {
                            out.insert(key, value);
                        }
                        Ok(None) => {}
                        Err(Violation::Missing) => return Err(self.missing(kind, name)),
                        Err(Violation::Invalid(reason)) => {
                            return Err(self.invalid(kind, name, &reason));
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn missing(&self, kind: FieldKind, name: &str) -> TesseraError {
        let label = kind.label();
        TesseraError::bad_request_with_details(
            format!(
                "This route expects a {label} named \"{name}\" to be present! \
                 Expected {label}s: {}",
                self.names().join(", ")
            ),
            self.details(kind, name),
        )
    }

    fn invalid(&self, kind: FieldKind, name: &str, reason: &str) -> TesseraError {
        let label = kind.label();
        TesseraError::bad_request_with_details(
            format!(
                "A {label} could not be validated! \"{name}\": {reason}. \
                 Expected {label}s: {}",
                self.names().join(", ")
            ),
            self.details(kind, name),
        )
    }

    fn details(&self, kind: FieldKind, name: &str) -> Value {
        serde_json::json!({
            "source": kind.label(),
            "field": name,
            "expected": self.names(),
        })
    }
}

/// Extracts the text a validator should see; repeated values use the last.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.last().and_then(scalar),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// One schema contribution, or the aggregated effective set.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    /// Expected body.
    pub body: Option<BodySchema>,
    /// Expected headers.
    pub headers: Option<FieldSchema>,
    /// Expected cookies.
    pub cookies: Option<FieldSchema>,
    /// Expected URL parameters.
    pub url_params: Option<FieldSchema>,
    /// Expected query parameters.
    pub query_params: Option<FieldSchema>,
    /// Expected files.
    pub files: Option<FileSchema>,
    /// Extra bindings registered for the route.
    pub register: Bindings,
}

impl SchemaSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds contributions in order; earlier contributions win.
    pub fn aggregate<'a, I>(contributions: I) -> Self
    where
        I: IntoIterator<Item = &'a SchemaSet>,
    {
        let mut effective = Self::default();
        for contribution in contributions {
            effective.absorb(contribution);
        }
        effective
    }

    /// Merges `contributor` underneath this set.
    pub fn absorb(&mut self, contributor: &SchemaSet) {
        match (&mut self.body, &contributor.body) {
            (Some(mine), Some(theirs)) => mine.absorb(theirs),
            (None, Some(theirs)) => self.body = Some(theirs.clone()),
            _ => {}
        }
        absorb_fields(&mut self.headers, contributor.headers.as_ref());
        absorb_fields(&mut self.cookies, contributor.cookies.as_ref());
        absorb_fields(&mut self.url_params, contributor.url_params.as_ref());
        absorb_fields(&mut self.query_params, contributor.query_params.as_ref());
        match (&mut self.files, &contributor.files) {
            (Some(mine), Some(theirs)) => mine.absorb(theirs),
            (None, Some(theirs)) => self.files = Some(theirs.clone()),
            _ => {}
        }
        for (name, binding) in &contributor.register {
            self.register
                .entry(name.clone())
                .or_insert_with(|| binding.clone());
        }
    }

    /// Merges `other` over this set; `other` wins on conflict.
    pub fn overlay(&mut self, other: &SchemaSet) {
        let mut merged = other.clone();
        merged.absorb(self);
        *self = merged;
    }

    /// Returns `true` if a body or file schema is declared.
    #[must_use]
    pub const fn expects_body(&self) -> bool {
        self.body.is_some() || self.files.is_some()
    }

    /// Returns a JSON summary of every declared category.
    #[must_use]
    pub fn describe(&self) -> Value {
        fn fields(schema: Option<&FieldSchema>) -> Value {
            schema.map_or(Value::Null, |s| {
                s.rules
                    .iter()
                    .map(|(name, rule)| {
                        let text = match rule {
                            FieldRule::Present => "present".to_string(),
                            FieldRule::Check(v) => v.describe(),
                        };
                        (name.clone(), Value::String(text))
                    })
                    .collect::<Map<_, _>>()
                    .into()
            })
        }
        serde_json::json!({
            "body": self.body.as_ref().map(BodySchema::describe),
            "accept": self.body.as_ref().map(|b| b.accepted().to_vec()),
            "headers": fields(self.headers.as_ref()),
            "cookies": fields(self.cookies.as_ref()),
            "url_params": fields(self.url_params.as_ref()),
            "query_params": fields(self.query_params.as_ref()),
            "files": self.files.as_ref().map(FileSchema::field_names),
            "register": self.register.keys().collect::<Vec<_>>(),
        })
    }
}

fn absorb_fields(acc: &mut Option<FieldSchema>, contributor: Option<&FieldSchema>) {
    match (acc.as_mut(), contributor) {
        (Some(mine), Some(theirs)) => mine.absorb(theirs),
        (None, Some(theirs)) => *acc = Some(theirs.clone()),
        _ => {}
    }
}
