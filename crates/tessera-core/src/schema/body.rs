//! Request body schemas.
//!
//! Object schemas are closed: validation keeps only declared keys, so
//! anything a client sends beyond the declared shape never reaches the
//! handler.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// The type of a body value.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyType {
    /// Any JSON value, passed through untouched.
    Any,
    /// A string.
    String,
    /// An integer.
    Integer,
    /// Any number.
    Number,
    /// A boolean.
    Boolean,
    /// A homogeneous array.
    Array(Box<BodyType>),
    /// An object with a closed set of fields.
    Object(IndexMap<String, BodyField>),
}

/// One field of an object body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyField {
    /// The field's type.
    pub ty: BodyType,
    /// Whether the field may be absent.
    pub optional: bool,
}

/// A body value did not match the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyViolation {
    /// Dotted path of the offending value (`$` is the root).
    pub path: String,
    /// What was expected there.
    pub expected: String,
}

impl std::fmt::Display for BodyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} must be {}", self.path, self.expected)
    }
}

/// The expected shape of a request body plus the content types it may
/// arrive as.
///
/// # Example
///
/// ```
/// use tessera_core::schema::{BodySchema, BodyType};
/// use serde_json::json;
///
/// let schema = BodySchema::object()
///     .field("name", BodyType::String)
///     .optional_field("age", BodyType::Integer)
///     .accept("application/json");
///
/// let body = schema.validate(&json!({"name": "ada", "admin": true}), false).unwrap();
/// assert_eq!(body, json!({"name": "ada"}));
/// assert_eq!(schema.describe(), "{ name: string, age?: integer }");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BodySchema {
    shape: BodyType,
    accept: Vec<String>,
}

impl BodySchema {
    /// Creates a schema of the given shape accepting any registered type.
    #[must_use]
    pub fn new(shape: BodyType) -> Self {
        Self {
            shape,
            accept: Vec::new(),
        }
    }

    /// Creates an empty object schema.
    #[must_use]
    pub fn object() -> Self {
        Self::new(BodyType::Object(IndexMap::new()))
    }

    /// Creates a plain string schema.
    #[must_use]
    pub fn text() -> Self {
        Self::new(BodyType::String)
    }

    /// Creates a schema accepting any value.
    #[must_use]
    pub fn any() -> Self {
        Self::new(BodyType::Any)
    }

    /// Adds a required field. No-op unless the shape is an object.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: BodyType) -> Self {
        self.with_field(name.into(), ty, false)
    }

    /// Adds an optional field. No-op unless the shape is an object.
    #[must_use]
    pub fn optional_field(self, name: impl Into<String>, ty: BodyType) -> Self {
        self.with_field(name.into(), ty, true)
    }

    fn with_field(mut self, name: String, ty: BodyType, optional: bool) -> Self {
        if let BodyType::Object(fields) = &mut self.shape {
            fields.insert(name, BodyField { ty, optional });
        }
        self
    }

    /// Restricts the content types this body may arrive as.
    #[must_use]
    pub fn accept(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into().to_ascii_lowercase();
        if !self.accept.contains(&content_type) {
            self.accept.push(content_type);
        }
        self
    }

    /// Returns the shape.
    #[must_use]
    pub const fn shape(&self) -> &BodyType {
        &self.shape
    }

    /// Returns the declared content types (empty means any).
    #[must_use]
    pub fn accepted(&self) -> &[String] {
        &self.accept
    }

    /// Returns `true` if the content type may be used for this body.
    #[must_use]
    pub fn accepts(&self, content_type: &str) -> bool {
        self.accept.is_empty() || self.accept.iter().any(|a| a.eq_ignore_ascii_case(content_type))
    }

    /// Validates a parsed body.
    ///
    /// With `coerce` set, string leaves are converted to the declared scalar
    /// type, for sources where everything arrives as text (forms).
    pub fn validate(&self, value: &Value, coerce: bool) -> Result<Value, BodyViolation> {
        check(&self.shape, value, "$", coerce)
    }

    /// Merges `contributor` underneath this schema.
    ///
    /// Object fields are unioned with this schema's fields winning on
    /// conflict; accepted content types are unioned. Non-object shapes keep
    /// this schema's shape.
    pub fn absorb(&mut self, contributor: &BodySchema) {
        if let (BodyType::Object(mine), BodyType::Object(theirs)) =
            (&mut self.shape, &contributor.shape)
        {
            for (name, field) in theirs {
                mine.entry(name.clone()).or_insert_with(|| field.clone());
            }
        }
        for content_type in &contributor.accept {
            if !self.accept.contains(content_type) {
                self.accept.push(content_type.clone());
            }
        }
    }

    /// Returns a compact description of the expected shape.
    #[must_use]
    pub fn describe(&self) -> String {
        describe(&self.shape)
    }
}

fn describe(ty: &BodyType) -> String {
    match ty {
        BodyType::Any => "any".to_string(),
        BodyType::String => "string".to_string(),
        BodyType::Integer => "integer".to_string(),
        BodyType::Number => "number".to_string(),
        BodyType::Boolean => "boolean".to_string(),
        BodyType::Array(inner) => format!("{}[]", describe(inner)),
        BodyType::Object(fields) if fields.is_empty() => "{}".to_string(),
        BodyType::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(name, field)| {
                    let mark = if field.optional { "?" } else { "" };
                    format!("{name}{mark}: {}", describe(&field.ty))
                })
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

fn violation(path: &str, ty: &BodyType) -> BodyViolation {
    BodyViolation {
        path: path.to_string(),
        expected: describe(ty),
    }
}

fn check(ty: &BodyType, value: &Value, path: &str, coerce: bool) -> Result<Value, BodyViolation> {
    match (ty, value) {
        (BodyType::Any, v) => Ok(v.clone()),
        (BodyType::String, Value::String(_)) => Ok(value.clone()),
        (BodyType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        (BodyType::Number, Value::Number(_)) => Ok(value.clone()),
        (BodyType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (BodyType::Integer | BodyType::Number | BodyType::Boolean, Value::String(s)) if coerce => {
            coerce_scalar(ty, s).ok_or_else(|| violation(path, ty))
        }
        (BodyType::Array(inner), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| check(inner, item, &format!("{path}[{i}]"), coerce))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        // A single form value where a list is expected.
        (BodyType::Array(inner), single) if coerce && !single.is_null() => {
            check(inner, single, &format!("{path}[0]"), coerce).map(|v| Value::Array(vec![v]))
        }
        (BodyType::Object(fields), Value::Object(map)) => {
            let mut out = Map::new();
            for (name, field) in fields {
                let child = format!("{path}.{name}");
                match map.get(name) {
                    None | Some(Value::Null) if field.optional => {}
                    None => return Err(violation(&child, &field.ty)),
                    Some(v) => {
                        out.insert(name.clone(), check(&field.ty, v, &child, coerce)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        _ => Err(violation(path, ty)),
    }
}

fn coerce_scalar(ty: &BodyType, raw: &str) -> Option<Value> {
    match ty {
        BodyType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
        BodyType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        BodyType::Boolean => match raw.trim() {
            "true" | "1" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}
