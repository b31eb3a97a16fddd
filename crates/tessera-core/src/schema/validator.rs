//! Scalar validators for string-valued request data.
//!
//! Headers, cookies, URL parameters and query parameters all arrive as
//! strings. A [`Validator`] checks one such value and converts it into the
//! typed JSON value stored on the request (`"10"` becomes `10` for an
//! integer validator).

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type CheckFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
enum Kind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Number,
    Boolean,
    OneOf(Vec<String>),
    Pattern(Regex),
    Custom {
        description: String,
        check: CheckFn,
    },
}

/// Why a value failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required value is absent.
    Missing,
    /// The value is present but malformed.
    Invalid(String),
}

/// A validator for a single string-valued field.
///
/// # Example
///
/// ```
/// use tessera_core::schema::Validator;
/// use serde_json::json;
///
/// let limit = Validator::integer().range(1, 100).optional();
/// assert_eq!(limit.validate(Some("10")).unwrap(), Some(json!(10)));
/// assert_eq!(limit.validate(None).unwrap(), None);
/// assert!(limit.validate(Some("500")).is_err());
/// ```
#[derive(Clone)]
pub struct Validator {
    kind: Kind,
    optional: bool,
}

impl Validator {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    /// Accepts any string.
    #[must_use]
    pub fn string() -> Self {
        Self::new(Kind::String {
            min_len: None,
            max_len: None,
        })
    }

    /// Accepts any non-empty string.
    #[must_use]
    pub fn non_empty() -> Self {
        Self::string().length(1, usize::MAX)
    }

    /// Accepts a signed 64-bit integer.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(Kind::Integer {
            min: None,
            max: None,
        })
    }

    /// Accepts any finite number.
    #[must_use]
    pub fn number() -> Self {
        Self::new(Kind::Number)
    }

    /// Accepts `true`/`false`/`1`/`0`.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(Kind::Boolean)
    }

    /// Accepts one of a fixed set of strings.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Kind::OneOf(values.into_iter().map(Into::into).collect()))
    }

    /// Accepts strings matching a regular expression.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(Kind::Pattern(Regex::new(pattern)?)))
    }

    /// Accepts values the closure converts successfully.
    ///
    /// The closure returns the typed value to store, or a reason for the
    /// rejection.
    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::new(Kind::Custom {
            description: description.into(),
            check: Arc::new(check),
        })
    }

    /// Bounds string length (inclusive). No-op for other kinds.
    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        if let Kind::String { min_len, max_len } = &mut self.kind {
            *min_len = Some(min);
            *max_len = (max != usize::MAX).then_some(max);
        }
        self
    }

    /// Bounds an integer (inclusive). No-op for other kinds.
    #[must_use]
    pub fn range(mut self, low: i64, high: i64) -> Self {
        if let Kind::Integer { min, max } = &mut self.kind {
            *min = Some(low);
            *max = Some(high);
        }
        self
    }

    /// Allows the value to be absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Returns `true` if the value may be absent.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Validates a raw value, returning the typed value to store.
    ///
    /// Absent optional values yield `Ok(None)`.
    pub fn validate(&self, raw: Option<&str>) -> Result<Option<Value>, Violation> {
        let Some(raw) = raw else {
            return if self.optional {
                Ok(None)
            } else {
                Err(Violation::Missing)
            };
        };
        self.check(raw).map(Some).map_err(Violation::Invalid)
    }

    fn check(&self, raw: &str) -> Result<Value, String> {
        match &self.kind {
            Kind::String { min_len, max_len } => {
                let len = raw.chars().count();
                if min_len.is_some_and(|min| len < min) || max_len.is_some_and(|max| len > max) {
                    return Err(format!("expected {}", self.describe()));
                }
                Ok(Value::String(raw.to_string()))
            }
            Kind::Integer { min, max } => {
                let n: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("expected an integer, got \"{raw}\""))?;
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    return Err(format!("expected {}, got {n}", self.describe()));
                }
                Ok(Value::from(n))
            }
            Kind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected a number, got \"{raw}\"")),
            Kind::Boolean => match raw.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got \"{raw}\"")),
            },
            Kind::OneOf(values) => {
                if values.iter().any(|v| v == raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(format!("expected {}, got \"{raw}\"", self.describe()))
                }
            }
            Kind::Pattern(re) => {
                if re.is_match(raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(format!("expected {}", self.describe()))
                }
            }
            Kind::Custom { check, .. } => check(raw),
        }
    }

    /// Returns a short human-readable description of accepted values.
    #[must_use]
    pub fn describe(&self) -> String {
        let base = match &self.kind {
            Kind::String {
                min_len: None,
                max_len: None,
            } => "string".to_string(),
            Kind::String { min_len, max_len } => format!(
                "string of length {}..{}",
                min_len.unwrap_or(0),
                max_len.map(|m| m.to_string()).unwrap_or_default()
            ),
            Kind::Integer {
                min: Some(min),
                max: Some(max),
            } => format!("integer in {min}..={max}"),
            Kind::Integer { .. } => "integer".to_string(),
            Kind::Number => "number".to_string(),
            Kind::Boolean => "boolean".to_string(),
            Kind::OneOf(values) => format!("one of [{}]", values.join(", ")),
            Kind::Pattern(re) => format!("string matching /{}/", re.as_str()),
            Kind::Custom { description, .. } => description.clone(),
        };
        if self.optional {
            format!("optional {base}")
        } else {
            base
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_conversion() {
        let v = Validator::integer();
        assert_eq!(v.validate(Some("10")).unwrap(), Some(json!(10)));
        assert_eq!(v.validate(Some("-3")).unwrap(), Some(json!(-3)));
        assert!(matches!(v.validate(Some("ten")), Err(Violation::Invalid(_))));
        assert_eq!(v.validate(None), Err(Violation::Missing));
    }

    #[test]
    fn test_integer_range() {
        let v = Validator::integer().range(1, 5);
        assert!(v.validate(Some("5")).is_ok());
        assert!(v.validate(Some("6")).is_err());
        assert_eq!(v.describe(), "integer in 1..=5");
    }

    #[test]
    fn test_optional_absent() {
        let v = Validator::string().optional();
        assert_eq!(v.validate(None).unwrap(), None);
        assert!(v.describe().starts_with("optional"));
    }

    #[test]
    fn test_number_and_boolean() {
        assert_eq!(
            Validator::number().validate(Some("2.5")).unwrap(),
            Some(json!(2.5))
        );
        assert!(Validator::number().validate(Some("NaN")).is_err());
        assert_eq!(
            Validator::boolean().validate(Some("0")).unwrap(),
            Some(json!(false))
        );
        assert!(Validator::boolean().validate(Some("yes")).is_err());
    }

    #[test]
    fn test_one_of_and_pattern() {
        let sort = Validator::one_of(["asc", "desc"]);
        assert!(sort.validate(Some("asc")).is_ok());
        assert!(sort.validate(Some("up")).is_err());

        let key = Validator::pattern(r"^[a-f0-9]{8}$").unwrap();
        assert!(key.validate(Some("deadbeef")).is_ok());
        assert!(key.validate(Some("nope")).is_err());
        assert!(Validator::pattern("(").is_err());
    }

    #[test]
    fn test_non_empty_string() {
        let v = Validator::non_empty();
        assert!(v.validate(Some("")).is_err());
        assert!(v.validate(Some("x")).is_ok());
    }

    #[test]
    fn test_custom() {
        let even = Validator::custom("even integer", |raw| {
            raw.parse::<i64>()
                .ok()
                .filter(|n| n % 2 == 0)
                .map(Value::from)
                .ok_or_else(|| "not even".to_string())
        });
        assert_eq!(even.validate(Some("4")).unwrap(), Some(json!(4)));
        assert_eq!(
            even.validate(Some("3")),
            Err(Violation::Invalid("not even".to_string()))
        );
        assert_eq!(even.describe(), "even integer");
    }

    proptest::proptest! {
        #[test]
        fn prop_integer_accepts_every_i64(n in proptest::prelude::any::<i64>()) {
            let value = Validator::integer().validate(Some(&n.to_string())).unwrap();
            proptest::prop_assert_eq!(value, Some(json!(n)));
        }

        #[test]
        fn prop_string_never_rejects(s in ".*") {
            proptest::prop_assert!(Validator::string().validate(Some(&s)).is_ok());
        }
    }
}
