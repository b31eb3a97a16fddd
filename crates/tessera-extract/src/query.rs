//! Query string parsing.

use serde_json::{Map, Value};
use tessera_core::schema::{FieldKind, FieldSchema};
use tessera_core::{BoxFuture, RawExchange, RawFlow, RawInterceptor, Request, TesseraError};

/// Folds decoded key/value pairs into an object.
///
/// Repeated keys become arrays in arrival order. Keys named `__proto__`
/// are dropped.
#[must_use]
pub fn pairs_to_object(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in pairs {
        if key == "__proto__" {
            continue;
        }
        match out.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                out.insert(key, Value::String(value));
            }
        }
    }
    out
}

/// Parses a query string (without the leading `?`).
///
/// # Example
///
/// ```
/// use tessera_extract::parse_query;
/// use serde_json::json;
///
/// let query = parse_query("limit=10&q=a%20b").unwrap();
/// assert_eq!(query["limit"], json!("10"));
/// assert_eq!(query["q"], json!("a b"));
/// ```
pub fn parse_query(query: &str) -> Result<Map<String, Value>, TesseraError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| TesseraError::bad_request(format!("The query string is malformed: {e}")))?;
    Ok(pairs_to_object(pairs))
}

/// Raw interceptor that parses and validates query parameters.
#[derive(Debug, Clone)]
pub struct QueryInterceptor {
    schema: FieldSchema,
}

impl QueryInterceptor {
    /// Creates the interceptor for a declared schema.
    #[must_use]
    pub const fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    /// Parses and validates the exchange's query string.
    pub fn extract(&self, exchange: &RawExchange) -> Result<Map<String, Value>, TesseraError> {
        let parsed = parse_query(exchange.uri.query().unwrap_or_default())?;
        self.schema.validate(FieldKind::QueryParam, &parsed)
    }
}

impl RawInterceptor for QueryInterceptor {
    fn name(&self) -> &str {
        "query-parser"
    }

    fn intercept<'a>(
        &'a self,
        exchange: &'a mut RawExchange,
        request: &'a mut Request,
    ) -> BoxFuture<'a, RawFlow> {
        Box::pin(async move {
            match self.extract(exchange) {
                Ok(query) => {
                    request.set_query_params(query);
                    RawFlow::Continue
                }
                Err(err) => RawFlow::Reject(err),
            }
        })
    }
}
