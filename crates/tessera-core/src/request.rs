//! The typed request.

use crate::context::RequestId;
use crate::di::{Binding, Scope};
use crate::error::TesseraError;
use crate::upload::{Files, UploadedFile};
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, Uri};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// URL parameters supplied by the router for the matched route.
pub type UrlParams = IndexMap<String, Option<String>>;

/// A request after it has been forged from the raw exchange.
///
/// Each category starts empty and is filled in as the pipeline validates it.
/// A request is owned by exactly one pipeline execution.
///
/// # Example
///
/// ```
/// use tessera_core::di::{Container, ServiceProvider};
/// use tessera_core::Request;
/// use http::{Method, Uri};
///
/// let request = Request::new(Method::GET, Uri::from_static("/items?limit=2"), Container::new().create_scope());
/// assert_eq!(request.path(), "/items");
/// assert!(request.body().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    issued_at: DateTime<Utc>,
    method: Method,
    uri: Uri,
    headers: Map<String, Value>,
    body: Option<Value>,
    cookies: Map<String, Value>,
    url_params: Map<String, Value>,
    query_params: Map<String, Value>,
    files: Files,
    metadata: Map<String, Value>,
    scope: Scope,
}

impl Request {
    /// Creates a request with empty data categories.
    #[must_use]
    pub fn new(method: Method, uri: Uri, scope: Scope) -> Self {
        Self {
            id: RequestId::new(),
            issued_at: Utc::now(),
            method,
            uri,
            headers: Map::new(),
            body: None,
            cookies: Map::new(),
            url_params: Map::new(),
            query_params: Map::new(),
            files: Files::new(),
            metadata: Map::new(),
            scope,
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Returns when the request was received.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns all headers, names lower-cased.
    #[must_use]
    pub const fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    /// Returns a header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    /// Replaces the headers.
    pub fn set_headers(&mut self, headers: Map<String, Value>) {
        self.headers = headers;
    }

    /// Returns the validated body.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Option<Value>) {
        self.body = body;
    }

    /// Returns the cookies.
    #[must_use]
    pub const fn cookies(&self) -> &Map<String, Value> {
        &self.cookies
    }

    /// Replaces the cookies.
    pub fn set_cookies(&mut self, cookies: Map<String, Value>) {
        self.cookies = cookies;
    }

    /// Returns the URL parameters.
    #[must_use]
    pub const fn url_params(&self) -> &Map<String, Value> {
        &self.url_params
    }

    /// Replaces the URL parameters.
    pub fn set_url_params(&mut self, url_params: Map<String, Value>) {
        self.url_params = url_params;
    }

    /// Returns the query parameters.
    #[must_use]
    pub const fn query_params(&self) -> &Map<String, Value> {
        &self.query_params
    }

    /// Replaces the query parameters.
    pub fn set_query_params(&mut self, query_params: Map<String, Value>) {
        self.query_params = query_params;
    }

    /// Returns the uploaded files.
    #[must_use]
    pub const fn files(&self) -> &Files {
        &self.files
    }

    /// Returns the first file uploaded under a field.
    #[must_use]
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field).and_then(|f| f.first())
    }

    /// Replaces the uploaded files.
    pub fn set_files(&mut self, files: Files) {
        self.files = files;
    }

    /// Returns free-form metadata attached by interceptors.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns mutable metadata.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Returns the request's resolution scope.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Registers a binding visible to every later stage of this request.
    pub fn provide(&self, name: impl Into<String>, binding: Binding) {
        self.scope.register(name, binding);
    }

    /// Deserializes the body into a concrete type.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, TesseraError> {
        let body = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(body)
            .map_err(|e| TesseraError::bad_request(format!("Invalid request body: {e}")))
    }

    /// Deserializes the query parameters into a concrete type.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, TesseraError> {
        view(&self.query_params, "query parameters")
    }

    /// Deserializes the cookies into a concrete type.
    pub fn cookies_as<T: DeserializeOwned>(&self) -> Result<T, TesseraError> {
        view(&self.cookies, "cookies")
    }

    /// Deserializes the URL parameters into a concrete type.
    pub fn url_params_as<T: DeserializeOwned>(&self) -> Result<T, TesseraError> {
        view(&self.url_params, "URL parameters")
    }
}

fn view<T: DeserializeOwned>(map: &Map<String, Value>, what: &str) -> Result<T, TesseraError> {
    serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| TesseraError::bad_request(format!("Invalid {what}: {e}")))
}

/// Converts transport headers into a string map with lower-cased names.
///
/// Repeated headers are joined with `", "`. Values that are not valid UTF-8
/// are decoded lossily.
#[must_use]
pub fn header_map_to_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in headers {
        let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match out.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&text);
            }
            _ => {
                out.insert(name.as_str().to_string(), Value::String(text));
            }
        }
    }
    out
}

/// Converts router parameters into a JSON map; absent values are skipped.
#[must_use]
pub fn url_params_to_json(params: &UrlParams) -> Map<String, Value> {
    params
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), Value::String(v.clone()))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Container, ServiceProvider};
    use serde::Deserialize;
    use serde_json::json;

    fn request() -> Request {
        Request::new(
            Method::GET,
            Uri::from_static("/items?limit=10"),
            Container::new().create_scope(),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(request().id(), request().id());
    }

    #[test]
    fn test_typed_query_view() {
        #[derive(Deserialize)]
        struct Query {
            limit: i64,
        }
        let mut req = request();
        let mut query = Map::new();
        query.insert("limit".into(), json!(10));
        req.set_query_params(query);
        assert_eq!(req.query_as::<Query>().unwrap().limit, 10);
    }

    #[test]
    fn test_typed_view_rejects_bad_shape() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Body {
            name: String,
        }
        let mut req = request();
        req.set_body(Some(json!({"name": 3})));
        assert_eq!(req.body_as::<Body>().unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_header_map_conversion_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("accept", "text/plain".parse().unwrap());
        headers.append("accept", "application/json".parse().unwrap());
        headers.insert("X-Key", "k".parse().unwrap());
        let map = header_map_to_json(&headers);
        assert_eq!(map["accept"], json!("text/plain, application/json"));
        assert_eq!(map["x-key"], json!("k"));
    }

    #[test]
    fn test_provide_registers_in_scope() {
        let req = request();
        req.provide("user", Binding::value("ada".to_string()));
        let user = req.scope().resolve_as::<String>("user").unwrap();
        assert_eq!(user.as_str(), "ada");
    }

    #[test]
    fn test_url_params_skip_absent() {
        let mut params = UrlParams::new();
        params.insert("id".into(), Some("7".into()));
        params.insert("slug".into(), None);
        let map = url_params_to_json(&params);
        assert_eq!(map.len(), 1);
        assert_eq!(map["id"], json!("7"));
    }
}
