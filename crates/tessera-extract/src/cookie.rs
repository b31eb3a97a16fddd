//! Cookie parsing and `Set-Cookie` serialization.
//!
//! # Example
//!
//! ```rust
//! use tessera_extract::cookie::{SameSite, SetCookie, SetCookieExt};
//! use tessera_core::Response;
//!
//! let mut response = Response::ok("signed in");
//! let cookie = SetCookie::new("session_id", "abc123")
//!     .http_only(true)
//!     .secure(true)
//!     .same_site(SameSite::Strict);
//! response.set_cookie(&cookie).unwrap();
//! assert!(response.headers().contains_key("set-cookie"));
//! ```

use chrono::{DateTime, Utc};
use http::header::{HeaderValue, COOKIE, SET_COOKIE};
use http::HeaderMap;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tessera_core::schema::{FieldKind, FieldSchema};
use tessera_core::{BoxFuture, RawExchange, RawFlow, RawInterceptor, Request, Response, TesseraError};

/// Parses a `Cookie` header value.
///
/// Pairs are separated by `"; "` and split on their first `=`. A pair
/// without `=` makes the whole header invalid.
///
/// # Example
///
/// ```
/// use tessera_extract::parse_cookie_header;
///
/// let cookies = parse_cookie_header("a=1; b=x=y").unwrap();
/// assert_eq!(cookies["b"], "x=y");
/// assert!(parse_cookie_header("broken").is_err());
/// ```
pub fn parse_cookie_header(header: &str) -> Result<Map<String, Value>, TesseraError> {
    let mut out = Map::new();
    if header.trim().is_empty() {
        return Ok(out);
    }
    for pair in header.split("; ") {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| TesseraError::bad_request("Cookie header is incorrectly formatted!"))?;
        out.insert(name.trim().to_string(), Value::String(value.to_string()));
    }
    Ok(out)
}

/// Parses every `Cookie` header of a request.
pub fn cookies_from_headers(headers: &HeaderMap) -> Result<Map<String, Value>, TesseraError> {
    let mut out = Map::new();
    for value in headers.get_all(COOKIE) {
        let text = value
            .to_str()
            .map_err(|_| TesseraError::bad_request("Cookie header is incorrectly formatted!"))?;
        out.extend(parse_cookie_header(text)?);
    }
    Ok(out)
}

/// Raw interceptor that parses and validates cookies.
#[derive(Debug, Clone)]
pub struct CookieInterceptor {
    schema: FieldSchema,
}

impl CookieInterceptor {
    /// Creates the interceptor for a declared schema.
    #[must_use]
    pub const fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    /// Parses and validates the exchange's cookies.
    pub fn extract(&self, exchange: &RawExchange) -> Result<Map<String, Value>, TesseraError> {
        let parsed = cookies_from_headers(&exchange.headers)?;
        self.schema.validate(FieldKind::Cookie, &parsed)
    }
}

impl RawInterceptor for CookieInterceptor {
    fn name(&self) -> &str {
        "cookie-parser"
    }

    fn intercept<'a>(
        &'a self,
        exchange: &'a mut RawExchange,
        request: &'a mut Request,
    ) -> BoxFuture<'a, RawFlow> {
        Box::pin(async move {
            match self.extract(exchange) {
                Ok(cookies) => {
                    request.set_cookies(cookies);
                    RawFlow::Continue
                }
                Err(err) => RawFlow::Reject(err),
            }
        })
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Only sent in a first-party context.
    Strict,
    /// Sent on top-level navigations.
    Lax,
    /// Always sent; requires `Secure`.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

/// `Priority` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Builder for a `Set-Cookie` header.
///
/// The value is percent-encoded. The path defaults to `/`.
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: String,
    max_age: Option<Duration>,
    expires: Option<DateTime<Utc>>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
    priority: Option<Priority>,
}

impl SetCookie {
    /// Creates a cookie.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: "/".to_string(),
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
            priority: None,
        }
    }

    /// Creates a cookie that removes `name` from the client.
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(Duration::ZERO)
    }

    /// Sets the `Domain` attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the `Max-Age` attribute.
    #[must_use]
    pub const fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets the `Expires` attribute.
    #[must_use]
    pub const fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Sets the `Secure` attribute.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `HttpOnly` attribute.
    #[must_use]
    pub const fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Sets the `Priority` attribute.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serializes the cookie.
    ///
    /// Fails when the name is not a token or an attribute holds characters
    /// that would break the header.
    pub fn to_header_value(&self) -> Result<String, TesseraError> {
        if self.name.is_empty() || !self.name.bytes().all(is_token_byte) {
            return Err(TesseraError::internal(format!(
                "Invalid cookie name \"{}\"",
                self.name
            )));
        }
        for (attribute, text) in [("Domain", self.domain.as_deref()), ("Path", Some(&self.path))] {
            if let Some(text) = text {
                if !text.bytes().all(is_attribute_byte) {
                    return Err(TesseraError::internal(format!(
                        "Invalid cookie {attribute} \"{text}\""
                    )));
                }
            }
        }

        let mut parts = vec![format!(
            "{}={}",
            self.name,
            urlencoding::encode(&self.value)
        )];
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if let Some(domain) = &self.domain {
            parts.push(format!("Domain={domain}"));
        }
        parts.push(format!("Path={}", self.path));
        if let Some(expires) = self.expires {
            parts.push(format!(
                "Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if let Some(priority) = self.priority {
            parts.push(format!("Priority={priority}"));
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }
        Ok(parts.join("; "))
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn is_attribute_byte(b: u8) -> bool {
    (0x20..0x7f).contains(&b) && b != b';'
}

/// Adds `Set-Cookie` support to [`Response`].
pub trait SetCookieExt {
    /// Appends a `Set-Cookie` header.
    fn set_cookie(&mut self, cookie: &SetCookie) -> Result<(), TesseraError>;
}

impl SetCookieExt for Response {
    fn set_cookie(&mut self, cookie: &SetCookie) -> Result<(), TesseraError> {
        let value = HeaderValue::try_from(cookie.to_header_value()?)
            .map_err(|e| TesseraError::internal_with_source("Invalid Set-Cookie header", e))?;
        self.headers_mut().append(SET_COOKIE, value);
        Ok(())
    }
}

impl SetCookieExt for HeaderMap {
    fn set_cookie(&mut self, cookie: &SetCookie) -> Result<(), TesseraError> {
        let value = HeaderValue::try_from(cookie.to_header_value()?)
            .map_err(|e| TesseraError::internal_with_source("Invalid Set-Cookie header", e))?;
        self.append(SET_COOKIE, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tessera_core::schema::Validator;

    #[test]
    fn test_parse_multiple_cookies() {
        let cookies = parse_cookie_header("session=abc; theme=dark").unwrap();
        assert_eq!(cookies["session"], json!("abc"));
        assert_eq!(cookies["theme"], json!("dark"));
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let cookies = parse_cookie_header("token=a=b==").unwrap();
        assert_eq!(cookies["token"], json!("a=b=="));
    }

    #[test]
    fn test_malformed_pair() {
        let err = parse_cookie_header("session=abc; garbage").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Cookie header is incorrectly formatted!");
    }

    #[test]
    fn test_empty_header() {
        assert!(parse_cookie_header("").unwrap().is_empty());
    }

    #[test]
    fn test_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("b=2"));
        let cookies = cookies_from_headers(&headers).unwrap();
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_interceptor_reports_missing_cookie() {
        let interceptor = CookieInterceptor::new(
            FieldSchema::new()
                .present("session")
                .field("theme", Validator::one_of(["dark", "light"]).optional()),
        );
        let exchange = RawExchange::new(
            http::Method::GET,
            http::Uri::from_static("/"),
            HeaderMap::new(),
            tessera_core::empty_body(),
        );
        let err = interceptor.extract(&exchange).unwrap_err();
        assert!(err.to_string().contains("cookie named \"session\""));
        assert!(err.to_string().contains("session, theme"));
    }

    #[test]
    fn test_set_cookie_defaults() {
        let header = SetCookie::new("session", "a b").to_header_value().unwrap();
        assert_eq!(header, "session=a%20b; Path=/");
    }

    #[test]
    fn test_set_cookie_full() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let header = SetCookie::new("id", "1")
            .domain("example.com")
            .path("/app")
            .max_age(Duration::from_secs(60))
            .expires(expires)
            .http_only(true)
            .secure(true)
            .priority(Priority::High)
            .same_site(SameSite::Lax)
            .to_header_value()
            .unwrap();
        assert_eq!(
            header,
            "id=1; Max-Age=60; Domain=example.com; Path=/app; \
             Expires=Wed, 02 Jan 2030 03:04:05 GMT; HttpOnly; Secure; Priority=High; SameSite=Lax"
        );
    }

    #[test]
    fn test_set_cookie_rejects_bad_name() {
        assert!(SetCookie::new("bad name", "x").to_header_value().is_err());
        assert!(SetCookie::new("ok", "x").path("/a;b").to_header_value().is_err());
    }

    #[test]
    fn test_remove_cookie() {
        let header = SetCookie::remove("session").to_header_value().unwrap();
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn test_response_set_cookie() {
        let mut response = Response::ok(());
        response.set_cookie(&SetCookie::new("a", "1")).unwrap();
        response.set_cookie(&SetCookie::new("b", "2")).unwrap();
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }
}
