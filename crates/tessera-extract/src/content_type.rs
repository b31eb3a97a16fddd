//! Content type resolution.
//!
//! [`resolve_content_type`] turns a `Content-Type` header into a
//! [`ContentType`] whose parameters always carry what the matching parser
//! needs: a charset for textual bodies, a boundary for multipart ones.
//!
//! | Type | Default parameters |
//! |---|---|
//! | `application/x-www-form-urlencoded` | `charset=utf8` |
//! | `application/json` | `charset=latin1` |
//! | `text/plain` | `charset=utf8` |
//! | `multipart/form-data` | none, `boundary` is required |
//! | anything else | `charset=utf8` |

use indexmap::IndexMap;
use tessera_core::TesseraError;

/// `application/json`
pub const APPLICATION_JSON: &str = "application/json";
/// `application/x-www-form-urlencoded`
pub const APPLICATION_FORM: &str = "application/x-www-form-urlencoded";
/// `text/plain`
pub const TEXT_PLAIN: &str = "text/plain";
/// `multipart/form-data`
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// A resolved content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    mime: String,
    params: IndexMap<String, String>,
}

impl ContentType {
    /// Returns the lower-cased `type/subtype`.
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Returns the resolved parameters.
    #[must_use]
    pub const fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// Returns the charset parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").map(String::as_str)
    }

    /// Returns the multipart boundary.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.params.get("boundary").map(String::as_str)
    }

    /// Returns `true` for `multipart/form-data`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.mime == MULTIPART_FORM_DATA
    }
}

/// Returns the charset assumed for a type declared without parameters.
#[must_use]
pub fn default_charset(mime: &str) -> &'static str {
    match mime {
        APPLICATION_JSON => "latin1",
        _ => "utf8",
    }
}

/// Parses a `Content-Type` header value.
///
/// Fails with Bad Request when the value is malformed or when a multipart
/// type lacks its boundary.
///
/// # Example
///
/// ```
/// use tessera_extract::resolve_content_type;
///
/// let json = resolve_content_type("application/json").unwrap();
/// assert_eq!(json.charset(), Some("latin1"));
///
/// assert!(resolve_content_type("multipart/form-data").is_err());
/// ```
pub fn resolve_content_type(raw: &str) -> Result<ContentType, TesseraError> {
    let parsed: mime::Mime = raw.trim().parse().map_err(|_| {
        TesseraError::bad_request(format!("The Content-Type header \"{raw}\" is malformed!"))
    })?;
    let mime = parsed.essence_str().to_ascii_lowercase();
    let declared: Vec<(String, String)> = parsed
        .params()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                value.as_str().trim_matches('"').to_string(),
            )
        })
        .collect();

    let mut params = IndexMap::new();
    if mime == MULTIPART_FORM_DATA {
        let boundary = declared
            .iter()
            .find(|(name, _)| name == "boundary")
            .map(|(_, value)| value.clone())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                TesseraError::bad_request(
                    "A multipart/form-data request must declare a boundary in its Content-Type header!",
                )
            })?;
        params.insert("boundary".to_string(), boundary);
    } else if declared.is_empty() {
        params.insert("charset".to_string(), default_charset(&mime).to_string());
    } else if let Some((_, charset)) = declared.iter().find(|(name, _)| name == "charset") {
        params.insert("charset".to_string(), charset.to_ascii_lowercase());
    } else if let Some((name, value)) = declared.into_iter().next() {
        params.insert(name, value);
    }

    Ok(ContentType { mime, params })
}
