//! Content-type keyed body parser registry.

use crate::body::{BodyParser, JsonParser, TextParser, UrlEncodedParser};
use crate::content_type::{APPLICATION_FORM, APPLICATION_JSON, MULTIPART_FORM_DATA, TEXT_PLAIN};
use crate::multipart::MultipartParser;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps lower-cased `type/subtype` strings to body parsers.
///
/// The registry can be extended while handlers are serving requests;
/// lookups take a read lock and clone the parser handle.
///
/// # Example
///
/// ```
/// use tessera_extract::{BodyParserRegistry, TextParser};
///
/// let registry = BodyParserRegistry::with_defaults();
/// assert!(registry.contains("application/json"));
///
/// registry.register("text/csv", TextParser);
/// assert!(registry.get("TEXT/CSV").is_some());
/// ```
pub struct BodyParserRegistry {
    parsers: RwLock<HashMap<String, Arc<dyn BodyParser>>>,
}

impl BodyParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry holding the JSON, form, text and multipart parsers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(APPLICATION_JSON, JsonParser);
        registry.register(APPLICATION_FORM, UrlEncodedParser);
        registry.register(TEXT_PLAIN, TextParser);
        registry.register(MULTIPART_FORM_DATA, MultipartParser);
        registry
    }

    /// Adds or replaces the parser for a content type.
    pub fn register(&self, content_type: impl AsRef<str>, parser: impl BodyParser) {
        self.register_arc(content_type, Arc::new(parser));
    }

    /// Adds or replaces the parser for a content type from a shared handle.
    pub fn register_arc(&self, content_type: impl AsRef<str>, parser: Arc<dyn BodyParser>) {
        let key = content_type.as_ref().to_ascii_lowercase();
        tracing::debug!(content_type = %key, "registered body parser");
        self.parsers.write().insert(key, parser);
    }

    /// Returns the parser for a content type.
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<Arc<dyn BodyParser>> {
        self.parsers
            .read()
            .get(&content_type.to_ascii_lowercase())
            .cloned()
    }

    /// Returns `true` if a parser is registered for the content type.
    #[must_use]
    pub fn contains(&self, content_type: &str) -> bool {
        self.parsers
            .read()
            .contains_key(&content_type.to_ascii_lowercase())
    }

    /// Returns the registered content types, sorted.
    #[must_use]
    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.parsers.read().keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for BodyParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BodyParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyParserRegistry")
            .field("content_types", &self.content_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{FnBodyParser, ParsedBody};
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let registry = BodyParserRegistry::default();
        assert_eq!(
            registry.content_types(),
            vec![
                APPLICATION_JSON.to_string(),
                APPLICATION_FORM.to_string(),
                MULTIPART_FORM_DATA.to_string(),
                TEXT_PLAIN.to_string(),
            ]
        );
    }

    #[test]
    fn test_register_overrides() {
        let registry = BodyParserRegistry::with_defaults();
        let before = registry.get(APPLICATION_JSON).unwrap();
        registry.register(
            APPLICATION_JSON,
            FnBodyParser::new(|_, _| async {
                Ok::<_, tessera_core::TesseraError>(ParsedBody::body(json!("custom")))
            }),
        );
        let after = registry.get(APPLICATION_JSON).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_empty_registry() {
        let registry = BodyParserRegistry::new();
        assert!(registry.get(APPLICATION_JSON).is_none());
        assert!(registry.content_types().is_empty());
    }
}
