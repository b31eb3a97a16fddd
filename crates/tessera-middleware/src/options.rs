//! Handler options.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_extract::{BodyParserRegistry, ParserOptions};

/// What to do when a route handler panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanicPolicy {
    /// Log the panic and answer 200 with an empty payload.
    #[default]
    EmptyPayload,
    /// Log the panic and answer 500.
    InternalError,
}

/// Options shared by every request of a handler.
///
/// # Example
///
/// ```
/// use tessera_middleware::{HandlerOptions, PanicPolicy};
/// use tessera_extract::ParserOptions;
///
/// let options = HandlerOptions::new()
///     .parser(ParserOptions::new().max_body_size(1024))
///     .panic_policy(PanicPolicy::InternalError);
/// assert_eq!(options.parser.max_body_size, 1024);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct HandlerOptions {
    /// Body parser limits.
    pub parser: ParserOptions,
    /// Panic handling.
    pub panic_policy: PanicPolicy,
    /// Parsers by content type.
    pub registry: Arc<BodyParserRegistry>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            parser: ParserOptions::default(),
            panic_policy: PanicPolicy::default(),
            registry: Arc::new(BodyParserRegistry::with_defaults()),
        }
    }
}

impl HandlerOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parser limits.
    pub fn parser(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Sets the panic policy.
    pub const fn panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Shares a parser registry.
    pub fn registry(mut self, registry: Arc<BodyParserRegistry>) -> Self {
        self.registry = registry;
        self
    }
}
