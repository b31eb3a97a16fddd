//! # Tessera
//!
//! A per-route HTTP request pipeline: each route declares the shape of the
//! data it accepts and the interceptors and guards it passes through, and a
//! [`Handler`](middleware::Handler) turns raw exchanges into validated
//! requests and tagged responses.
//!
//! | Crate | Re-exported as | Contents |
//! |-------|----------------|----------|
//! | `tessera-core` | [`core`] | requests, responses, errors, schemas, DI container |
//! | `tessera-extract` | [`extract`] | content types, body parsers, cookies, query strings |
//! | `tessera-middleware` | [`middleware`] | routes, controllers, interceptors, guards, the handler |
//! | `tessera-telemetry` | [`telemetry`] | structured logging |
//! | `tessera-config` | [`config`] | layered configuration |
//!
//! ## Example
//!
//! ```rust
//! use tessera::prelude::*;
//! use http::Method;
//!
//! let config = ConfigLoader::new().with_production().load().unwrap();
//!
//! let route = Route::builder(Method::POST, "/users")
//!     .body(BodySchema::object().field("name", BodyType::String))
//!     .handler(handler_fn(|req: &Request, _: Services| {
//!         let name = req.body().cloned();
//!         async move { Ok::<_, TesseraError>(serde_json::json!({ "created": name })) }
//!     }))
//!     .build();
//!
//! let handler = Handler::with_options(&Container::new(), route, config.handler_options());
//! assert_eq!(handler.name(), "Handler::POST\"/users\"");
//! ```

#![doc(html_root_url = "https://docs.rs/tessera/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tessera_core as core;

// Re-export body, cookie and query parsing
pub use tessera_extract as extract;

// Re-export the pipeline
pub use tessera_middleware as middleware;

// Re-export logging setup
pub use tessera_telemetry as telemetry;

// Re-export configuration
pub use tessera_config as config;

/// Prelude module for convenient imports.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use tessera_core::{
        InterceptionMoment, Payload, RawExchange, RawFlow, RawInterceptor, Reply, Request,
        RequestId, Response, TesseraError, TesseraResult, UploadedFile, UrlParams,
    };

    // Re-export DI types
    pub use tessera_core::di::{Binding, Container, Scope, ServiceProvider};

    // Re-export schema types
    pub use tessera_core::schema::{
        BodySchema, BodyType, FieldSchema, FileSchema, SchemaSet, Validator,
    };

    // Re-export parsing types
    pub use tessera_extract::{BodyParserRegistry, ParserOptions, SetCookie};

    // Re-export pipeline types
    pub use tessera_middleware::{
        guard_fn, handler_fn, interceptor_fn, response_interceptor_fn, Controller, Guard,
        Handler, HandlerOptions, Intercepted, Named, PanicPolicy, RequestInterceptor,
        ResponseInterceptor, Route, RouteHandler, Services, Verdict,
    };

    // Re-export logging and configuration
    pub use tessera_config::{ConfigLoader, TesseraConfig};
    pub use tessera_telemetry::{init_logging, LogConfig};
}
