//! # Tessera Middleware
//!
//! The per-route request pipeline of Tessera.
//!
//! A [`Route`] declares what a request must look like and which steps it
//! passes through; a [`Handler`] runs it.
//!
//! ## Pipeline Stages
//!
//! ```text
//! RawExchange → Forge → Raw interceptors → Request interceptors → Guards → Route handler
//!                 │             │                   │                │            │
//!                 └─────────────┴───────────────────┴────────────────┴────────────┘
//!                                              ↓
//!                      Response interceptors (always, tagged with the moment) → send
//! ```
//!
//! | Stage | Short-circuit moment |
//! |-------|----------------------|
//! | Forge | `data-validation-failed` |
//! | Raw interceptors | `raw-interceptor-prevented-progression-with-{ok,error}-response` |
//! | Request interceptors | `interceptor-prevented-progression-with-{ok,error}-response` |
//! | Guards | `guard-prevented-progression` |
//! | Route handler | `handler-finished-with-{ok,error}-response` |
//!
//! ## Services
//!
//! Every callable declares its parameters with `inject`; names after the
//! leading request (or response and request) are resolved from the request
//! scope by the [`ServiceResolver`]. A missing service answers 500 and the
//! callable is never invoked.
//!
//! ## Example
//!
//! ```
//! use tessera_middleware::{guard_fn, handler_fn, Handler, Route, Services};
//! use tessera_core::di::{Binding, Container};
//! use tessera_core::schema::{FieldSchema, Validator};
//! use tessera_core::{Request, TesseraError};
//! use http::Method;
//!
//! let container = Container::new();
//! container.register("greeting", Binding::value("hello".to_string()));
//!
//! let route = Route::builder(Method::GET, "/greet")
//!     .query_params(FieldSchema::new().field("name", Validator::non_empty()))
//!     .guard(guard_fn(|_: &Request, _: Services| async { true }))
//!     .handler(
//!         handler_fn(|req: &Request, services: Services| {
//!             let name = req.query_params()["name"].clone();
//!             async move {
//!                 let greeting = services.get::<String>("greeting")?;
//!                 Ok::<_, TesseraError>(format!("{greeting}, {}", name.as_str().unwrap_or_default()))
//!             }
//!         })
//!         .inject(["request", "greeting"]),
//!     )
//!     .build();
//!
//! let handler = Handler::new(&container, route);
//! assert_eq!(handler.name(), "Handler::GET\"/greet\"");
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregate;
mod controller;
mod forge;
mod guard;
mod handler;
mod interceptor;
mod options;
mod route;
mod services;
mod step;

pub use aggregate::aggregate_schema;
pub use controller::Controller;
pub use forge::{forge_request, ForgeError};
pub use guard::{guard_fn, FnGuard, Guard, GuardStep, Verdict, DENIED_MESSAGE};
pub use handler::{Handler, HANDLER_PANIC_MESSAGE};
pub use interceptor::{
    interceptor_fn, response_interceptor_fn, FnRequestInterceptor, FnResponseInterceptor,
    Intercepted, RequestInterceptor, RequestInterceptorStep, ResponseInterceptor,
    ResponseInterceptorStep,
};
pub use options::{HandlerOptions, PanicPolicy};
pub use route::{handler_fn, FnHandler, Route, RouteBuilder, RouteHandler, DEFAULT_HANDLER_MESSAGE};
pub use services::{
    inject, CallableKey, DeclaresParameters, ServiceResolver, Services, Signature, Stage,
};
pub use step::{Named, Step};
