//! # Tessera Core
//!
//! Core types for the Tessera request pipeline.
//!
//! - [`Request`] - The typed, validated request
//! - [`Response`] - Terminal outcome tagged with an [`InterceptionMoment`]
//! - [`TesseraError`] - Standard error type with HTTP status mapping
//! - [`schema`] - Field, body and file schemas and their aggregation
//! - [`di`] - Name-keyed container and per-request scopes
//! - [`RawExchange`] - The transport-level request seen by raw interceptors

#![doc(html_root_url = "https://docs.rs/tessera-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod di;
mod error;
mod moment;
mod raw;
mod request;
mod response;
pub mod schema;
mod upload;

pub use context::RequestId;
pub use error::{
    ErrorCategory, ErrorDetail, ErrorEnvelope, TesseraError, TesseraResult,
    MISSING_SERVICE_MESSAGE,
};
pub use moment::{InterceptionMoment, UnknownMoment};
pub use raw::{empty_body, BodyStream, BoxFuture, RawExchange, RawFlow, RawInterceptor};
pub use request::{header_map_to_json, url_params_to_json, Request, UrlParams};
pub use response::{Payload, Reply, Response};
pub use upload::{Files, UploadedFile};
