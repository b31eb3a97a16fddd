//! Error types for Tessera.
//!
//! This module provides the [`TesseraError`] type, the error every pipeline
//! stage reports with. Each variant maps to an [`ErrorCategory`], which in
//! turn maps to an HTTP status code.
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `BadRequest` | 400 |
//! | `Unauthorized` | 401 |
//! | `Forbidden` | 403 |
//! | `NotFound` | 404 |
//! | `PayloadTooLarge` | 413 |
//! | `UnsupportedMediaType` | 415 |
//! | `Internal` | 500 |
//! | `MissingService` | 500 |
//!
//! `MissingService` is a server error that is always logged with the
//! dependency names the failing callable expected. Clients only ever see a
//! generic internal error message for it.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`TesseraError`].
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Message sent to clients when a callable's services could not be resolved.
pub const MISSING_SERVICE_MESSAGE: &str = "Missing/unresolved required service for this route";

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Schema or shape validation failure, malformed input.
    BadRequest,
    /// Guard denial.
    Unauthorized,
    /// Caller is known but not allowed.
    Forbidden,
    /// Resource not found.
    NotFound,
    /// Body stream exceeded the configured ceiling.
    PayloadTooLarge,
    /// No parser registered for the negotiated content type.
    UnsupportedMediaType,
    /// Internal server errors.
    Internal,
    /// A declared service could not be resolved.
    MissingService,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal | Self::MissingService => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for categories caused by the client.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal | Self::MissingService)
    }
}

/// Standard error type for Tessera.
///
/// # Example
///
/// ```
/// use tessera_core::TesseraError;
///
/// fn require_limit(raw: Option<&str>) -> Result<u32, TesseraError> {
///     let raw = raw.ok_or_else(|| TesseraError::bad_request("limit is required"))?;
///     raw.parse()
///         .map_err(|_| TesseraError::bad_request("limit must be an integer"))
/// }
///
/// assert!(require_limit(Some("10")).is_ok());
/// assert_eq!(require_limit(None).unwrap_err().status_code(), 400);
/// ```
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Request data failed validation.
    #[error("{message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Machine-readable details (e.g. the expected body shape).
        details: Option<serde_json::Value>,
    },

    /// Access denied to an unauthenticated caller.
    #[error("{message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// Access denied to a known caller.
    #[error("{message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The request body exceeded the configured ceiling.
    #[error("Request body exceeds the maximum allowed size of {limit} bytes")]
    PayloadTooLarge {
        /// The configured ceiling in bytes.
        limit: u64,
    },

    /// No parser is registered for the request's content type.
    #[error("Content type \"{content_type}\" is not supported by this route")]
    UnsupportedMediaType {
        /// The negotiated content type.
        content_type: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// One or more declared services could not be resolved.
    #[error("Missing/unresolved service \"{missing}\", expected: [{}]", expected.join(", "))]
    MissingService {
        /// Every service name the callable declared.
        expected: Vec<String>,
        /// The first name that failed to resolve.
        missing: String,
    },
}

impl TesseraError {
    /// Creates a bad request error with a message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a bad request error carrying machine-readable details.
    #[must_use]
    pub fn bad_request_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[must_use]
    pub const fn payload_too_large(limit: u64) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Creates an unsupported media type error.
    #[must_use]
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a missing service error.
    #[must_use]
    pub fn missing_service(expected: Vec<String>, missing: impl Into<String>) -> Self {
        Self::MissingService {
            expected,
            missing: missing.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest { .. } => ErrorCategory::BadRequest,
            Self::Unauthorized { .. } => ErrorCategory::Unauthorized,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            Self::UnsupportedMediaType { .. } => ErrorCategory::UnsupportedMediaType,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::MissingService { .. } => ErrorCategory::MissingService,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns the message safe to show to clients.
    ///
    /// Missing services never leak the names of the dependencies involved.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingService { .. } => MISSING_SERVICE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.to_detail(),
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Builds the error detail block shown to clients.
    #[must_use]
    pub fn to_detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.error_code().to_string(),
            message: self.public_message(),
            category: self.category(),
            details: self.error_details(),
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            Self::Internal { .. } | Self::MissingService { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::BadRequest { details, .. } => details.clone(),
            Self::PayloadTooLarge { limit } => Some(serde_json::json!({ "limit": limit })),
            Self::UnsupportedMediaType { content_type } => {
                Some(serde_json::json!({ "content_type": content_type }))
            }
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TesseraError::bad_request("x").status_code(), 400);
        assert_eq!(TesseraError::unauthorized("x").status_code(), 401);
        assert_eq!(TesseraError::forbidden("x").status_code(), 403);
        assert_eq!(TesseraError::not_found("x").status_code(), 404);
        assert_eq!(TesseraError::payload_too_large(10).status_code(), 413);
        assert_eq!(
            TesseraError::unsupported_media_type("a/b").status_code(),
            415
        );
        assert_eq!(TesseraError::internal("x").status_code(), 500);
        assert_eq!(
            TesseraError::missing_service(vec!["db".into()], "db").status_code(),
            500
        );
    }

    #[test]
    fn test_missing_service_is_hidden_from_clients() {
        let err = TesseraError::missing_service(vec!["db".into(), "cache".into()], "cache");
        assert!(err.to_string().contains("db, cache"));

        let envelope = err.to_envelope(Some("req-1"));
        assert_eq!(envelope.error.message, MISSING_SERVICE_MESSAGE);
        assert_eq!(envelope.error.code, "INTERNAL_ERROR");
        assert_eq!(envelope.error.category, ErrorCategory::MissingService);
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_bad_request_details_in_envelope() {
        let err = TesseraError::bad_request_with_details(
            "bad body",
            serde_json::json!({ "expected": "{ name: string }" }),
        );
        let json = serde_json::to_value(err.to_envelope(None)).unwrap();
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["category"], "bad_request");
        assert_eq!(json["error"]["details"]["expected"], "{ name: string }");
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ErrorCategory::BadRequest.is_client_error());
        assert!(ErrorCategory::PayloadTooLarge.is_client_error());
        assert!(!ErrorCategory::Internal.is_client_error());
        assert!(!ErrorCategory::MissingService.is_client_error());
    }

    #[test]
    fn test_internal_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = TesseraError::internal_with_source("upload failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
