//! Interception moments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a response is being finalized.
///
/// Every terminal outcome of the pipeline is tagged with exactly one moment
/// before response interceptors run. `Always` is never produced by the
/// pipeline; it only appears in response interceptor filters, where it
/// matches every moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterceptionMoment {
    /// Schema validation of the incoming request failed.
    DataValidationFailed,
    /// A raw interceptor answered with a non-error response.
    RawInterceptorPreventedProgressionWithOkResponse,
    /// A raw interceptor answered with an error.
    RawInterceptorPreventedProgressionWithErrorResponse,
    /// A request interceptor answered with a non-error response.
    InterceptorPreventedProgressionWithOkResponse,
    /// A request interceptor answered with an error.
    InterceptorPreventedProgressionWithErrorResponse,
    /// A guard denied the request.
    GuardPreventedProgression,
    /// The route handler produced a non-error response.
    HandlerFinishedWithOkResponse,
    /// The route handler produced an error.
    HandlerFinishedWithErrorResponse,
    /// Matches every moment.
    Always,
}

impl InterceptionMoment {
    /// Every moment, in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::DataValidationFailed,
        Self::RawInterceptorPreventedProgressionWithOkResponse,
        Self::RawInterceptorPreventedProgressionWithErrorResponse,
        Self::InterceptorPreventedProgressionWithOkResponse,
        Self::InterceptorPreventedProgressionWithErrorResponse,
        Self::GuardPreventedProgression,
        Self::HandlerFinishedWithOkResponse,
        Self::HandlerFinishedWithErrorResponse,
        Self::Always,
    ];

    /// Returns the wire name of the moment.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DataValidationFailed => "data-validation-failed",
            Self::RawInterceptorPreventedProgressionWithOkResponse => {
                "raw-interceptor-prevented-progression-with-ok-response"
            }
            Self::RawInterceptorPreventedProgressionWithErrorResponse => {
                "raw-interceptor-prevented-progression-with-error-response"
            }
            Self::InterceptorPreventedProgressionWithOkResponse => {
                "interceptor-prevented-progression-with-ok-response"
            }
            Self::InterceptorPreventedProgressionWithErrorResponse => {
                "interceptor-prevented-progression-with-error-response"
            }
            Self::GuardPreventedProgression => "guard-prevented-progression",
            Self::HandlerFinishedWithOkResponse => "handler-finished-with-ok-response",
            Self::HandlerFinishedWithErrorResponse => "handler-finished-with-error-response",
            Self::Always => "always",
        }
    }

    /// Moment for a raw interceptor short-circuit.
    #[must_use]
    pub const fn raw_interceptor(is_error: bool) -> Self {
        if is_error {
            Self::RawInterceptorPreventedProgressionWithErrorResponse
        } else {
            Self::RawInterceptorPreventedProgressionWithOkResponse
        }
    }

    /// Moment for a request interceptor short-circuit.
    #[must_use]
    pub const fn request_interceptor(is_error: bool) -> Self {
        if is_error {
            Self::InterceptorPreventedProgressionWithErrorResponse
        } else {
            Self::InterceptorPreventedProgressionWithOkResponse
        }
    }

    /// Moment for a finished handler.
    #[must_use]
    pub const fn handler(is_error: bool) -> Self {
        if is_error {
            Self::HandlerFinishedWithErrorResponse
        } else {
            Self::HandlerFinishedWithOkResponse
        }
    }

    /// Returns `true` if a filter of `self` accepts `moment`.
    #[must_use]
    pub fn matches(&self, moment: Self) -> bool {
        *self == Self::Always || *self == moment
    }
}

impl fmt::Display for InterceptionMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown moment names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interception moment: {0}")]
pub struct UnknownMoment(pub String);

impl FromStr for InterceptionMoment {
    type Err = UnknownMoment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMoment(s.to_string()))
    }
}
