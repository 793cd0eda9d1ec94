//! Error type definitions for the source-proxy application
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

use crate::models::ProviderAttempt;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source resolution and proxying errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while resolving sources or proxying manifests/segments.
///
/// This is the concrete realization of the error taxonomy: upstream
/// unavailability and timeouts are recovered locally by the aggregator,
/// SSRF rejections happen before any outbound request, parse failures
/// surface as "nothing found here" responses.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network-level failure or refused connection from a provider/origin
    #[error("Upstream unavailable: {context} - {message}")]
    UpstreamUnavailable { context: String, message: String },

    /// Upstream answered with a non-success status
    #[error("Upstream HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A body was received but no manifest/stream could be extracted
    #[error("Parse failure: {context} - {message}")]
    ParseFailure { context: String, message: String },

    /// Target host is not on the proxy allow-list
    #[error("Host not allowed: {host}")]
    SsrfRejected { host: String },

    /// A strategy or adapter exceeded its deadline
    #[error("Timeout after {seconds}s: {context}")]
    Timeout { context: String, seconds: u64 },

    /// Missing or malformed request input
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Every retrieval strategy in a fallback chain failed
    #[error("All strategies failed for {target} ({} attempts)", attempts.len())]
    AllStrategiesFailed {
        target: String,
        attempts: Vec<ProviderAttempt>,
    },
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Invalid request format
    #[error("Invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    /// Missing required query parameter
    #[error("Missing parameter: {parameter}")]
    MissingParameter { parameter: String },

    /// JSON parsing errors
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create an upstream-unavailable error
    pub fn unavailable<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        Self::UpstreamUnavailable {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a parse failure
    pub fn parse_failure<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        Self::ParseFailure {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<C: Into<String>>(context: C, seconds: u64) -> Self {
        Self::Timeout {
            context: context.into(),
            seconds,
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Flatten a fallback trace into one line per attempt, oldest first.
    /// Used to build the synthetic debug source when a chain exhausts.
    pub fn trace_summary(&self) -> Option<String> {
        match self {
            Self::AllStrategiesFailed { attempts, .. } => Some(
                attempts
                    .iter()
                    .map(|attempt| attempt.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}

impl WebError {
    /// Create an invalid request error
    pub fn invalid_request<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter<P: Into<String>>(parameter: P) -> Self {
        Self::MissingParameter {
            parameter: parameter.into(),
        }
    }
}
