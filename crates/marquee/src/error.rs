//! Error types for the marquee edge.

use std::fmt;

use thiserror::Error;

/// Edge errors.
#[derive(Debug, Error)]
pub enum MarqueeError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// The static origin could not be reached or returned an unreadable response.
    #[error("Origin error: {message}")]
    Origin {
        /// Error message.
        message: String,
    },

    /// The metadata API could not be reached or answered with an unusable body.
    #[error("Metadata error: {message}")]
    Metadata {
        /// Error message.
        message: String,
    },

    /// Edge cache failure.
    #[error("Cache error: {message}")]
    Cache {
        /// Error message.
        message: String,
    },

    /// The inbound request could not be read.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Server startup error.
    #[error("Server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request client error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl MarqueeError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an origin error.
    pub fn origin(message: impl Into<String>) -> Self {
        Self::Origin {
            message: message.into(),
        }
    }

    /// Create a metadata error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config { .. } => 500,
            Self::Origin { .. } => 502,
            Self::Metadata { .. } => 502,
            Self::Cache { .. } => 500,
            Self::BadRequest { .. } => 400,
            Self::Server { .. } => 500,
            Self::Io(_) => 500,
            Self::Http(_) => 400,
            Self::Json(_) => 400,
            Self::Request(_) => 502,
            Self::Internal { .. } => 500,
        }
    }

    /// Check if this error is recoverable.
    ///
    /// Metadata and cache failures never fail a request; the pipeline
    /// degrades to serving the shell unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Metadata { .. } | Self::Cache { .. } | Self::Request(_)
        )
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Origin { .. } => "origin",
            Self::Metadata { .. } => "metadata",
            Self::Cache { .. } => "cache",
            Self::BadRequest { .. } => "bad_request",
            Self::Server { .. } => "server",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Request(_) => "request",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type for edge operations.
pub type MarqueeResult<T> = Result<T, MarqueeError>;

/// JSON body returned when the edge itself fails a request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Error code/category.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&MarqueeError> for ErrorResponse {
    fn from(err: &MarqueeError) -> Self {
        Self::new(err.category(), err.to_string())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error, self.message)
    }
}
