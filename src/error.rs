//! Error types for Power BI authentication

use thiserror::Error;

/// Main error type for authentication flows
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider could not start the requested flow
    #[error("Fail to create device flow. Err: {0}")]
    FlowInitiation(String),

    /// The identity provider answered without an access token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP transport failure talking to the identity provider
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decode/encode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (loopback listener, browser launch)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response from the identity provider could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A flow did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Browser could not be opened
    #[error("Could not open browser: {0}")]
    BrowserOpen(String),

    /// The redirect carried a `state` that does not match the request
    #[error("OAuth state mismatch in redirect")]
    StateMismatch,
}

/// Result type alias for authentication operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create a flow initiation error
    pub fn flow_initiation(msg: impl Into<String>) -> Self {
        Self::FlowInitiation(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a browser open error
    pub fn browser_open(msg: impl Into<String>) -> Self {
        Self::BrowserOpen(msg.into())
    }

    /// Whether this error came from the identity provider rejecting the flow,
    /// as opposed to transport or local failures
    #[must_use]
    pub fn is_provider_rejection(&self) -> bool {
        matches!(
            self,
            Self::FlowInitiation(_) | Self::Authentication(_) | Self::StateMismatch
        )
    }
}
