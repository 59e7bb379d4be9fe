//! Error types for Misty client operations

use thiserror::Error;

/// Result type alias for Misty client operations
pub type Result<T> = std::result::Result<T, MistyClientError>;

/// Errors that can occur while talking to a Misty robot
#[derive(Error, Debug)]
pub enum MistyClientError {
    /// Transport-level failure (connection refused, timeout, DNS, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Robot answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Robot answered 2xx but reported `"status": "Failed"`
    #[error("Robot reported failure: {0}")]
    Api(String),

    /// Failed to decode a response or event frame
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A subscription with this name is already registered
    #[error("Subscription already registered: {0}")]
    DuplicateName(String),

    /// No subscription with this name is registered
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    /// WebSocket could not be opened, the robot rejected or never answered
    /// the subscription, or the event stream ended
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Operation requires an active subscription
    #[error("No active WebSocket subscription for {0}")]
    NotSubscribed(String),

    /// `subscribe()` called on a channel that is already open
    #[error("Subscription {0} is already active")]
    AlreadySubscribed(String),

    /// A bounded wait ran out of time
    #[error("Timed out")]
    Timeout,

    /// Argument rejected before sending
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Speech synthesis backend failed
    #[error("Speech synthesis failed: {0}")]
    Speech(String),
}

impl MistyClientError {
    /// Create an HTTP error from status code and body
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
