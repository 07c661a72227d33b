use std::time::Duration;

use switchboard_config::ConfigViolations;
use thiserror::Error;

/// Boxed original cause carried by every error variant
pub type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of a [`BridgeError`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid bridge configuration
    Configuration,
    /// Missing or rejected credentials
    Authentication,
    /// Request rate exceeded
    RateLimit,
    /// Usage quota exhausted
    QuotaExceeded,
    /// Provider rejected the request, including safety blocks
    InvalidRequest,
    /// Account has no remaining credit
    InsufficientCredits,
    /// Provider overloaded, unreachable or failing
    ServiceUnavailable,
    /// Transport failure (DNS, reset connections)
    Network,
    /// Model unknown to the provider
    ModelNotSupported,
    /// Provider payload could not be decoded
    ResponseParsing,
    /// Call exceeded its deadline
    Timeout,
    /// Anything unrecognized
    Generic,
}

/// Errors surfaced by every bridge
///
/// Each variant carries a human-readable message and, when one exists, the
/// original cause as its `source`.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration failed validation
    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
        /// Every violated constraint
        violations: Vec<String>,
        #[source]
        source: Option<Source>,
    },

    /// Credentials were missing or rejected
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Provider rate limit hit
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        /// How long the provider asked callers to wait
        retry_after: Option<Duration>,
        /// Request limit for the current window
        limit: Option<u64>,
        /// Requests remaining in the current window
        remaining: Option<u64>,
        /// When the window resets, as reported by the provider
        reset: Option<String>,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Usage quota exhausted
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        quota_type: Option<String>,
        used: Option<u64>,
        total: Option<u64>,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Provider rejected the request
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        /// Set when a moderation or safety system blocked the request
        blocked: bool,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Account lacks credit
    #[error("insufficient credits: {message}")]
    InsufficientCredits {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Provider unavailable or failing
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Transport-level failure
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// Model not available from the provider
    #[error("model not supported: {model}: {message}")]
    ModelNotSupported {
        message: String,
        model: String,
        /// Known model ids, when available
        supported: Vec<String>,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },

    /// Provider payload could not be decoded
    #[error("failed to parse response: {message}")]
    ResponseParsing {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// Call exceeded its deadline
    #[error("request timed out: {message}")]
    Timeout {
        message: String,
        /// The configured deadline
        timeout: Option<Duration>,
        #[source]
        source: Option<Source>,
    },

    /// Unrecognized failure
    #[error("{message}")]
    Generic {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Source>,
    },
}

impl BridgeError {
    /// Configuration failure listing every violation
    pub fn configuration(violations: Vec<String>) -> Self {
        Self::Configuration {
            message: violations.join("; "),
            violations,
            source: None,
        }
    }

    /// Request the mapper or provider refused
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            blocked: false,
            status: None,
            source: None,
        }
    }

    /// Request blocked by a provider safety system
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            blocked: true,
            status: None,
            source: None,
        }
    }

    /// Undecodable provider payload
    pub fn response_parsing(message: impl Into<String>, source: Option<Source>) -> Self {
        Self::ResponseParsing {
            message: message.into(),
            source,
        }
    }

    /// Deadline exceeded
    pub fn timeout(timeout: Option<Duration>, source: Option<Source>) -> Self {
        let message = timeout.map_or_else(
            || "deadline exceeded".to_owned(),
            |t| format!("no response within {}ms", t.as_millis()),
        );
        Self::Timeout {
            message,
            timeout,
            source,
        }
    }

    /// Unrecognized failure
    pub fn generic(message: impl Into<String>, source: Option<Source>) -> Self {
        Self::Generic {
            message: message.into(),
            status: None,
            source,
        }
    }

    /// Kind of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::InsufficientCredits { .. } => ErrorKind::InsufficientCredits,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Self::Network { .. } => ErrorKind::Network,
            Self::ModelNotSupported { .. } => ErrorKind::ModelNotSupported,
            Self::ResponseParsing { .. } => ErrorKind::ResponseParsing,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// Whether a caller-side retry policy may reasonably retry
    ///
    /// Transient provider or transport issues are retryable; anything that
    /// will fail identically on a second attempt is not.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. } | Self::ServiceUnavailable { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }

    /// HTTP status the provider answered with, when known
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::RateLimit { status, .. }
            | Self::QuotaExceeded { status, .. }
            | Self::InvalidRequest { status, .. }
            | Self::InsufficientCredits { status, .. }
            | Self::ServiceUnavailable { status, .. }
            | Self::ModelNotSupported { status, .. }
            | Self::Generic { status, .. } => *status,
            Self::Configuration { .. } | Self::Network { .. } | Self::ResponseParsing { .. } | Self::Timeout { .. } => {
                None
            }
        }
    }

    /// Whether a provider safety system blocked the request
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::InvalidRequest { blocked: true, .. })
    }
}

impl From<ConfigViolations> for BridgeError {
    fn from(violations: ConfigViolations) -> Self {
        Self::configuration(violations.violations)
    }
}
