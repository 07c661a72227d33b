//! Maps provider and transport failures onto [`BridgeError`]
//!
//! Every failure raised while talking to a provider passes through here
//! before it reaches a caller. Errors that already are a [`BridgeError`] are
//! returned unchanged.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use switchboard_config::ConfigViolations;

use crate::error::{BridgeError, ErrorKind, Source};
use crate::protocol::{ErrorEnvelope, ErrorField};

/// Longest provider body excerpt kept in an error message
const MAX_BODY_EXCERPT: usize = 512;

/// Call details that shape classification
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    /// Provider family name, used in logs
    pub provider: String,
    /// Requested model id
    pub model: String,
    /// Configured call-level timeout
    pub timeout: Option<Duration>,
    /// Model ids known for the provider, reported on `ModelNotSupported`
    pub supported_models: Vec<String>,
}

/// Classify an arbitrary error
pub fn classify(error: Source, ctx: &ClassifyContext) -> BridgeError {
    let error = match error.downcast::<BridgeError>() {
        Ok(bridge) => return *bridge,
        Err(other) => other,
    };
    let error = match error.downcast::<reqwest::Error>() {
        Ok(transport_error) => return transport(*transport_error, ctx),
        Err(other) => other,
    };
    let error = match error.downcast::<serde_json::Error>() {
        Ok(json) => return BridgeError::response_parsing(json.to_string(), Some(json)),
        Err(other) => other,
    };
    let error = match error.downcast::<tokio::time::error::Elapsed>() {
        Ok(elapsed) => return BridgeError::timeout(ctx.timeout, Some(elapsed)),
        Err(other) => other,
    };
    let error = match error.downcast::<ConfigViolations>() {
        Ok(violations) => return BridgeError::from(*violations),
        Err(other) => other,
    };
    match error.downcast::<std::io::Error>() {
        Ok(io) => classify_io(*io, ctx),
        Err(other) => BridgeError::generic(other.to_string(), Some(other)),
    }
}

/// Classify an I/O error by its kind, unwrapping transport errors it carries
fn classify_io(error: std::io::Error, ctx: &ClassifyContext) -> BridgeError {
    use std::io::ErrorKind as IoKind;

    let carries_known = error
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>() || inner.is::<BridgeError>());
    if carries_known {
        return error
            .into_inner()
            .map_or_else(|| BridgeError::generic("i/o error", None), |inner| classify(inner, ctx));
    }

    match error.kind() {
        IoKind::ConnectionRefused => BridgeError::ServiceUnavailable {
            message: error.to_string(),
            status: None,
            source: Some(Box::new(error)),
        },
        IoKind::TimedOut => BridgeError::timeout(ctx.timeout, Some(Box::new(error))),
        IoKind::InvalidData | IoKind::UnexpectedEof => {
            BridgeError::response_parsing(error.to_string(), Some(Box::new(error)))
        }
        _ => BridgeError::Network {
            message: error.to_string(),
            source: Some(Box::new(error)),
        },
    }
}

/// Classify a transport error raised by the HTTP client
pub fn transport(error: reqwest::Error, ctx: &ClassifyContext) -> BridgeError {
    if error.is_timeout() {
        return BridgeError::timeout(ctx.timeout, Some(Box::new(error)));
    }

    if error.is_connect() {
        let message = chain_message(&error);
        if is_dns_failure(&message) {
            return BridgeError::Network {
                message,
                source: Some(Box::new(error)),
            };
        }
        return BridgeError::ServiceUnavailable {
            message,
            status: None,
            source: Some(Box::new(error)),
        };
    }

    if error.is_decode() || error.is_body() {
        return BridgeError::response_parsing(chain_message(&error), Some(Box::new(error)));
    }

    if let Some(status) = error.status() {
        return from_http(status, &HeaderMap::new(), "", ctx);
    }

    BridgeError::Network {
        message: chain_message(&error),
        source: Some(Box::new(error)),
    }
}

/// Classify a non-success HTTP response
///
/// Provider error codes win over the status code when both are present.
pub fn from_http(status: StatusCode, headers: &HeaderMap, body: &str, ctx: &ClassifyContext) -> BridgeError {
    let envelope: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    let detail = envelope.as_ref().and_then(|e| match &e.error {
        Some(ErrorField::Detail(detail)) => Some(detail),
        _ => None,
    });

    let codes: Vec<&str> = detail
        .map(|d| {
            [
                d.code.as_ref().and_then(serde_json::Value::as_str),
                d.error_type.as_deref(),
                d.status.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect()
        })
        .unwrap_or_default();

    let message = envelope
        .as_ref()
        .and_then(|e| match &e.error {
            Some(ErrorField::Detail(d)) => d.message.clone(),
            Some(ErrorField::Message(m)) => Some(m.clone()),
            None => e.message.clone(),
        })
        .unwrap_or_else(|| fallback_message(status, body));

    let blocked = codes.iter().any(|c| is_block_code(c));
    let code_kind = codes.iter().find_map(|c| kind_from_code(c));
    let kind = code_kind.unwrap_or_else(|| kind_from_status(status));
    let quota_code = codes.iter().find(|c| kind_from_code(c) == Some(ErrorKind::QuotaExceeded));

    tracing::warn!(
        provider = %ctx.provider,
        model = %ctx.model,
        status = %status,
        kind = ?kind,
        "provider returned error"
    );

    build(
        kind,
        Parts {
            message,
            status: Some(status.as_u16()),
            blocked,
            quota_type: quota_code.map(|c| (*c).to_owned()),
            headers: Some(headers),
            source: None,
        },
        ctx,
    )
}

/// Classify an error reported by name, as the AWS SDK does
///
/// `code` is the exception name (e.g. `ThrottlingException`).
pub fn from_code(code: Option<&str>, message: String, source: Option<Source>, ctx: &ClassifyContext) -> BridgeError {
    let kind = code.and_then(kind_from_code).unwrap_or(ErrorKind::Generic);
    let blocked = code.is_some_and(is_block_code);

    tracing::warn!(
        provider = %ctx.provider,
        model = %ctx.model,
        code = code.unwrap_or("unknown"),
        kind = ?kind,
        "provider returned error"
    );

    build(
        kind,
        Parts {
            message,
            status: None,
            blocked,
            quota_type: code.filter(|_| kind == ErrorKind::QuotaExceeded).map(str::to_owned),
            headers: None,
            source,
        },
        ctx,
    )
}

/// Inputs shared by every constructed variant
struct Parts<'a> {
    message: String,
    status: Option<u16>,
    blocked: bool,
    quota_type: Option<String>,
    headers: Option<&'a HeaderMap>,
    source: Option<Source>,
}

fn build(kind: ErrorKind, parts: Parts<'_>, ctx: &ClassifyContext) -> BridgeError {
    let Parts {
        message,
        status,
        blocked,
        quota_type,
        headers,
        source,
    } = parts;

    match kind {
        ErrorKind::Configuration => BridgeError::Configuration {
            violations: vec![message.clone()],
            message,
            source,
        },
        ErrorKind::Authentication => BridgeError::Authentication {
            message,
            status,
            source,
        },
        ErrorKind::RateLimit => {
            let limits = headers.map(RateLimitHeaders::parse).unwrap_or_default();
            BridgeError::RateLimit {
                message,
                retry_after: limits.retry_after,
                limit: limits.limit,
                remaining: limits.remaining,
                reset: limits.reset,
                status,
                source,
            }
        }
        ErrorKind::QuotaExceeded => BridgeError::QuotaExceeded {
            message,
            quota_type,
            used: None,
            total: None,
            status,
            source,
        },
        ErrorKind::InvalidRequest => BridgeError::InvalidRequest {
            message,
            blocked,
            status,
            source,
        },
        ErrorKind::InsufficientCredits => BridgeError::InsufficientCredits {
            message,
            status,
            source,
        },
        ErrorKind::ServiceUnavailable => BridgeError::ServiceUnavailable {
            message,
            status,
            source,
        },
        ErrorKind::Network => BridgeError::Network { message, source },
        ErrorKind::ModelNotSupported => BridgeError::ModelNotSupported {
            message,
            model: ctx.model.clone(),
            supported: ctx.supported_models.clone(),
            status,
            source,
        },
        ErrorKind::ResponseParsing => BridgeError::ResponseParsing { message, source },
        ErrorKind::Timeout => BridgeError::Timeout {
            message,
            timeout: ctx.timeout,
            source,
        },
        ErrorKind::Generic => BridgeError::Generic {
            message,
            status,
            source,
        },
    }
}

/// Map a provider error code, error type or exception name to a kind
fn kind_from_code(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "invalid_api_key" | "invalid_authentication" | "authentication_error" | "permission_error"
        | "UNAUTHENTICATED" | "PERMISSION_DENIED" | "AccessDeniedException" | "UnrecognizedClientException" => {
            ErrorKind::Authentication
        }
        "rate_limit_exceeded" | "rate_limit_error" | "RESOURCE_EXHAUSTED" | "ThrottlingException" => {
            ErrorKind::RateLimit
        }
        "insufficient_quota" | "ServiceQuotaExceededException" => ErrorKind::QuotaExceeded,
        "billing_error" | "billing_hard_limit_reached" | "insufficient_credits" => ErrorKind::InsufficientCredits,
        "model_not_found" | "not_found_error" | "NOT_FOUND" | "ResourceNotFoundException"
        | "ModelNotReadyException" => ErrorKind::ModelNotSupported,
        "context_length_exceeded" | "request_too_large" | "content_filter" | "content_policy_violation"
        | "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "ValidationException" => ErrorKind::InvalidRequest,
        "overloaded_error" | "api_error" | "server_error" | "UNAVAILABLE" | "INTERNAL"
        | "ServiceUnavailableException" | "InternalServerException" | "ModelErrorException"
        | "ModelStreamErrorException" => ErrorKind::ServiceUnavailable,
        "DEADLINE_EXCEEDED" | "ModelTimeoutException" => ErrorKind::Timeout,
        _ => return None,
    };
    Some(kind)
}

fn is_block_code(code: &str) -> bool {
    matches!(code, "content_filter" | "content_policy_violation")
}

fn kind_from_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 413 | 422 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::Authentication,
        402 => ErrorKind::InsufficientCredits,
        404 => ErrorKind::ModelNotSupported,
        408 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimit,
        500 | 502 | 503 | 504 | 529 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Generic,
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("provider returned {status}");
    }
    let excerpt: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    format!("provider returned {status}: {excerpt}")
}

/// Rate limit details advertised in response headers
#[derive(Debug, Default)]
struct RateLimitHeaders {
    retry_after: Option<Duration>,
    limit: Option<u64>,
    remaining: Option<u64>,
    reset: Option<String>,
}

impl RateLimitHeaders {
    fn parse(headers: &HeaderMap) -> Self {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
                .map(str::trim)
        };

        let retry_after = get(&["retry-after"])
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        Self {
            retry_after,
            limit: get(&["x-ratelimit-limit-requests", "anthropic-ratelimit-requests-limit"])
                .and_then(|v| v.parse().ok()),
            remaining: get(&["x-ratelimit-remaining-requests", "anthropic-ratelimit-requests-remaining"])
                .and_then(|v| v.parse().ok()),
            reset: get(&["x-ratelimit-reset-requests", "anthropic-ratelimit-requests-reset"]).map(str::to_owned),
        }
    }
}

/// Display an error followed by its sources
fn chain_message(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }
    message
}

fn is_dns_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["dns error", "failed to lookup address", "no record found", "name or service not known", "nodename nor servname"]
        .iter()
        .any(|needle| lower.contains(needle))
}
