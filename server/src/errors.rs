//! Error types for upstream communication.
//!
//! Each variant carries enough context (service, endpoint, failure kind)
//! to diagnose a failure without reproducing the request.

use std::fmt;

/// Longest body excerpt carried inside an error.
pub const SNIPPET_MAX_CHARS: usize = 120;

#[derive(Debug)]
pub enum UpstreamError {
    /// Service has no URL/API key; a valid branch, not a server fault.
    NotConfigured { service: String },

    /// The per-call deadline expired before a response arrived.
    Timeout {
        service: String,
        endpoint: String,
        seconds: u64,
    },

    /// Upstream answered with a non-2xx status.
    Status {
        service: String,
        status: u16,
        snippet: String,
    },

    /// Upstream answered 2xx but the body was not JSON.
    NonJson {
        service: String,
        endpoint: String,
        snippet: String,
    },

    /// Download-client authentication failed.
    Login { reason: String },

    /// Connection-level failure or unparseable transport payload.
    Network { service: String, reason: String },
}

impl UpstreamError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, UpstreamError::NotConfigured { .. })
    }

    /// Short machine-readable failure kind used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::NotConfigured { .. } => "not_configured",
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Status { .. } => "status",
            UpstreamError::NonJson { .. } => "non_json",
            UpstreamError::Login { .. } => "login",
            UpstreamError::Network { .. } => "network",
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::NotConfigured { service } => {
                write!(f, "Service {} is not configured", service)
            }
            UpstreamError::Timeout {
                service,
                endpoint,
                seconds,
            } => {
                write!(
                    f,
                    "{}: request to {} timed out after {}s",
                    service, endpoint, seconds
                )
            }
            UpstreamError::Status {
                service,
                status,
                snippet,
            } => {
                write!(f, "{}: {} {}", service, status, snippet)
            }
            UpstreamError::NonJson {
                service,
                endpoint,
                snippet,
            } => {
                write!(
                    f,
                    "{}: non-JSON response from {}: {}",
                    service, endpoint, snippet
                )
            }
            UpstreamError::Login { reason } => {
                write!(f, "qBittorrent login failed: {}", reason)
            }
            UpstreamError::Network { service, reason } => {
                write!(f, "{}: request failed: {}", service, reason)
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Truncates a response body to the excerpt carried in errors.
pub fn truncate_snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(SNIPPET_MAX_CHARS).collect()
    }
}
