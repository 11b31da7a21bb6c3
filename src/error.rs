//! Error taxonomy for the extraction and retrieval pipeline.
//!
//! Every fallible pipeline operation returns one of these variants so the
//! HTTP boundary can map failures to a status code without inspecting
//! message strings. Infrastructure setup (config load, pool construction,
//! server bind) uses `anyhow` instead — those paths never reach a client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Typed failure produced by the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or a supplied value is unusable.
    #[error("{0}")]
    InvalidArgument(String),

    /// A named conversation or user does not exist upstream.
    #[error("{0}")]
    NotFound(String),

    /// The caller lacks membership and joining did not help.
    #[error("{0}")]
    PermissionDenied(String),

    /// The upstream platform rejected the supplied token.
    #[error("{0}")]
    Unauthenticated(String),

    /// The upstream platform is throttling us.
    #[error("{0}")]
    RateLimited(String),

    /// Any other non-ok upstream response, wrapping the reported error.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The document store misbehaved (e.g. an insert returned no rows).
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::PermissionDenied(_) => "permission_denied",
            Error::Unauthenticated(_) => "unauthenticated",
            Error::RateLimited(_) => "rate_limited",
            Error::Upstream(_) => "upstream_error",
            Error::Storage(_) => "storage_error",
        }
    }

    /// HTTP status the boundary reports for this variant.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            Error::NotFound(_) => 404,
            Error::PermissionDenied(_) => 403,
            Error::Unauthenticated(_) => 401,
            Error::RateLimited(_) => 429,
            Error::Upstream(_) | Error::Storage(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::InvalidArgument("x".into()).status(), 400);
        assert_eq!(Error::NotFound("x".into()).status(), 404);
        assert_eq!(Error::PermissionDenied("x".into()).status(), 403);
        assert_eq!(Error::Unauthenticated("x".into()).status(), 401);
        assert_eq!(Error::RateLimited("x".into()).status(), 429);
        assert_eq!(Error::Upstream("x".into()).status(), 500);
        assert_eq!(Error::Storage("x".into()).status(), 500);
    }

    #[test]
    fn test_upstream_message_wraps_cause() {
        let err = Error::Upstream("channel_not_found".into());
        assert_eq!(err.to_string(), "upstream error: channel_not_found");
    }
}
