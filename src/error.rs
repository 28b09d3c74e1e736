use thiserror::Error;

/// Failures surfaced by document, translation and quiz operations.
///
/// None of these are retried automatically; callers report them and let the user
/// trigger the action again.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("need at least {required} terms to generate a quiz (have {available})")]
    InsufficientTerms { available: usize, required: usize },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// HTTP status used when the error crosses the function endpoints.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RateLimited(_) => 429,
            Self::QuotaExceeded(_) => 402,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Validation(_) | Self::InsufficientTerms { .. } => 400,
            Self::UnsupportedFormat(_) => 415,
            Self::NotFound(_) => 404,
            Self::ServiceUnavailable(_) => 503,
            Self::Service { status, .. } if *status >= 400 => *status,
            Self::Service { .. } | Self::Io(_) => 500,
        }
    }

    /// Message without the variant prefix, as returned in `{ "error": ... }` bodies.
    pub fn public_message(&self) -> String {
        match self {
            Self::ServiceUnavailable(msg)
            | Self::RateLimited(msg)
            | Self::QuotaExceeded(msg)
            | Self::UnsupportedFormat(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::Service { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Maps a non-success status from a remote endpoint onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            402 => Self::QuotaExceeded(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            500..=599 => Self::ServiceUnavailable(message),
            _ => Self::Service { status, message },
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_distinguishes_rate_limit_and_quota() {
        assert!(matches!(
            PortalError::from_status(429, "slow down"),
            PortalError::RateLimited(_)
        ));
        assert!(matches!(
            PortalError::from_status(402, "pay"),
            PortalError::QuotaExceeded(_)
        ));
        assert!(matches!(
            PortalError::from_status(502, "bad gateway"),
            PortalError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            PortalError::from_status(400, "bad"),
            PortalError::Service { status: 400, .. }
        ));
    }

    #[test]
    fn http_status_round_trips_remote_sub_kinds() {
        assert_eq!(PortalError::RateLimited("x".into()).http_status(), 429);
        assert_eq!(PortalError::QuotaExceeded("x".into()).http_status(), 402);
        assert_eq!(
            PortalError::InsufficientTerms {
                available: 3,
                required: 4
            }
            .http_status(),
            400
        );
        assert_eq!(PortalError::Forbidden("no".into()).public_message(), "no");
    }
}
