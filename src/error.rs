use thiserror::Error;

/// Errors surfaced to Providers. The variant set is fixed; callers match on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("invalid request format")]
    InvalidRequestFormat,
    #[error("unauthorized")]
    Unauthorized,
    /// Usually an expired session.
    #[error("forbidden")]
    Forbidden,
    #[error("bad request")]
    BadRequest,
    #[error("not found")]
    NotFound,
    /// Duplicate action, e.g. the same bet placed twice.
    #[error("conflict")]
    Conflict,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("internal server error")]
    InternalServerError,
    #[error("no network connection")]
    NoNetworkConnection,
    #[error("decoding error: {0}")]
    DecodingError(String),
    #[error("not supported for provider")]
    NotSupportedForProvider,
    /// Message supplied by the server in an error body.
    #[error("{0}")]
    ErrorMessage(String),
    #[error("not subscribed")]
    NotSubscribed,
    #[error("unknown error")]
    Unknown,
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Map a non-success HTTP status to its domain error.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ServiceError::BadRequest,
            401 => ServiceError::Unauthorized,
            403 => ServiceError::Forbidden,
            404 => ServiceError::NotFound,
            409 => ServiceError::Conflict,
            429 => ServiceError::RateLimitExceeded,
            500..=599 => ServiceError::InternalServerError,
            _ => ServiceError::Unknown,
        }
    }

    /// 401 and 403 are recoverable once through a forced session refresh.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ServiceError::Unauthorized | ServiceError::Forbidden)
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::NoNetworkConnection
                | ServiceError::InternalServerError
                | ServiceError::RateLimitExceeded
        )
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::DecodingError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::from_status(400), ServiceError::BadRequest);
        assert_eq!(ServiceError::from_status(401), ServiceError::Unauthorized);
        assert_eq!(ServiceError::from_status(403), ServiceError::Forbidden);
        assert_eq!(ServiceError::from_status(404), ServiceError::NotFound);
        assert_eq!(ServiceError::from_status(409), ServiceError::Conflict);
        assert_eq!(ServiceError::from_status(429), ServiceError::RateLimitExceeded);
        assert_eq!(ServiceError::from_status(500), ServiceError::InternalServerError);
        assert_eq!(ServiceError::from_status(503), ServiceError::InternalServerError);
        assert_eq!(ServiceError::from_status(418), ServiceError::Unknown);
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(ServiceError::Unauthorized.is_auth_failure());
        assert!(ServiceError::Forbidden.is_auth_failure());
        assert!(!ServiceError::NotFound.is_auth_failure());
        assert!(!ServiceError::NoNetworkConnection.is_auth_failure());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ServiceError::NoNetworkConnection.is_transient());
        assert!(ServiceError::InternalServerError.is_transient());
        assert!(ServiceError::RateLimitExceeded.is_transient());
        assert!(!ServiceError::Conflict.is_transient());
        assert!(!ServiceError::Unauthorized.is_transient());
    }

    #[test]
    fn test_decoding_error_from_serde() {
        let err: ServiceError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert!(matches!(err, ServiceError::DecodingError(_)));
    }
}
