//! Error types for the notype system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotypeError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("Conflicting write on {entity}")]
    Conflict { entity: String },

    #[error("Incomplete identity provider profile: {reason}")]
    IncompleteProfile { reason: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type NotypeResult<T> = Result<T, NotypeError>;

impl NotypeError {
    /// HTTP status class the request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::InvalidCredentials | Self::NotAuthenticated => 401,
            Self::NotFound { .. } => 404,
            Self::DuplicateEmail | Self::Conflict { .. } => 409,
            Self::IncompleteProfile { .. } => 422,
            Self::UpstreamTimeout(_) => 504,
            Self::Persistence(_) | Self::Crypto(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether repeating the whole operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::UpstreamTimeout(_) | Self::Persistence(_)
        )
    }

    /// Message safe to show to the client.
    ///
    /// Server-side failures collapse to a generic text; the detail stays
    /// in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::UpstreamTimeout(_) => "upstream service timed out".into(),
            Self::Persistence(_) | Self::Crypto(_) | Self::Internal(_) => {
                "internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_detail_is_not_public() {
        let err = NotypeError::Persistence("connection refused on 10.0.0.7:8000".into());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.is_retryable());
    }

    #[test]
    fn credential_failures_share_one_message() {
        let err = NotypeError::InvalidCredentials;
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.public_message(), "invalid credentials");
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflicts_are_client_errors_but_retryable() {
        let err = NotypeError::Conflict {
            entity: "account".into(),
        };
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retryable());
        assert_eq!(NotypeError::DuplicateEmail.status_code(), 409);
        assert!(!NotypeError::DuplicateEmail.is_retryable());
    }
}
