//! Authentication error types.

use notype_core::error::NotypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid hashing parameters: {0}")]
    Parameters(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<AuthError> for NotypeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => NotypeError::InvalidCredentials,
            AuthError::Parameters(msg) | AuthError::Crypto(msg) => NotypeError::Crypto(msg),
            AuthError::Task(msg) => NotypeError::Internal(msg),
        }
    }
}
