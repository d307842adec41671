//! Authentication errors.

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed or unverifiable credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Token expired.
    #[error("token expired")]
    Expired,

    /// No verification key for the token's key id, even after a refresh.
    #[error("no signing key found for key id '{0}'")]
    KeyNotFound(String),

    /// Signature was valid but audience, issuer or subject claims were not.
    #[error("invalid claims: {0}")]
    ClaimsInvalid(String),

    /// The key set could not be fetched or parsed.
    #[error("signing key set unavailable: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    /// Short machine-readable kind used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::Expired => "token_expired",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::ClaimsInvalid(_) => "claims_invalid",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
        }
    }
}
