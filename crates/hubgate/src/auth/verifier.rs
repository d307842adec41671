//! Bearer credential verification.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use log::{debug, warn};

use super::{AuthError, Claims, Identity, KeyCache, KeySetSource};

/// Verifies provider-issued access tokens and extracts the caller identity.
pub struct IdentityVerifier {
    keys: KeyCache,
    issuer: Option<String>,
    audience: Option<String>,
    algorithms: Vec<Algorithm>,
    leeway_secs: u64,
}

impl IdentityVerifier {
    pub fn new(source: Arc<dyn KeySetSource>, algorithms: Vec<Algorithm>) -> Self {
        Self {
            keys: KeyCache::new(source),
            issuer: None,
            audience: None,
            algorithms,
            leeway_secs: 0,
        }
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// The underlying key cache.
    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    /// Verify a bearer token and derive the caller identity.
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::Unauthenticated(format!("malformed token: {e}")))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::Unauthenticated(format!(
                "signing algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::Unauthenticated("token header has no key id".to_string()))?;
        let key = self.keys.get(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        // Configured claims must be present, not merely match when present.
        let mut required = vec!["exp"];
        match self.audience {
            Some(ref audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        validation.set_required_spec_claims(&required);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            warn!("Token validation failed: {:?}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidSubject
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => AuthError::ClaimsInvalid(e.to_string()),
                _ => AuthError::Unauthenticated(e.to_string()),
            }
        })?;

        let identity = Identity::from_claims(data.claims)?;
        debug!("Verified token for subject {}", identity.subject);
        Ok(identity)
    }
}
