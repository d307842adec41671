//! Request extractors for the two authorization tiers.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use log::debug;
use sha2::{Digest, Sha256};

use super::{AuthError, Identity, IdentityVerifier};
use crate::api::ApiError;

/// Header accepted as an alternative carrier for the service token.
const API_TOKEN_HEADER: &str = "x-api-token";

/// Extract a Bearer token from an Authorization header value.
pub fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let invalid = || AuthError::Unauthenticated("invalid authorization header".to_string());
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or_else(invalid)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(invalid());
    }

    let token = parts.next().ok_or_else(invalid)?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(token)
}

fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AuthError::Unauthenticated("missing bearer token".to_string()))?;
    bearer_token_from_header(header)
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    verifier: Arc<IdentityVerifier>,
    service_token_digest: Option<[u8; 32]>,
}

impl AuthState {
    pub fn new(verifier: IdentityVerifier, service_token: Option<&str>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            service_token_digest: service_token.map(digest),
        }
    }

    pub fn verifier(&self) -> &IdentityVerifier {
        &self.verifier
    }

    /// Check a presented token against the configured service token.
    pub fn is_service_token(&self, token: &str) -> bool {
        match self.service_token_digest {
            Some(expected) => digest(token) == expected,
            None => false,
        }
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// A caller authenticated with an identity-provider token.
///
/// Handlers taking this extractor act only on `identity.subject`.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl CurrentIdentity {
    pub fn subject(&self) -> &str {
        &self.0.subject
    }
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let token = bearer_from_headers(&parts.headers)?;
        let identity = auth.verifier().verify(token).await?;
        Ok(CurrentIdentity(identity))
    }
}

/// A caller holding the service token; may act on any subject.
#[derive(Debug, Clone, Copy)]
pub struct ServiceCaller;

impl<S> FromRequestParts<S> for ServiceCaller
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);

        let token = match parts
            .headers
            .get(API_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            Some(token) => token,
            None => bearer_from_headers(&parts.headers)?,
        };

        if !auth.is_service_token(token) {
            debug!("Rejected service call with invalid token");
            return Err(AuthError::Unauthenticated("invalid service token".to_string()).into());
        }

        Ok(ServiceCaller)
    }
}
