//! JWT claims and the verified identity derived from them.

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Claims read from an identity-provider access token.
///
/// Only the fields used for subject extraction are modelled; `exp`, `aud`
/// and `iss` are checked by the validator against the raw payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (provider user ID, e.g. `auth0|abc123`).
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiration time (as Unix timestamp).
    #[serde(default)]
    pub exp: Option<i64>,

    /// User's email.
    #[serde(default)]
    pub email: Option<String>,

    /// User's name.
    #[serde(default)]
    pub name: Option<String>,

    /// User's preferred username.
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Provider nickname.
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Claims {
    /// Raw subject claim in priority order: email, preferred username,
    /// nickname, then `sub`.
    pub fn raw_subject(&self) -> Option<&str> {
        [
            self.email.as_deref(),
            self.preferred_username.as_deref(),
            self.nickname.as_deref(),
            self.sub.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Filesystem-safe subject, used as hub username and directory name.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Build an identity from verified claims.
    pub fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let raw = claims
            .raw_subject()
            .ok_or_else(|| AuthError::ClaimsInvalid("no usable subject in token".to_string()))?;
        let subject = sanitize_subject(raw)?;

        Ok(Self {
            subject,
            display_name: claims.name.or(claims.preferred_username),
            email: claims.email,
        })
    }
}

/// Derive a filesystem-safe subject from a raw claim.
///
/// Email-shaped values are reduced to their local part. The result is
/// lowercased and every character outside `[a-z0-9._-]` becomes `_`.
pub fn sanitize_subject(raw: &str) -> Result<String, AuthError> {
    let raw = raw.trim();
    let local = match raw.split_once('@') {
        Some((local, _domain)) => local,
        None => raw,
    };

    let subject: String = local
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if subject.is_empty() || subject.chars().all(|c| c == '.') {
        return Err(AuthError::ClaimsInvalid(format!(
            "subject '{raw}' is not usable as a username"
        )));
    }

    Ok(subject)
}
