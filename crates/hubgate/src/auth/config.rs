//! Authentication configuration.

use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// Identity-provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Provider domain (e.g. "tenant.eu.auth0.com"). Used to derive the
    /// issuer and the JWKS URL when they are not set explicitly.
    pub domain: Option<String>,

    /// Expected audience. Audience validation is skipped when unset.
    pub audience: Option<String>,

    /// Expected issuer. Defaults to `https://{domain}/`.
    pub issuer: Option<String>,

    /// JWKS endpoint. Defaults to `https://{domain}/.well-known/jwks.json`.
    pub jwks_url: Option<String>,

    /// Local JWKS file used instead of fetching keys over the network.
    pub jwks_file: Option<String>,

    /// Accepted signing algorithms.
    pub algorithms: Vec<String>,

    /// Clock skew tolerance for `exp`, in seconds.
    pub leeway_secs: u64,

    /// Timeout for key set fetches, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: None,
            audience: None,
            issuer: None,
            jwks_url: None,
            jwks_file: None,
            algorithms: vec!["RS256".to_string()],
            leeway_secs: 30,
            fetch_timeout_secs: 10,
        }
    }
}

impl AuthConfig {
    /// Effective issuer, if any.
    pub fn effective_issuer(&self) -> Option<String> {
        self.issuer.clone().or_else(|| {
            self.domain
                .as_deref()
                .map(|domain| format!("https://{}/", domain.trim_end_matches('/')))
        })
    }

    /// Effective JWKS URL, if any.
    pub fn effective_jwks_url(&self) -> Option<String> {
        self.jwks_url.clone().or_else(|| {
            self.domain.as_deref().map(|domain| {
                format!(
                    "https://{}/.well-known/jwks.json",
                    domain.trim_end_matches('/')
                )
            })
        })
    }

    /// Parse the accepted algorithm list.
    pub fn parsed_algorithms(&self) -> Result<Vec<Algorithm>, ConfigValidationError> {
        if self.algorithms.is_empty() {
            return Err(ConfigValidationError::NoAlgorithms);
        }

        self.algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name)
                    .map_err(|_| ConfigValidationError::UnknownAlgorithm(name.clone()))
            })
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.jwks_file.is_none() && self.effective_jwks_url().is_none() {
            return Err(ConfigValidationError::MissingKeySource);
        }
        self.parsed_algorithms()?;
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Neither a domain, a JWKS URL nor a JWKS file was configured.
    MissingKeySource,
    /// The algorithm allow-list is empty.
    NoAlgorithms,
    /// An algorithm name was not recognised.
    UnknownAlgorithm(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKeySource => {
                write!(
                    f,
                    "No signing key source configured. Set AUTH_DOMAIN, auth.jwks_url or auth.jwks_file."
                )
            }
            Self::NoAlgorithms => write!(f, "auth.algorithms must list at least one algorithm."),
            Self::UnknownAlgorithm(name) => {
                write!(f, "Unknown signing algorithm '{}' in auth.algorithms.", name)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_urls_from_domain() {
        let config = AuthConfig {
            domain: Some("tenant.auth0.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_issuer().as_deref(),
            Some("https://tenant.auth0.com/")
        );
        assert_eq!(
            config.effective_jwks_url().as_deref(),
            Some("https://tenant.auth0.com/.well-known/jwks.json")
        );
    }

    #[test]
    fn test_explicit_urls_win() {
        let config = AuthConfig {
            domain: Some("tenant.auth0.com".to_string()),
            issuer: Some("https://issuer.example/".to_string()),
            jwks_url: Some("https://keys.example/jwks".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_issuer().as_deref(),
            Some("https://issuer.example/")
        );
        assert_eq!(
            config.effective_jwks_url().as_deref(),
            Some("https://keys.example/jwks")
        );
    }

    #[test]
    fn test_validate_requires_key_source() {
        let config = AuthConfig::default();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::MissingKeySource)
        );

        let config = AuthConfig {
            jwks_file: Some("/etc/hubgate/jwks.json".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parsed_algorithms() {
        let config = AuthConfig {
            algorithms: vec!["RS256".to_string(), "HS256".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.parsed_algorithms().unwrap(),
            vec![Algorithm::RS256, Algorithm::HS256]
        );

        let config = AuthConfig {
            algorithms: vec!["nope".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.parsed_algorithms(),
            Err(ConfigValidationError::UnknownAlgorithm("nope".to_string()))
        );
    }
}
