//! Authentication module.
//!
//! Provides identity verification for bearer credentials issued by an OIDC
//! provider, plus the two authorization tiers used by the HTTP surface:
//! - subject-scoped calls (`CurrentIdentity`), derived from a verified token
//! - service-scoped calls (`ServiceCaller`), authenticated with the fixed
//!   service token shared with the hub

mod claims;
mod config;
mod error;
mod jwks;
mod middleware;
mod verifier;

pub use claims::{Claims, Identity, sanitize_subject};
pub use config::{AuthConfig, ConfigValidationError};
pub use error::AuthError;
pub use jwks::{HttpKeySet, KeyCache, KeySetSource, StaticKeySet};
pub use middleware::{AuthState, CurrentIdentity, ServiceCaller, bearer_token_from_header};
pub use verifier::IdentityVerifier;
