//! Per-user notebook session broker.
//!
//! Verifies identity-provider tokens, provisions a workspace and hub account
//! for each subject, starts (or joins) the subject's notebook server and
//! hands back a URL routing into it.

pub mod api;
pub mod auth;
pub mod hub;
pub mod session;
pub mod workspace;
