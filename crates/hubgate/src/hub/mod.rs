//! Hub control-plane client module.
//!
//! Provides an async client for the hub's user and server REST API, plus the
//! `HubApi` seam the session orchestrator is written against.

mod client;
mod config;
mod error;
mod types;

use async_trait::async_trait;

pub use client::HubClient;
pub use config::{HubConfig, HubConfigError};
pub use error::{HubError, HubResult};
pub use types::*;

/// Name the hub uses for a user's default server.
pub const DEFAULT_SERVER: &str = "";

/// Hub operations used by the orchestrator.
#[async_trait]
pub trait HubApi: Send + Sync {
    async fn get_user(&self, name: &str) -> HubResult<Option<UserRecord>>;
    async fn create_user(&self, name: &str) -> HubResult<CreateOutcome>;
    async fn delete_user(&self, name: &str) -> HubResult<DeleteOutcome>;
    async fn list_users(&self) -> HubResult<Vec<UserRecord>>;
    async fn start_server(
        &self,
        name: &str,
        server: &str,
        options: &StartOptions,
    ) -> HubResult<StartOutcome>;
    async fn stop_server(&self, name: &str, server: &str) -> HubResult<StopOutcome>;
}

#[async_trait]
impl HubApi for HubClient {
    async fn get_user(&self, name: &str) -> HubResult<Option<UserRecord>> {
        self.get_user(name).await
    }

    async fn create_user(&self, name: &str) -> HubResult<CreateOutcome> {
        self.create_user(name).await
    }

    async fn delete_user(&self, name: &str) -> HubResult<DeleteOutcome> {
        self.delete_user(name).await
    }

    async fn list_users(&self) -> HubResult<Vec<UserRecord>> {
        self.list_users().await
    }

    async fn start_server(
        &self,
        name: &str,
        server: &str,
        options: &StartOptions,
    ) -> HubResult<StartOutcome> {
        self.start_server(name, server, options).await
    }

    async fn stop_server(&self, name: &str, server: &str) -> HubResult<StopOutcome> {
        self.stop_server(name, server).await
    }
}
