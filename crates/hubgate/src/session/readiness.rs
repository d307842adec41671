//! Readiness wait loop for freshly started servers.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::{SessionError, SessionResult};
use crate::hub::{HubApi, ServerRecord};

/// Bounds for the readiness wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Poll the hub until `server` of `user` is ready, reports a failure, or the
/// timeout elapses.
///
/// Holds no locks; dropping the returned future abandons the wait.
pub async fn wait_until_ready(
    hub: &dyn HubApi,
    user: &str,
    server: &str,
    policy: WaitPolicy,
) -> SessionResult<ServerRecord> {
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_pending: Option<String> = None;

    loop {
        attempts += 1;

        let record = hub
            .get_user(user)
            .await?
            .and_then(|u| u.server_named(server));

        match record {
            Some(record) => {
                if let Some(failure) = record.failure() {
                    warn!(
                        "Server for {} failed after {} polls: {}",
                        user,
                        attempts,
                        failure.reason()
                    );
                    return Err(SessionError::SpawnFailed {
                        reason: failure.reason(),
                    });
                }
                if record.ready {
                    debug!("Server for {} ready after {} polls", user, attempts);
                    return Ok(record);
                }
                if record.is_pending() {
                    last_pending = record.pending.clone();
                }
            }
            None if last_pending.is_some() => {
                warn!("Server for {} disappeared while starting", user);
                return Err(SessionError::SpawnFailed {
                    reason: "server stopped while starting".to_string(),
                });
            }
            None => {}
        }

        let waited = start.elapsed();
        if waited >= policy.timeout {
            return Err(SessionError::Timeout {
                pending: last_pending,
                waited,
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Poll the hub until `server` of `user` is gone.
///
/// Used after the hub accepted a stop it has not finished yet; the hub
/// refuses a start while the stop is pending.
pub async fn wait_until_stopped(
    hub: &dyn HubApi,
    user: &str,
    server: &str,
    policy: WaitPolicy,
) -> SessionResult<()> {
    let start = Instant::now();

    loop {
        let Some(record) = hub
            .get_user(user)
            .await?
            .and_then(|u| u.server_named(server))
        else {
            return Ok(());
        };

        let waited = start.elapsed();
        if waited >= policy.timeout {
            warn!("Server for {} still present {}s after stop", user, waited.as_secs());
            return Err(SessionError::Timeout {
                pending: record.pending,
                waited,
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}
