//! In-memory hub used by orchestrator tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::hub::*;

/// How a started server evolves as it is polled.
#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    /// Polls until the server reports ready.
    pub ready_after_polls: u32,
    /// Polls until the server reports a non-zero exit.
    pub fail_after_polls: Option<u32>,
    /// Polls until the server record disappears.
    pub vanish_after_polls: Option<u32>,
    /// Delay inside the start call.
    pub start_delay: Duration,
    /// Polls an accepted stop stays pending before the server is gone.
    pub stop_pending_polls: u32,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            ready_after_polls: 2,
            fail_after_polls: None,
            vanish_after_polls: None,
            start_delay: Duration::ZERO,
            stop_pending_polls: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeServer {
    ready: bool,
    polls: u32,
    exit_code: Option<i32>,
    /// Remaining polls of a pending stop.
    stopping: Option<u32>,
    options: StartOptions,
}

#[derive(Default)]
struct State {
    users: HashMap<String, Option<FakeServer>>,
}

#[derive(Default)]
pub struct FakeHub {
    behavior: Behavior,
    state: Mutex<State>,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl FakeHub {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }

    /// Register a user whose default server is already running.
    pub fn with_ready_server(self, name: &str) -> Self {
        self.state.lock().unwrap().users.insert(
            name.to_string(),
            Some(FakeServer {
                ready: true,
                polls: 0,
                exit_code: None,
                stopping: None,
                options: StartOptions::default(),
            }),
        );
        self
    }

    /// Register a user without a server.
    pub fn with_user(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(name.to_string(), None);
        self
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.state.lock().unwrap().users.contains_key(name)
    }

    pub fn last_start_options(&self, name: &str) -> Option<StartOptions> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(name)
            .and_then(|s| s.as_ref().map(|s| s.options.clone()))
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    fn record(name: &str, server: &FakeServer) -> ServerRecord {
        ServerRecord {
            name: String::new(),
            ready: server.ready,
            pending: match server.stopping {
                Some(_) => Some("stop".to_string()),
                None => (!server.ready && server.exit_code.is_none()).then(|| "spawn".to_string()),
            },
            url: Some(format!("/user/{name}/")),
            started: Some("2024-01-01T00:00:00Z".to_string()),
            exit_code: server.exit_code,
            ..Default::default()
        }
    }
}

#[async_trait]
impl HubApi for FakeHub {
    async fn get_user(&self, name: &str) -> HubResult<Option<UserRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(slot) = state.users.get_mut(name) else {
            return Ok(None);
        };

        let mut vanished = false;
        if let Some(server) = slot.as_mut() {
            if let Some(remaining) = server.stopping {
                match remaining {
                    0 => vanished = true,
                    n => server.stopping = Some(n - 1),
                }
            } else if !server.ready && server.exit_code.is_none() {
                server.polls += 1;
                if self.behavior.vanish_after_polls == Some(server.polls) {
                    vanished = true;
                } else if self.behavior.fail_after_polls == Some(server.polls) {
                    server.exit_code = Some(1);
                } else if server.polls >= self.behavior.ready_after_polls {
                    server.ready = true;
                }
            }
        }
        if vanished {
            *slot = None;
        }

        let mut servers = HashMap::new();
        if let Some(server) = slot.as_ref() {
            servers.insert(DEFAULT_SERVER.to_string(), Self::record(name, server));
        }
        Ok(Some(UserRecord {
            name: name.to_string(),
            servers,
            ..Default::default()
        }))
    }

    async fn create_user(&self, name: &str) -> HubResult<CreateOutcome> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(name) {
            return Ok(CreateOutcome::Conflict);
        }
        state.users.insert(name.to_string(), None);
        Ok(CreateOutcome::Created)
    }

    async fn delete_user(&self, name: &str) -> HubResult<DeleteOutcome> {
        match self.state.lock().unwrap().users.remove(name) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list_users(&self) -> HubResult<Vec<UserRecord>> {
        let names: Vec<String> = self.state.lock().unwrap().users.keys().cloned().collect();
        let mut users = Vec::new();
        for name in names {
            if let Some(user) = self.get_user(&name).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn start_server(
        &self,
        name: &str,
        _server: &str,
        options: &StartOptions,
    ) -> HubResult<StartOutcome> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if !self.behavior.start_delay.is_zero() {
            tokio::time::sleep(self.behavior.start_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let Some(slot) = state.users.get_mut(name) else {
            return Err(HubError::Unexpected {
                status: 404,
                body: "no such user".to_string(),
            });
        };
        if slot.as_ref().is_some_and(|s| s.stopping.is_some()) {
            return Err(HubError::Unexpected {
                status: 400,
                body: format!("{name}'s server is pending stop"),
            });
        }
        if slot.as_ref().is_some_and(|s| s.exit_code.is_none()) {
            return Ok(StartOutcome::Conflict);
        }
        *slot = Some(FakeServer {
            ready: false,
            polls: 0,
            exit_code: None,
            stopping: None,
            options: options.clone(),
        });
        Ok(StartOutcome::Accepted)
    }

    async fn stop_server(&self, name: &str, _server: &str) -> HubResult<StopOutcome> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        match state.users.get_mut(name) {
            Some(slot) if slot.is_some() => {
                let polls = self.behavior.stop_pending_polls;
                if polls == 0 {
                    *slot = None;
                } else if let Some(server) = slot.as_mut() {
                    server.ready = false;
                    server.exit_code = None;
                    server.stopping = Some(polls);
                }
                Ok(StopOutcome::Accepted)
            }
            _ => Ok(StopOutcome::NotFound),
        }
    }
}
