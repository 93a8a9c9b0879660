//! Session Pool
//!
//! A bounded pool of authenticated switch sessions keyed by
//! (host, port, user). Each checkout reuses a live idle session or opens a
//! new one; transient transport failures are retried with randomized
//! exponential backoff so concurrent callers don't hammer the switch's
//! command processor in lockstep.

use crate::config::{FabricEndpoint, SessionPoolConfig};
use crate::domain::ports::{CliSession, SessionConnectorRef, SessionKey};
use crate::error::{Error, Result};
use backoff::ExponentialBackoffBuilder;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// What to run on a checked-out session
#[derive(Debug, Clone, Copy)]
enum Work<'a> {
    Exec(&'a str),
    Script(&'a [String]),
}

impl Work<'_> {
    fn describe(&self) -> String {
        match self {
            Work::Exec(command) => command.to_string(),
            Work::Script(lines) => lines.join("; "),
        }
    }
}

/// Pool of CLI sessions shared by every fabric's connector
pub struct SessionPool {
    connector: SessionConnectorRef,
    config: SessionPoolConfig,
    idle: Mutex<HashMap<SessionKey, Vec<Box<dyn CliSession>>>>,
    limits: DashMap<SessionKey, Arc<Semaphore>>,
}

impl SessionPool {
    pub fn new(connector: SessionConnectorRef, config: SessionPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            connector,
            config,
            idle: Mutex::new(HashMap::new()),
            limits: DashMap::new(),
        })
    }

    /// Run one command and return its raw text output
    pub async fn execute(&self, endpoint: &FabricEndpoint, command: &str) -> Result<String> {
        self.run(endpoint, Work::Exec(command)).await
    }

    /// Run a configuration script through an interactive shell
    pub async fn execute_script(
        &self,
        endpoint: &FabricEndpoint,
        commands: &[String],
    ) -> Result<String> {
        self.run(endpoint, Work::Script(commands)).await
    }

    /// Close and evict every idle session for an endpoint
    pub async fn remove(&self, key: &SessionKey) {
        let sessions = self.idle.lock().remove(key).unwrap_or_default();
        debug!(endpoint = %key, count = sessions.len(), "Evicting idle sessions");
        for mut session in sessions {
            session.close().await;
        }
    }

    /// Number of idle sessions held for an endpoint
    pub fn idle_count(&self, key: &SessionKey) -> usize {
        self.idle.lock().get(key).map(Vec::len).unwrap_or(0)
    }

    async fn run(&self, endpoint: &FabricEndpoint, work: Work<'_>) -> Result<String> {
        let max_attempts = self.config.retry_attempts.max(1);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.retry_initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.config.retry_max_interval_ms))
            .with_randomization_factor(0.5)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let operation = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            self.run_once(endpoint, work).await.map_err(|e| {
                if e.is_retryable() && attempt < max_attempts {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        };

        backoff::future::retry_notify(policy, operation, |err: Error, wait: Duration| {
            warn!(
                fabric = %endpoint.name,
                error = %err,
                retry_in_ms = wait.as_millis() as u64,
                "Transient fabric session failure, retrying"
            );
        })
        .await
    }

    async fn run_once(&self, endpoint: &FabricEndpoint, work: Work<'_>) -> Result<String> {
        let key = SessionKey::for_endpoint(endpoint);
        let limit = self
            .limits
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_sessions_per_endpoint.max(1))))
            .clone();
        let _permit = limit.acquire_owned().await.map_err(|_| Error::Connectivity {
            host: key.to_string(),
            reason: "session pool closed".into(),
        })?;

        let timeout = self.config.command_timeout();
        let mut session = match self.checkout(&key) {
            Some(session) => session,
            None => {
                debug!(endpoint = %key, "Opening new fabric session");
                tokio::time::timeout(timeout, self.connector.connect(endpoint))
                    .await
                    .map_err(|_| Error::Connectivity {
                        host: key.to_string(),
                        reason: format!("connect timed out after {:?}", timeout),
                    })??
            }
        };

        let outcome = tokio::time::timeout(timeout, dispatch(session.as_mut(), work)).await;
        match outcome {
            Err(_) => {
                // Effect on the switch is unknown; never reuse this session
                session.close().await;
                Err(Error::Timeout {
                    command: work.describe(),
                    after: timeout,
                })
            }
            Ok(Err(e)) if e.is_transient() => {
                session.close().await;
                Err(e)
            }
            Ok(result) => {
                self.checkin(key, session);
                result
            }
        }
    }

    fn checkout(&self, key: &SessionKey) -> Option<Box<dyn CliSession>> {
        let mut idle = self.idle.lock();
        let sessions = idle.get_mut(key)?;
        while let Some(session) = sessions.pop() {
            if session.is_alive() {
                return Some(session);
            }
        }
        None
    }

    fn checkin(&self, key: SessionKey, session: Box<dyn CliSession>) {
        if !session.is_alive() {
            return;
        }
        let mut idle = self.idle.lock();
        let sessions = idle.entry(key).or_default();
        if sessions.len() < self.config.max_sessions_per_endpoint {
            sessions.push(session);
        }
    }
}

async fn dispatch(session: &mut dyn CliSession, work: Work<'_>) -> Result<String> {
    match work {
        Work::Exec(command) => session.exec(command).await,
        Work::Script(lines) => session.run_script(lines).await,
    }
}
