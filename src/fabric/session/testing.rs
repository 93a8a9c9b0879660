//! Scripted in-memory switch used by unit tests

use crate::config::FabricEndpoint;
use crate::domain::ports::{CliSession, SessionConnector};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct ScriptState {
    /// (command prefix, canned output); later entries win
    responses: Vec<(String, String)>,
    /// (substring, reason) making a script line fail
    rejections: Vec<(String, String)>,
    exec_log: Vec<String>,
    script_log: Vec<Vec<String>>,
    connect_failures: u32,
    exec_delay: Option<Duration>,
    connects: u32,
    closed: u32,
}

/// Connector whose sessions answer from canned responses
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, output: &str) {
        self.state
            .lock()
            .responses
            .push((prefix.to_string(), output.to_string()));
    }

    pub fn reject_line(&self, containing: &str, reason: &str) {
        self.state
            .lock()
            .rejections
            .push((containing.to_string(), reason.to_string()));
    }

    pub fn fail_connects(&self, count: u32) {
        self.state.lock().connect_failures = count;
    }

    pub fn delay_exec(&self, delay: Duration) {
        self.state.lock().exec_delay = Some(delay);
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }

    pub fn closed(&self) -> u32 {
        self.state.lock().closed
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().exec_log.clone()
    }

    pub fn scripts(&self) -> Vec<Vec<String>> {
        self.state.lock().script_log.clone()
    }

    /// Every configuration line sent, flattened in order
    pub fn script_lines(&self) -> Vec<String> {
        self.state.lock().script_log.concat()
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn connect(&self, endpoint: &FabricEndpoint) -> Result<Box<dyn CliSession>> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(Error::Connectivity {
                host: endpoint.address.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(ScriptedSession {
            state: self.state.clone(),
            alive: true,
        }))
    }
}

struct ScriptedSession {
    state: Arc<Mutex<ScriptState>>,
    alive: bool,
}

#[async_trait]
impl CliSession for ScriptedSession {
    async fn exec(&mut self, command: &str) -> Result<String> {
        let delay = self.state.lock().exec_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.exec_log.push(command.to_string());
        state
            .responses
            .iter()
            .rev()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| Error::Command {
                command: command.to_string(),
                reason: "% Invalid command".into(),
            })
    }

    async fn run_script(&mut self, commands: &[String]) -> Result<String> {
        let mut state = self.state.lock();
        state.script_log.push(commands.to_vec());
        for line in commands {
            if let Some((_, reason)) = state
                .rejections
                .iter()
                .find(|(needle, _)| line.contains(needle.as_str()))
            {
                return Err(Error::Command {
                    command: line.clone(),
                    reason: reason.clone(),
                });
            }
        }
        Ok(String::new())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self) {
        self.alive = false;
        self.state.lock().closed += 1;
    }
}
