//! SSH Session Connector
//!
//! Password-authenticated SSH sessions to fabric switches using russh.
//! Show commands run on their own exec channel; configuration scripts run
//! through an interactive shell with a pty, the way an operator would type
//! them.

use crate::config::FabricEndpoint;
use crate::domain::ports::{CliSession, SessionConnector};
use crate::error::{Error, Result};
use crate::fabric::session::transcript::parse_transcript;
use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// stderr stream id for extended channel data
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

// =============================================================================
// Host Key Verification
// =============================================================================

struct HostKeyCheck {
    host: String,
    expected_fingerprint: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let Some(expected) = &self.expected_fingerprint else {
            return Ok(true);
        };
        let actual = server_public_key.fingerprint();
        let matches = expected.trim_start_matches("SHA256:") == actual;
        if !matches {
            warn!(host = %self.host, %actual, "Switch host key does not match pinned fingerprint");
        }
        Ok(matches)
    }
}

// =============================================================================
// SSH Connector
// =============================================================================

/// Opens russh sessions for the pool
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl SshConnector {
    /// Sessions idle longer than `inactivity_timeout` are dropped by russh
    pub fn new(inactivity_timeout: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(inactivity_timeout),
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(&self, endpoint: &FabricEndpoint) -> Result<Box<dyn CliSession>> {
        let host = format!("{}:{}", endpoint.address, endpoint.port);
        let handler = HostKeyCheck {
            host: host.clone(),
            expected_fingerprint: endpoint.host_key_fingerprint.clone(),
        };

        let mut handle = client::connect(
            self.config.clone(),
            (endpoint.address.as_str(), endpoint.port),
            handler,
        )
        .await
        .map_err(|e| connectivity(&host, e))?;

        let authenticated = handle
            .authenticate_password(endpoint.user.clone(), endpoint.password.clone())
            .await
            .map_err(|e| connectivity(&host, e))?;
        if !authenticated {
            return Err(Error::Connectivity {
                host,
                reason: format!("authentication rejected for user {}", endpoint.user),
            });
        }

        debug!(%host, "SSH session established");
        Ok(Box::new(SshSession { host, handle }))
    }
}

fn connectivity(host: &str, err: russh::Error) -> Error {
    Error::Connectivity {
        host: host.to_string(),
        reason: err.to_string(),
    }
}

// =============================================================================
// SSH Session
// =============================================================================

struct SshSession {
    host: String,
    handle: client::Handle<HostKeyCheck>,
}

#[async_trait]
impl CliSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<String> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| connectivity(&self.host, e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| connectivity(&self.host, e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        match exit_status {
            Some(status) if status != 0 => Err(Error::Command {
                command: command.to_string(),
                reason: format!("exit status {}: {}", status, stderr),
            }),
            _ if !stderr.is_empty() => Err(Error::Command {
                command: command.to_string(),
                reason: stderr,
            }),
            _ => Ok(String::from_utf8_lossy(&stdout).into_owned()),
        }
    }

    async fn run_script(&mut self, commands: &[String]) -> Result<String> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| connectivity(&self.host, e))?;
        channel
            .request_pty(false, "vt100", 511, 24, 0, 0, &[])
            .await
            .map_err(|e| connectivity(&self.host, e))?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| connectivity(&self.host, e))?;

        let mut script = String::new();
        for command in commands {
            script.push_str(command);
            script.push('\n');
        }
        script.push_str("exit\n");
        channel
            .data(script.as_bytes())
            .await
            .map_err(|e| connectivity(&self.host, e))?;

        let mut raw = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => raw.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => raw.extend_from_slice(data),
                ChannelMsg::Eof | ChannelMsg::Close => break,
                _ => {}
            }
        }

        let transcript = parse_transcript(&String::from_utf8_lossy(&raw));
        match transcript.error {
            Some((command, reason)) => Err(Error::Command { command, reason }),
            None => Ok(transcript.output),
        }
    }

    fn is_alive(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn close(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(host = %self.host, error = %e, "Error closing SSH session");
        }
    }
}
