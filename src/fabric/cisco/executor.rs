//! Cisco Command Executor
//!
//! Renders zone operations as NX-OS configuration scripts and applies them
//! one script per operation, in phase order.

use crate::config::FabricEndpoint;
use crate::domain::model::{
    execution_order, ActiveZoneConfiguration, PortIdentifier, ZoneOperation, ZoningMode,
    ZoningSession,
};
use crate::domain::ports::FabricCommandExecutor;
use crate::error::{Error, Result};
use crate::fabric::cisco::CiscoConnector;
use async_trait::async_trait;
use tracing::{error, info};

/// Persist the running configuration across switch reloads
pub const SAVE_CONFIG_COMMAND: &str = "copy running-config startup-config";

/// Builds NX-OS configuration scripts for one VSAN
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    zoneset: &'a str,
    vsan: u16,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(zoneset: &'a str, vsan: u16) -> Self {
        Self { zoneset, vsan }
    }

    /// Script applying a single operation, wrapped in `conf`/`end`
    pub fn operation(&self, op: &ZoneOperation) -> Vec<String> {
        let mut script = vec!["conf".to_string()];
        match op {
            ZoneOperation::Create { name, members } => {
                script.push(self.zone_header(name));
                script.extend(members.iter().map(|m| member_line(m, false)));
                script.push("exit".to_string());
                script.push(self.zoneset_header());
                script.push(format!("member {}", name));
                script.push("exit".to_string());
            }
            ZoneOperation::UpdateAddMembers { name, members } => {
                script.push(self.zone_header(name));
                script.extend(members.iter().map(|m| member_line(m, false)));
                script.push("exit".to_string());
            }
            ZoneOperation::UpdateRemoveMembers { name, members } => {
                script.push(self.zone_header(name));
                script.extend(members.iter().map(|m| member_line(m, true)));
                script.push("exit".to_string());
            }
            ZoneOperation::Delete { name } => {
                script.push(self.zoneset_header());
                script.push(format!("no member {}", name));
                script.push("exit".to_string());
                script.push(format!("no zone name {} vsan {}", name, self.vsan));
            }
        }
        script.push("end".to_string());
        script
    }

    /// Script activating the zone set; enhanced mode also commits the session
    pub fn activation(&self, mode: ZoningMode) -> Vec<String> {
        let mut script = vec![
            "conf".to_string(),
            format!("zoneset activate name {} vsan {}", self.zoneset, self.vsan),
        ];
        if mode == ZoningMode::Enhanced {
            script.push(format!("zone commit vsan {}", self.vsan));
        }
        script.push("end".to_string());
        script
    }

    fn zone_header(&self, name: &str) -> String {
        format!("zone name {} vsan {}", name, self.vsan)
    }

    fn zoneset_header(&self) -> String {
        format!("zoneset name {} vsan {}", self.zoneset, self.vsan)
    }
}

fn member_line(wwn: &PortIdentifier, remove: bool) -> String {
    if remove {
        format!("no member pwwn {}", wwn)
    } else {
        format!("member pwwn {}", wwn)
    }
}

#[async_trait]
impl FabricCommandExecutor for CiscoConnector {
    async fn apply(
        &self,
        endpoint: &FabricEndpoint,
        operations: &[ZoneOperation],
        activate: bool,
        current: &ActiveZoneConfiguration,
        session: &ZoningSession,
    ) -> Result<usize> {
        if !session.is_idle() {
            return Err(Error::ConcurrentSession {
                fabric: endpoint.name.clone(),
                session: session.session.clone(),
            });
        }
        if operations.is_empty() {
            return Ok(0);
        }

        let zoneset = current
            .name
            .as_deref()
            .unwrap_or(endpoint.default_zoneset.as_str());
        let builder = CommandBuilder::new(zoneset, endpoint.vsan);

        let mut applied = 0;
        for op in execution_order(operations) {
            info!(fabric = %endpoint.name, zone = %op.zone_name(), "Applying {}", op);
            if let Err(e) = self.pool().execute_script(endpoint, &builder.operation(op)).await {
                error!(
                    fabric = %endpoint.name,
                    zone = %op.zone_name(),
                    applied,
                    remaining = operations.len() - applied,
                    error = %e,
                    "Zone operation failed, stopping"
                );
                return Err(e);
            }
            applied += 1;
        }

        if activate {
            self.pool()
                .execute_script(endpoint, &builder.activation(session.mode))
                .await?;
            info!(fabric = %endpoint.name, zoneset, "Activated zone set");
        }

        self.pool().execute(endpoint, SAVE_CONFIG_COMMAND).await?;
        Ok(applied)
    }
}
