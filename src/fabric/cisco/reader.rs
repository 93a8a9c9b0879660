//! Cisco Fabric State Reader
//!
//! Parses NX-OS `show` output into structured fabric state. The CLI is not a
//! stable machine format, so every parse checks for the structure it relies
//! on and reports `MalformedOutput` instead of guessing.

use crate::config::FabricEndpoint;
use crate::domain::model::{
    ActiveZoneConfiguration, NameServerEntry, PortIdentifier, PortType, ZoningMode, ZoningSession,
};
use crate::domain::ports::FabricStateReader;
use crate::error::{Error, Result};
use crate::fabric::cisco::CiscoConnector;
use async_trait::async_trait;
use tracing::debug;

// =============================================================================
// Commands
// =============================================================================

pub fn nameserver_command(vsan: u16) -> String {
    format!("show fcns database vsan {} | no-more", vsan)
}

pub fn active_zoneset_command(vsan: u16) -> String {
    format!("show zoneset active vsan {} | no-more", vsan)
}

pub fn zone_status_command(vsan: u16) -> String {
    format!("show zone status vsan {} | no-more", vsan)
}

fn malformed(command: &str, reason: impl Into<String>) -> Error {
    Error::MalformedOutput {
        command: command.to_string(),
        reason: reason.into(),
    }
}

// =============================================================================
// Name Server
// =============================================================================

/// Parse `show fcns database` output.
///
/// ```text
/// FCID        TYPE  PWWN                    (VENDOR)        FC4-TYPE:FEATURE
/// --------------------------------------------------------------------------
/// 0x030d00    N     50:06:0b:00:00:c2:66:04 (HP)            SCSI-FCP:Init
/// ```
pub fn parse_nameserver(command: &str, output: &str) -> Result<Vec<NameServerEntry>> {
    let mut header_seen = false;
    let mut entries = Vec::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if ["FCID", "TYPE", "PWWN"].iter().all(|col| tokens.contains(col)) {
            header_seen = true;
            continue;
        }
        if !header_seen || !tokens.first().is_some_and(|t| t.starts_with("0x")) {
            continue;
        }
        if tokens.len() < 3 {
            return Err(malformed(command, format!("short name server row: {}", line.trim())));
        }

        let wwn = PortIdentifier::parse(tokens[2])
            .map_err(|e| malformed(command, e.to_string()))?;
        let vendor = tokens
            .get(3)
            .filter(|v| v.starts_with('(') && v.ends_with(')'))
            .map(|v| v.trim_matches(|c| c == '(' || c == ')').to_string());

        entries.push(NameServerEntry {
            fcid: tokens[0].to_string(),
            port_type: PortType::from_token(tokens[1]),
            wwn,
            vendor,
        });
    }

    if !header_seen {
        return Err(malformed(command, "name server header (FCID TYPE PWWN) not found"));
    }
    Ok(entries)
}

// =============================================================================
// Active Zone Set
// =============================================================================

/// Parse `show zoneset active` output.
///
/// ```text
/// zoneset name OpenStack_Cfg vsan 304
///   zone name openstack50060b0000c26604201900051ee8e329 vsan 304
///   * fcid 0x030d00 [pwwn 50:06:0b:00:00:c2:66:04]
///     pwwn 20:19:00:05:1e:e8:e3:29
/// ```
///
/// Empty output means no zone set is active. Members that are not pwwn
/// (fcid-only, interface, device-alias) are not tracked.
pub fn parse_active_zoneset(command: &str, output: &str) -> Result<ActiveZoneConfiguration> {
    let mut config = ActiveZoneConfiguration::empty();
    if output.trim().is_empty() {
        return Ok(config);
    }

    let mut zoneset_seen = false;
    let mut current_zone: Option<String> = None;

    for line in output.lines() {
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == '[' || c == ']')
            .filter(|t| !t.is_empty())
            .collect();

        if let Some(name) = named(&tokens, "zoneset") {
            let name = name.ok_or_else(|| malformed(command, "zoneset line without a name"))?;
            config.name = Some(name.to_string());
            zoneset_seen = true;
            continue;
        }

        if let Some(name) = named(&tokens, "zone") {
            let name = name.ok_or_else(|| malformed(command, "zone line without a name"))?;
            if !zoneset_seen {
                return Err(malformed(command, format!("zone {} outside a zoneset", name)));
            }
            config.zones.entry(name.to_string()).or_default();
            current_zone = Some(name.to_string());
            continue;
        }

        if let Some(idx) = tokens.iter().position(|t| *t == "pwwn") {
            let raw = tokens
                .get(idx + 1)
                .ok_or_else(|| malformed(command, "pwwn member without a WWN"))?;
            let zone = current_zone
                .as_ref()
                .ok_or_else(|| malformed(command, format!("member {} outside a zone", raw)))?;
            let wwn = PortIdentifier::parse(raw).map_err(|e| malformed(command, e.to_string()))?;
            if let Some(members) = config.zones.get_mut(zone) {
                members.insert(wwn);
            }
        }
    }

    if !zoneset_seen {
        return Err(malformed(command, "no zoneset header in active zone set output"));
    }
    Ok(config)
}

/// `Some(name)` for a `<keyword> name <name>` line, `Some(None)` when the
/// name is missing
fn named<'a>(tokens: &[&'a str], keyword: &str) -> Option<Option<&'a str>> {
    let idx = tokens.iter().position(|t| *t == keyword)?;
    (tokens.get(idx + 1) == Some(&"name")).then(|| tokens.get(idx + 2).copied())
}

// =============================================================================
// Zone Status
// =============================================================================

/// Parse `show zone status` output for the distribution mode and session
pub fn parse_zone_status(command: &str, output: &str) -> Result<ZoningSession> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    let value_after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|idx| tokens.get(idx + 1).copied())
    };

    let mode = match value_after("mode:") {
        Some("basic") => ZoningMode::Basic,
        Some("enhanced") => ZoningMode::Enhanced,
        Some(other) => return Err(malformed(command, format!("unknown zoning mode {}", other))),
        None => return Err(malformed(command, "zoning mode not reported")),
    };

    let session = match (value_after("session:"), mode) {
        (Some(session), _) => session.to_string(),
        (None, ZoningMode::Basic) => "none".to_string(),
        (None, ZoningMode::Enhanced) => {
            return Err(malformed(command, "enhanced mode without session status"))
        }
    };

    Ok(ZoningSession { mode, session })
}

// =============================================================================
// Reader
// =============================================================================

#[async_trait]
impl FabricStateReader for CiscoConnector {
    async fn get_nameserver_entries(
        &self,
        endpoint: &FabricEndpoint,
    ) -> Result<Vec<NameServerEntry>> {
        let command = nameserver_command(endpoint.vsan);
        let output = self.pool().execute(endpoint, &command).await?;
        let entries: Vec<_> = parse_nameserver(&command, &output)?
            .into_iter()
            .filter(NameServerEntry::is_node_port)
            .collect();
        debug!(fabric = %endpoint.name, vsan = endpoint.vsan, count = entries.len(), "Read name server");
        Ok(entries)
    }

    async fn get_active_zone_configuration(
        &self,
        endpoint: &FabricEndpoint,
    ) -> Result<ActiveZoneConfiguration> {
        let command = active_zoneset_command(endpoint.vsan);
        let output = self.pool().execute(endpoint, &command).await?;
        let config = parse_active_zoneset(&command, &output)?;
        debug!(
            fabric = %endpoint.name,
            zoneset = ?config.name,
            zones = config.zones.len(),
            "Read active zone set"
        );
        Ok(config)
    }

    async fn get_zoning_session_status(&self, endpoint: &FabricEndpoint) -> Result<ZoningSession> {
        let command = zone_status_command(endpoint.vsan);
        let output = self.pool().execute(endpoint, &command).await?;
        parse_zone_status(&command, &output)
    }
}
