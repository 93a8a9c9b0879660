//! Domain Model - Fibre Channel zoning types
//!
//! Port identifiers, name-server entries, zone memberships, the active zone
//! configuration read from a fabric, and the zone operations computed by the
//! reconciliation engine.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Port Identifier (WWN)
// =============================================================================

/// A normalized 16-hex-digit World Wide Name.
///
/// Always stored lowercase and colon-delimited (`xx:xx:xx:xx:xx:xx:xx:xx`),
/// so equality ignores case and the presence of separators in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortIdentifier(String);

impl PortIdentifier {
    /// Parse a WWN with or without colon separators, in any letter case
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || Error::InvalidWwn {
            wwn: raw.to_string(),
        };

        let digits: String = if trimmed.contains(':') {
            let groups: Vec<&str> = trimmed.split(':').collect();
            if groups.len() != 8 || groups.iter().any(|g| g.len() != 2) {
                return Err(invalid());
            }
            groups.concat()
        } else {
            trimmed.to_string()
        };

        if digits.len() != 16 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let lower = digits.to_ascii_lowercase();
        let canonical = lower
            .as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self(canonical))
    }

    /// Canonical colon-delimited form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 16 hex digits without separators, used when building zone names
    pub fn compact(&self) -> String {
        self.0.replace(':', "")
    }
}

impl fmt::Display for PortIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PortIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PortIdentifier {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PortIdentifier> for String {
    fn from(wwn: PortIdentifier) -> Self {
        wwn.0
    }
}

// =============================================================================
// Zoning Policy
// =============================================================================

/// How initiators and targets are grouped into zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoningPolicy {
    /// One zone per (initiator, target) pair
    InitiatorTarget,
    /// One zone per initiator holding all of its targets
    Initiator,
}

impl FromStr for ZoningPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "initiator-target" => Ok(ZoningPolicy::InitiatorTarget),
            "initiator" => Ok(ZoningPolicy::Initiator),
            other => Err(Error::UnsupportedPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ZoningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoningPolicy::InitiatorTarget => write!(f, "initiator-target"),
            ZoningPolicy::Initiator => write!(f, "initiator"),
        }
    }
}

// =============================================================================
// Name Server
// =============================================================================

/// Port type reported by the fabric name server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// N_Port, a node directly logged into the fabric
    Node,
    /// NL_Port, a loop port
    Loop,
    Other(String),
}

impl PortType {
    pub fn from_token(token: &str) -> Self {
        match token {
            "N" => PortType::Node,
            "NL" => PortType::Loop,
            other => PortType::Other(other.to_string()),
        }
    }
}

/// A port observed as logged into a fabric segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameServerEntry {
    /// Fibre Channel ID assigned by the fabric (e.g. 0x030d00)
    pub fcid: String,
    pub port_type: PortType,
    pub wwn: PortIdentifier,
    /// Vendor tag if the switch reported one
    pub vendor: Option<String>,
}

impl NameServerEntry {
    /// Only node ports take part in zoning
    pub fn is_node_port(&self) -> bool {
        self.port_type == PortType::Node
    }
}

// =============================================================================
// Zone Membership
// =============================================================================

/// Members of one zone.
///
/// Members are unique. Equality ignores order, but insertion order is kept so
/// generated commands are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMembership {
    members: IndexSet<PortIdentifier>,
}

impl ZoneMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member, returning false if it was already present
    pub fn insert(&mut self, wwn: PortIdentifier) -> bool {
        self.members.insert(wwn)
    }

    pub fn remove(&mut self, wwn: &PortIdentifier) -> bool {
        self.members.shift_remove(wwn)
    }

    pub fn contains(&self, wwn: &PortIdentifier) -> bool {
        self.members.contains(wwn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortIdentifier> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<PortIdentifier> for ZoneMembership {
    fn from_iter<I: IntoIterator<Item = PortIdentifier>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Active Zone Configuration
// =============================================================================

/// Point-in-time snapshot of a fabric's active zone set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveZoneConfiguration {
    /// Name of the active zone set, None when nothing is active
    pub name: Option<String>,
    /// Zone name -> members, in the order the fabric reported them
    pub zones: IndexMap<String, ZoneMembership>,
    /// When the snapshot was read
    pub fetched_at: DateTime<Utc>,
}

impl Default for ActiveZoneConfiguration {
    fn default() -> Self {
        Self::empty()
    }
}

impl ActiveZoneConfiguration {
    /// A fabric without an active zone set
    pub fn empty() -> Self {
        Self {
            name: None,
            zones: IndexMap::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneMembership> {
        self.zones.get(name)
    }

    pub fn contains_zone(&self, name: &str) -> bool {
        self.zones.contains_key(name)
    }

    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Project a list of operations onto this snapshot.
    ///
    /// Used to predict post-apply state; the fabric stays the source of truth.
    pub fn with_operations(&self, operations: &[ZoneOperation]) -> Self {
        let mut next = self.clone();
        for op in operations {
            match op {
                ZoneOperation::Create { name, members } => {
                    next.zones
                        .insert(name.clone(), members.iter().cloned().collect());
                }
                ZoneOperation::UpdateAddMembers { name, members } => {
                    let zone = next.zones.entry(name.clone()).or_default();
                    for m in members {
                        zone.insert(m.clone());
                    }
                }
                ZoneOperation::UpdateRemoveMembers { name, members } => {
                    if let Some(zone) = next.zones.get_mut(name) {
                        for m in members {
                            zone.remove(m);
                        }
                    }
                }
                ZoneOperation::Delete { name } => {
                    next.zones.shift_remove(name);
                }
            }
        }
        next
    }
}

// =============================================================================
// Zoning Session
// =============================================================================

/// Zoning distribution mode of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoningMode {
    /// Edits apply immediately, no edit session
    Basic,
    /// Edits are staged in a session and need an explicit commit
    Enhanced,
}

/// Transient edit-session status of a fabric segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoningSession {
    pub mode: ZoningMode,
    /// Session owner token, `none` when no session is open
    pub session: String,
}

impl ZoningSession {
    pub fn idle(mode: ZoningMode) -> Self {
        Self {
            mode,
            session: "none".to_string(),
        }
    }

    /// True if nobody holds a pending edit session
    pub fn is_idle(&self) -> bool {
        self.mode == ZoningMode::Basic || self.session == "none"
    }
}

// =============================================================================
// Connectivity Request
// =============================================================================

/// Desired initiator -> targets connectivity for one attach/detach event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityRequest {
    pub targets: IndexMap<PortIdentifier, IndexSet<PortIdentifier>>,
    /// Host display name used for friendly zone names
    pub host_name: Option<String>,
    /// Storage system display name used for friendly zone names
    pub storage_system: Option<String>,
}

impl ConnectivityRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from raw WWN strings, normalizing all of them
    pub fn from_wwn_map(map: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut request = Self::new();
        for (initiator, targets) in map {
            let targets = targets
                .iter()
                .map(|t| PortIdentifier::parse(t))
                .collect::<Result<Vec<_>>>()?;
            request.connect(PortIdentifier::parse(initiator)?, targets);
        }
        Ok(request)
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_storage_system(mut self, storage_system: impl Into<String>) -> Self {
        self.storage_system = Some(storage_system.into());
        self
    }

    /// Add targets for an initiator; duplicates collapse
    pub fn connect(
        &mut self,
        initiator: PortIdentifier,
        targets: impl IntoIterator<Item = PortIdentifier>,
    ) {
        self.targets.entry(initiator).or_default().extend(targets);
    }

    pub fn initiators(&self) -> impl Iterator<Item = &PortIdentifier> {
        self.targets.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// =============================================================================
// Zone Operations
// =============================================================================

/// A single change computed by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ZoneOperation {
    Create {
        name: String,
        members: Vec<PortIdentifier>,
    },
    UpdateAddMembers {
        name: String,
        members: Vec<PortIdentifier>,
    },
    UpdateRemoveMembers {
        name: String,
        members: Vec<PortIdentifier>,
    },
    Delete {
        name: String,
    },
}

/// Execution phase; lower phases run first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperationPhase {
    Grow = 0,
    Shrink = 1,
    Remove = 2,
}

impl ZoneOperation {
    pub fn zone_name(&self) -> &str {
        match self {
            ZoneOperation::Create { name, .. }
            | ZoneOperation::UpdateAddMembers { name, .. }
            | ZoneOperation::UpdateRemoveMembers { name, .. }
            | ZoneOperation::Delete { name } => name,
        }
    }

    /// Creates and member-adds grow connectivity and must land before any
    /// removal, so a port is never left outside every zone mid-migration.
    pub fn phase(&self) -> OperationPhase {
        match self {
            ZoneOperation::Create { .. } | ZoneOperation::UpdateAddMembers { .. } => {
                OperationPhase::Grow
            }
            ZoneOperation::UpdateRemoveMembers { .. } => OperationPhase::Shrink,
            ZoneOperation::Delete { .. } => OperationPhase::Remove,
        }
    }
}

impl fmt::Display for ZoneOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneOperation::Create { name, members } => {
                write!(f, "create {} ({} members)", name, members.len())
            }
            ZoneOperation::UpdateAddMembers { name, members } => {
                write!(f, "add {} members to {}", members.len(), name)
            }
            ZoneOperation::UpdateRemoveMembers { name, members } => {
                write!(f, "remove {} members from {}", members.len(), name)
            }
            ZoneOperation::Delete { name } => write!(f, "delete {}", name),
        }
    }
}

/// Stable sort of operations into execution order
pub fn execution_order(operations: &[ZoneOperation]) -> Vec<&ZoneOperation> {
    let mut ordered: Vec<&ZoneOperation> = operations.iter().collect();
    ordered.sort_by_key(|op| op.phase());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wwn(s: &str) -> PortIdentifier {
        PortIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_wwn_normalization() {
        let forms = [
            "10:00:00:00:c9:A1:b2:C3",
            "10000000C9A1B2C3",
            "10000000c9a1b2c3",
            " 10:00:00:00:C9:A1:B2:C3 ",
        ];
        let parsed: Vec<_> = forms.iter().map(|f| wwn(f)).collect();
        for p in &parsed {
            assert_eq!(p, &parsed[0]);
            assert_eq!(p.as_str(), "10:00:00:00:c9:a1:b2:c3");
        }
        assert_eq!(parsed[0].compact(), "10000000c9a1b2c3");
    }

    #[test]
    fn test_wwn_rejects_garbage() {
        for bad in [
            "",
            "1000",
            "10:00:00:00:00:00:00",
            "1:00:00:00:00:00:00:001",
            "zz00000000000000",
            "10000000000000001",
        ] {
            assert!(PortIdentifier::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_wwn_serde_uses_canonical_form() {
        let id: PortIdentifier = serde_json::from_str("\"5006016A0860291B\"").unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"50:06:01:6a:08:60:29:1b\""
        );
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "initiator-target".parse::<ZoningPolicy>().unwrap(),
            ZoningPolicy::InitiatorTarget
        );
        assert_eq!(
            "initiator".parse::<ZoningPolicy>().unwrap(),
            ZoningPolicy::Initiator
        );
        assert!(matches!(
            "target".parse::<ZoningPolicy>(),
            Err(Error::UnsupportedPolicy(p)) if p == "target"
        ));
    }

    #[test]
    fn test_membership_equality_ignores_order() {
        let a: ZoneMembership = [wwn("1000000000000001"), wwn("2000000000000002")]
            .into_iter()
            .collect();
        let b: ZoneMembership = [wwn("2000000000000002"), wwn("1000000000000001")]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().next().unwrap().as_str(), "10:00:00:00:00:00:00:01");
    }

    #[test]
    fn test_session_idle() {
        assert!(ZoningSession::idle(ZoningMode::Enhanced).is_idle());
        let busy = ZoningSession {
            mode: ZoningMode::Enhanced,
            session: "admin".into(),
        };
        assert!(!busy.is_idle());
        let basic = ZoningSession {
            mode: ZoningMode::Basic,
            session: "admin".into(),
        };
        assert!(basic.is_idle());
    }

    #[test]
    fn test_execution_order_is_stable_by_phase() {
        let ops = vec![
            ZoneOperation::Delete { name: "d1".into() },
            ZoneOperation::UpdateRemoveMembers {
                name: "r1".into(),
                members: vec![],
            },
            ZoneOperation::Create {
                name: "c1".into(),
                members: vec![],
            },
            ZoneOperation::Delete { name: "d2".into() },
            ZoneOperation::UpdateAddMembers {
                name: "a1".into(),
                members: vec![],
            },
        ];
        let names: Vec<_> = execution_order(&ops)
            .into_iter()
            .map(|op| op.zone_name())
            .collect();
        assert_eq!(names, vec!["c1", "a1", "r1", "d1", "d2"]);
    }

    #[test]
    fn test_with_operations() {
        let config = ActiveZoneConfiguration::empty();
        let ops = vec![
            ZoneOperation::Create {
                name: "z1".into(),
                members: vec![wwn("1000000000000001"), wwn("2000000000000002")],
            },
            ZoneOperation::UpdateRemoveMembers {
                name: "z1".into(),
                members: vec![wwn("2000000000000002")],
            },
        ];
        let next = config.with_operations(&ops);
        assert_eq!(next.zone("z1").unwrap().len(), 1);
        assert!(config.zones.is_empty());

        let gone = next.with_operations(&[ZoneOperation::Delete { name: "z1".into() }]);
        assert!(!gone.contains_zone("z1"));
    }
}
