//! Zone Manager Configuration
//!
//! Per-fabric endpoints and session pool settings, loaded once from YAML at
//! process start and read-only afterwards.

use crate::domain::model::ZoningPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Characters NX-OS accepts in a zone name
pub const CISCO_ZONE_NAME_CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$-^_";

// =============================================================================
// Fabric Vendor
// =============================================================================

/// Switch vendor, selects the southbound connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricVendor {
    #[default]
    Cisco,
}

impl FabricVendor {
    /// Characters allowed in zone names on this vendor's switches
    pub fn zone_name_charset(&self) -> &'static str {
        match self {
            FabricVendor::Cisco => CISCO_ZONE_NAME_CHARSET,
        }
    }
}

impl fmt::Display for FabricVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricVendor::Cisco => write!(f, "cisco"),
        }
    }
}

// =============================================================================
// Fabric Endpoint
// =============================================================================

/// One configured SAN fabric
#[derive(Clone, Serialize, Deserialize)]
pub struct FabricEndpoint {
    /// Fabric name, taken from the configuration key
    #[serde(skip)]
    pub name: String,
    /// Switch management address
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// VSAN the zones live in
    pub vsan: u16,
    #[serde(default)]
    pub vendor: FabricVendor,
    /// Raw policy string; parsed at the start of every reconciliation
    #[serde(default = "default_zoning_policy")]
    pub zoning_policy: String,
    /// Activate the zone set after edits
    #[serde(default = "default_true")]
    pub zone_activate: bool,
    #[serde(default = "default_zone_name_prefix")]
    pub zone_name_prefix: String,
    /// Zone set to edit when the fabric has no active one
    #[serde(default = "default_zoneset")]
    pub default_zoneset: String,
    /// Optional SHA256 host key fingerprint pin
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_zoning_policy() -> String {
    ZoningPolicy::InitiatorTarget.to_string()
}

fn default_true() -> bool {
    true
}

fn default_zone_name_prefix() -> String {
    "openstack".to_string()
}

fn default_zoneset() -> String {
    "OpenStack_Cfg".to_string()
}

impl FabricEndpoint {
    /// Create an endpoint with Cinder's defaults for everything but the
    /// address, credentials and VSAN
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        vsan: u16,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: default_ssh_port(),
            user: user.into(),
            password: password.into(),
            vsan,
            vendor: FabricVendor::default(),
            zoning_policy: default_zoning_policy(),
            zone_activate: true,
            zone_name_prefix: default_zone_name_prefix(),
            default_zoneset: default_zoneset(),
            host_key_fingerprint: None,
        }
    }

    /// Parsed zoning policy, failing fast on unknown values
    pub fn policy(&self) -> Result<ZoningPolicy> {
        self.zoning_policy.parse()
    }
}

impl fmt::Debug for FabricEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FabricEndpoint")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("vsan", &self.vsan)
            .field("vendor", &self.vendor)
            .field("zoning_policy", &self.zoning_policy)
            .field("zone_activate", &self.zone_activate)
            .field("zone_name_prefix", &self.zone_name_prefix)
            .field("default_zoneset", &self.default_zoneset)
            .finish()
    }
}

// =============================================================================
// Session Pool Configuration
// =============================================================================

/// Settings for the switch session pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPoolConfig {
    /// Concurrent sessions allowed per (host, port, user)
    pub max_sessions_per_endpoint: usize,
    /// Attempts for transient transport failures, including the first
    pub retry_attempts: u32,
    pub retry_initial_interval_ms: u64,
    pub retry_max_interval_ms: u64,
    /// Upper bound for a single command or script round-trip
    pub command_timeout_secs: u64,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_endpoint: 3,
            retry_attempts: 3,
            retry_initial_interval_ms: 50,
            retry_max_interval_ms: 500,
            command_timeout_secs: 30,
        }
    }
}

impl SessionPoolConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// =============================================================================
// Zoning Configuration
// =============================================================================

/// Complete zone manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoningConfig {
    #[serde(default)]
    pub fabrics: BTreeMap<String, FabricEndpoint>,
    #[serde(default)]
    pub pool: SessionPoolConfig,
    /// How long a caller waits for another caller zoning the same fabric
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

fn default_lock_timeout_secs() -> u64 {
    300
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self {
            fabrics: BTreeMap::new(),
            pool: SessionPoolConfig::default(),
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl ZoningConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: ZoningConfig = serde_yaml::from_str(raw)?;
        for (name, endpoint) in config.fabrics.iter_mut() {
            endpoint.name = name.clone();
        }
        Ok(config)
    }

    /// Add a fabric, keyed by its name
    pub fn with_fabric(mut self, endpoint: FabricEndpoint) -> Self {
        self.fabrics.insert(endpoint.name.clone(), endpoint);
        self
    }

    /// Look up one fabric
    pub fn fabric(&self, name: &str) -> Result<&FabricEndpoint> {
        self.fabrics.get(name).ok_or_else(|| Error::FabricNotFound {
            fabric: name.to_string(),
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Check every fabric eagerly; reconciliation re-checks the policy anyway
    pub fn validate(&self) -> Result<()> {
        if self.fabrics.is_empty() {
            return Err(Error::Configuration("no fabrics configured".into()));
        }
        if self.pool.max_sessions_per_endpoint == 0 {
            return Err(Error::Configuration(
                "pool.max_sessions_per_endpoint must be at least 1".into(),
            ));
        }
        if self.pool.retry_attempts == 0 {
            return Err(Error::Configuration(
                "pool.retry_attempts must be at least 1".into(),
            ));
        }

        for endpoint in self.fabrics.values() {
            endpoint.policy()?;
            if endpoint.address.is_empty() {
                return Err(Error::Configuration(format!(
                    "fabric {} has no address",
                    endpoint.name
                )));
            }
            if endpoint.user.is_empty() {
                return Err(Error::Configuration(format!(
                    "fabric {} has no user",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SAMPLE: &str = r#"
fabrics:
  fabricA:
    address: 10.0.0.10
    user: admin
    password: secret
    vsan: 304
  fabricB:
    address: 10.0.0.11
    port: 2222
    user: admin
    password: secret
    vsan: 305
    zoning_policy: initiator
    zone_activate: false
    zone_name_prefix: os_
pool:
  retry_attempts: 5
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ZoningConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.fabrics.len(), 2);

        let a = config.fabric("fabricA").unwrap();
        assert_eq!(a.name, "fabricA");
        assert_eq!(a.port, 22);
        assert_eq!(a.vendor, FabricVendor::Cisco);
        assert_eq!(a.policy().unwrap(), ZoningPolicy::InitiatorTarget);
        assert!(a.zone_activate);
        assert_eq!(a.zone_name_prefix, "openstack");
        assert_eq!(a.default_zoneset, "OpenStack_Cfg");

        let b = config.fabric("fabricB").unwrap();
        assert_eq!(b.port, 2222);
        assert_eq!(b.policy().unwrap(), ZoningPolicy::Initiator);
        assert!(!b.zone_activate);

        assert_eq!(config.pool.retry_attempts, 5);
        assert_eq!(config.pool.max_sessions_per_endpoint, 3);
        assert_eq!(config.lock_timeout(), Duration::from_secs(300));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ZoningConfig::load(file.path()).unwrap();
        assert!(config.fabric("fabricA").is_ok());
    }

    #[test]
    fn test_unknown_fabric() {
        let config = ZoningConfig::from_yaml(SAMPLE).unwrap();
        assert_matches!(
            config.fabric("nope"),
            Err(Error::FabricNotFound { fabric }) if fabric == "nope"
        );
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let endpoint = FabricEndpoint {
            zoning_policy: "per-target".into(),
            ..FabricEndpoint::new("f1", "10.0.0.1", "admin", "pw", 10)
        };
        let config = ZoningConfig::default().with_fabric(endpoint);
        assert_matches!(config.validate(), Err(Error::UnsupportedPolicy(p)) if p == "per-target");
    }

    #[test]
    fn test_debug_redacts_password() {
        let endpoint = FabricEndpoint::new("f1", "10.0.0.1", "admin", "hunter2", 10);
        let rendered = format!("{:?}", endpoint);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
