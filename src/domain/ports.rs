//! Domain Ports - Core trait definitions for the zone manager
//!
//! These traits define the boundaries between zoning logic and the fabric
//! switches. Vendor adapters implement them; the zone driver only sees ports.

use crate::config::{FabricEndpoint, FabricVendor};
use crate::domain::model::{
    ActiveZoneConfiguration, NameServerEntry, ZoneOperation, ZoningSession,
};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Session Ports
// =============================================================================

/// Pool key: sessions are never shared across different endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl SessionKey {
    pub fn for_endpoint(endpoint: &FabricEndpoint) -> Self {
        Self {
            host: endpoint.address.clone(),
            port: endpoint.port,
            user: endpoint.user.clone(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// An authenticated CLI session to one switch
#[async_trait]
pub trait CliSession: Send {
    /// Run a single command on its own channel and return its output
    async fn exec(&mut self, command: &str) -> Result<String>;

    /// Feed a sequence of lines to an interactive shell and return the
    /// captured output with echoed commands and prompts stripped
    async fn run_script(&mut self, commands: &[String]) -> Result<String>;

    /// Whether the underlying connection can still be reused
    fn is_alive(&self) -> bool;

    async fn close(&mut self);
}

/// Establishes new authenticated sessions
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, endpoint: &FabricEndpoint) -> Result<Box<dyn CliSession>>;
}

// =============================================================================
// Fabric State Reader Port
// =============================================================================

/// Read-only queries against a fabric segment (the endpoint's VSAN)
#[async_trait]
pub trait FabricStateReader: Send + Sync {
    /// Ports logged into the segment, node ports only
    async fn get_nameserver_entries(&self, endpoint: &FabricEndpoint)
        -> Result<Vec<NameServerEntry>>;

    /// The active zone set
    async fn get_active_zone_configuration(
        &self,
        endpoint: &FabricEndpoint,
    ) -> Result<ActiveZoneConfiguration>;

    /// Whether an edit session is pending
    async fn get_zoning_session_status(&self, endpoint: &FabricEndpoint) -> Result<ZoningSession>;
}

// =============================================================================
// Fabric Command Executor Port
// =============================================================================

/// Applies computed zone operations to a fabric
#[async_trait]
pub trait FabricCommandExecutor: Send + Sync {
    /// Apply operations in phase order, optionally activating the zone set.
    ///
    /// Returns the number of operations applied. Fails without issuing any
    /// command when `session` is not idle.
    async fn apply(
        &self,
        endpoint: &FabricEndpoint,
        operations: &[ZoneOperation],
        activate: bool,
        current: &ActiveZoneConfiguration,
        session: &ZoningSession,
    ) -> Result<usize>;
}

// =============================================================================
// Fabric Connector
// =============================================================================

/// A vendor's complete southbound connector
pub trait FabricConnector: FabricStateReader + FabricCommandExecutor {
    fn vendor(&self) -> FabricVendor;
}

pub type FabricConnectorRef = Arc<dyn FabricConnector>;
pub type SessionConnectorRef = Arc<dyn SessionConnector>;
