//! Zone Driver - The public facade
//!
//! Coordinates one reconciliation at a time per fabric:
//! - Serializes callers through the fabric lock registry
//! - Reads the session status and active zone set
//! - Computes the operations needed for the request
//! - Hands them to the vendor executor
//!
//! Policy is parsed before the lock is taken so a misconfigured fabric fails
//! without issuing any command.

pub mod locks;
pub mod lookup;
pub mod stats;

pub use locks::*;
pub use lookup::*;
pub use stats::*;

use crate::config::{FabricEndpoint, ZoningConfig};
use crate::domain::model::{
    ActiveZoneConfiguration, ConnectivityRequest, NameServerEntry, ZoningPolicy, ZoningSession,
};
use crate::domain::ports::FabricConnectorRef;
use crate::error::{Error, Result};
use crate::fabric::{FabricConnectorFactory, SessionPool};
use crate::zoning::{compute_operations, compute_removal_operations, NamingInputs};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

// =============================================================================
// Outcomes and Phases
// =============================================================================

/// What a reconciliation did to the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ZoningOutcome {
    /// Operations were applied (and the zone set activated if configured)
    Applied { operations: usize },
    /// The fabric already matched the request
    NoChange,
    /// Another edit session was pending; nothing was issued
    SkippedBusySession,
}

/// Where a fabric's most recent reconciliation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    #[default]
    Idle,
    Reading,
    Reconciling,
    Applying,
    /// The last reconciliation failed; cleared by the next one
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Add,
    Delete,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Add => write!(f, "add"),
            Direction::Delete => write!(f, "delete"),
        }
    }
}

/// Everything the fabric reports about its zoning, for operators
#[derive(Debug, Clone, Serialize)]
pub struct FabricState {
    pub fabric: String,
    pub vsan: u16,
    pub nameserver: Vec<NameServerEntry>,
    pub active_zones: ActiveZoneConfiguration,
    pub session: ZoningSession,
}

// =============================================================================
// Zone Driver
// =============================================================================

/// Entry point for attach/detach zoning requests
pub struct ZoneDriver {
    config: Arc<ZoningConfig>,
    /// Vendor connector per fabric name
    connectors: BTreeMap<String, FabricConnectorRef>,
    locks: Arc<FabricLockRegistry>,
    phases: RwLock<BTreeMap<String, DriverPhase>>,
    stats: DriverStats,
}

impl ZoneDriver {
    /// Create a driver with one connector per configured fabric
    pub fn new(
        config: Arc<ZoningConfig>,
        pool: Arc<SessionPool>,
        locks: Arc<FabricLockRegistry>,
    ) -> Self {
        let connectors = config
            .fabrics
            .iter()
            .map(|(name, endpoint)| {
                (
                    name.clone(),
                    FabricConnectorFactory::create(endpoint.vendor, pool.clone()),
                )
            })
            .collect();
        Self::with_connectors(config, connectors, locks)
    }

    pub fn with_connectors(
        config: Arc<ZoningConfig>,
        connectors: BTreeMap<String, FabricConnectorRef>,
        locks: Arc<FabricLockRegistry>,
    ) -> Self {
        info!("Zone driver ready for {} fabrics", connectors.len());
        Self {
            config,
            connectors,
            locks,
            phases: RwLock::new(BTreeMap::new()),
            stats: DriverStats::new(),
        }
    }

    /// Ensure every initiator in the request can reach its targets
    pub async fn add_connection(
        &self,
        fabric: &str,
        request: &ConnectivityRequest,
    ) -> Result<ZoningOutcome> {
        self.reconcile(fabric, request, Direction::Add).await
    }

    /// Withdraw the connectivity described by the request
    pub async fn delete_connection(
        &self,
        fabric: &str,
        request: &ConnectivityRequest,
    ) -> Result<ZoningOutcome> {
        self.reconcile(fabric, request, Direction::Delete).await
    }

    /// Read a fabric's name server, active zone set and session status
    pub async fn fabric_state(&self, fabric: &str) -> Result<FabricState> {
        let endpoint = self.config.fabric(fabric)?;
        let connector = self.connector(fabric)?;
        let session = connector.get_zoning_session_status(endpoint).await?;
        let active_zones = connector.get_active_zone_configuration(endpoint).await?;
        let nameserver = connector.get_nameserver_entries(endpoint).await?;
        Ok(FabricState {
            fabric: fabric.to_string(),
            vsan: endpoint.vsan,
            nameserver,
            active_zones,
            session,
        })
    }

    /// Phase of a fabric's most recent reconciliation
    pub fn phase(&self, fabric: &str) -> DriverPhase {
        self.phases.read().get(fabric).copied().unwrap_or_default()
    }

    pub fn stats(&self) -> DriverStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &ZoningConfig {
        &self.config
    }

    fn connector(&self, fabric: &str) -> Result<&FabricConnectorRef> {
        self.connectors
            .get(fabric)
            .ok_or_else(|| Error::FabricNotFound {
                fabric: fabric.to_string(),
            })
    }

    fn set_phase(&self, fabric: &str, phase: DriverPhase) {
        info!(fabric, ?phase, "Zoning phase");
        self.phases.write().insert(fabric.to_string(), phase);
    }

    async fn reconcile(
        &self,
        fabric: &str,
        request: &ConnectivityRequest,
        direction: Direction,
    ) -> Result<ZoningOutcome> {
        let result = self.try_reconcile(fabric, request, direction).await;
        if let Err(e) = &result {
            error!(fabric, %direction, error = %e, "Zoning failed");
            self.stats.record_failure();
            // Unknown fabric names get no phase entry
            if self.connectors.contains_key(fabric) {
                self.set_phase(fabric, DriverPhase::Failed);
            }
        }
        result
    }

    async fn try_reconcile(
        &self,
        fabric: &str,
        request: &ConnectivityRequest,
        direction: Direction,
    ) -> Result<ZoningOutcome> {
        let endpoint = self.config.fabric(fabric)?;
        let policy = endpoint.policy()?;
        let connector = self.connector(fabric)?;

        if request.is_empty() {
            return Ok(ZoningOutcome::NoChange);
        }

        let _guard = self.locks.acquire(fabric, self.config.lock_timeout()).await?;
        self.stats.record_started();

        let span = info_span!("reconcile", fabric, %direction, %policy);
        let outcome = self
            .run(endpoint, connector, request, direction, policy)
            .instrument(span)
            .await?;
        self.set_phase(fabric, DriverPhase::Idle);
        Ok(outcome)
    }

    async fn run(
        &self,
        endpoint: &FabricEndpoint,
        connector: &FabricConnectorRef,
        request: &ConnectivityRequest,
        direction: Direction,
        policy: ZoningPolicy,
    ) -> Result<ZoningOutcome> {
        let fabric = endpoint.name.as_str();

        self.set_phase(fabric, DriverPhase::Reading);
        let session = connector.get_zoning_session_status(endpoint).await?;
        if !session.is_idle() {
            warn!(
                fabric,
                session = %session.session,
                "Zoning session in progress on fabric, skipping"
            );
            self.stats.record_skipped();
            return Ok(ZoningOutcome::SkippedBusySession);
        }
        let current = connector.get_active_zone_configuration(endpoint).await?;

        self.set_phase(fabric, DriverPhase::Reconciling);
        let naming = NamingInputs {
            prefix: &endpoint.zone_name_prefix,
            charset: endpoint.vendor.zone_name_charset(),
        };
        let operations = match direction {
            Direction::Add => compute_operations(request, &current, policy, &naming)?,
            Direction::Delete => compute_removal_operations(request, &current, policy, &naming)?,
        };
        if operations.is_empty() {
            info!(fabric, "Fabric already matches request");
            return Ok(ZoningOutcome::NoChange);
        }

        self.set_phase(fabric, DriverPhase::Applying);
        let applied = connector
            .apply(endpoint, &operations, endpoint.zone_activate, &current, &session)
            .await?;
        self.stats.record_applied(applied);
        info!(fabric, applied, "Zoning applied");
        Ok(ZoningOutcome::Applied {
            operations: applied,
        })
    }
}
