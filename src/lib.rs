//! Fabric Zone Manager - FC zoning reconciliation
//!
//! Keeps Fibre Channel fabric zoning in step with block storage
//! attach/detach events. Given the initiator-to-target connectivity a
//! volume attachment needs, the driver reads the fabric's active zone set,
//! computes the minimal zone changes under the configured zoning policy and
//! applies them over the switch CLI.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Zone Driver (facade)                          │
//! │   fabric locks · phase tracking · stats · SAN lookup                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────┐        ┌───────────────────────────────┐  │
//! │  │  Zone Name Resolver   │───────▶│    Reconciliation Engine      │  │
//! │  │  (friendly / prefix)  │        │    (pure, synchronous)        │  │
//! │  └───────────────────────┘        └───────────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                 Fabric Connectors (per vendor)                        │
//! │  ┌───────────────────────┐        ┌───────────────────────────────┐  │
//! │  │  State Reader         │        │  Command Executor             │  │
//! │  │  (show + parsers)     │        │  (config scripts, activate)   │  │
//! │  └───────────┬───────────┘        └───────────────┬───────────────┘  │
//! │              └──────────────┬─────────────────────┘                  │
//! │                 ┌───────────┴───────────┐                            │
//! │                 │  Session Pool (SSH)   │                            │
//! │                 └───────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`driver`]: Zone driver facade, fabric locks and SAN lookup
//! - [`zoning`]: Zone naming and reconciliation
//! - [`fabric`]: Vendor connectors and the session pool
//! - [`domain`]: Core domain types and traits
//! - [`config`]: Fabric and pool configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod fabric;
pub mod zoning;

// Re-export commonly used types
pub use config::{FabricEndpoint, FabricVendor, SessionPoolConfig, ZoningConfig};

pub use domain::model::{
    ActiveZoneConfiguration, ConnectivityRequest, NameServerEntry, PortIdentifier,
    ZoneMembership, ZoneOperation, ZoningMode, ZoningPolicy, ZoningSession,
};

pub use domain::ports::{
    CliSession, FabricCommandExecutor, FabricConnector, FabricStateReader, SessionConnector,
};

pub use driver::{
    DriverPhase, DriverStatsSnapshot, FabricDeviceMapping, FabricLockRegistry, FabricState,
    ZoneDriver, ZoningOutcome,
};

pub use error::{Error, ErrorDisposition, Result};

pub use fabric::{CiscoConnector, FabricConnectorFactory, SessionPool, SshConnector};

pub use zoning::{compute_operations, compute_removal_operations, NamingInputs};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
