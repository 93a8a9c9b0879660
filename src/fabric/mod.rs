//! Fabric Adapters
//!
//! Vendor connectors implementing the fabric ports:
//! - Cisco: MDS switches running NX-OS
//!
//! Connectors are selected by the vendor named in each fabric's
//! configuration and share one session pool.

pub mod cisco;
pub mod session;

pub use cisco::CiscoConnector;
pub use session::{SessionPool, SshConnector};

use crate::config::FabricVendor;
use crate::domain::ports::FabricConnectorRef;
use std::sync::Arc;

/// Factory for creating fabric connectors
pub struct FabricConnectorFactory;

impl FabricConnectorFactory {
    /// Create the connector for a vendor
    pub fn create(vendor: FabricVendor, pool: Arc<SessionPool>) -> FabricConnectorRef {
        match vendor {
            FabricVendor::Cisco => Arc::new(CiscoConnector::new(pool)),
        }
    }
}
