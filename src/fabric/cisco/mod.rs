//! Cisco MDS / NX-OS Connector
//!
//! Reads fabric state with `show` commands and applies zone edits through
//! configuration scripts, both over the shared session pool.

pub mod executor;
pub mod reader;

pub use executor::*;
pub use reader::*;

use crate::config::FabricVendor;
use crate::domain::ports::FabricConnector;
use crate::fabric::session::SessionPool;
use std::sync::Arc;

/// Southbound connector for Cisco fabrics
pub struct CiscoConnector {
    pool: Arc<SessionPool>,
}

impl CiscoConnector {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SessionPool {
        &self.pool
    }
}

impl FabricConnector for CiscoConnector {
    fn vendor(&self) -> FabricVendor {
        FabricVendor::Cisco
    }
}
