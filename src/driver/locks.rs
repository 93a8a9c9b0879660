//! Per-Fabric Locks
//!
//! Serializes reconciliations against the same fabric within this process.
//! Different fabrics never contend.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of one async mutex per fabric name
#[derive(Debug, Default)]
pub struct FabricLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FabricLockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait up to `timeout` for exclusive access to a fabric
    pub async fn acquire(&self, fabric: &str, timeout: Duration) -> Result<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(fabric.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(fabric, "Acquired fabric lock");
                Ok(guard)
            }
            Err(_) => Err(Error::LockTimeout {
                fabric: fabric.to_string(),
                after: timeout,
            }),
        }
    }

    /// Number of fabrics that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
