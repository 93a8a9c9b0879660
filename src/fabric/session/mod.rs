//! Fabric Session Client
//!
//! Pooled, authenticated CLI sessions to fabric switches.

pub mod pool;
pub mod ssh;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use pool::*;
pub use ssh::*;
