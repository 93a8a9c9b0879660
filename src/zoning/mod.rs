//! Zoning Logic
//!
//! Pure zone naming and reconciliation; no fabric I/O happens here.

pub mod naming;
pub mod reconcile;

pub use naming::*;
pub use reconcile::*;
