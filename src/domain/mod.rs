//! Domain layer - Zoning model and port definitions
//!
//! This module defines the zoning data model and the traits (ports) that
//! vendor adapters implement, following hexagonal architecture principles.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
