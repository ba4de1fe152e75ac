//! Common types shared by every component of the controller model.
//!
//! This module provides the fundamental building blocks used across the crate:
//! 1. **Coordinates:** Hierarchical and remap-domain location of an access.
//! 2. **Requests:** Operation kinds, inbound requests, and outbound responses.
//! 3. **Error Handling:** Configuration and loading errors.

/// DRAM coordinate type.
pub mod coords;

/// Request and response definitions.
pub mod data;

/// Error types.
pub mod error;

pub use coords::Coordinates;
pub use data::{MemoryOp, Request, Response};
pub use error::{ConfigError, DramError};
