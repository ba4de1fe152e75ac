//! Multi-channel DRAM controller simulator with hot-row migration.
//!
//! This crate models a memory controller in front of asymmetric DRAM, where
//! some rows of every bank are faster than others:
//! 1. **DRAM:** Bank, rank, and channel timing state machines with strict command admission and energy accounting.
//! 2. **Mapping:** Address extraction, remapping tables, hot-row detection, and promotion.
//! 3. **Controller:** Per-channel schedulers and the hub that stages requests and responds upstream.
//! 4. **Configuration:** Device presets, controller limits, and asymmetric-region parameters.
//! 5. **Statistics:** Access, row, and energy counters.

/// Common types (coordinates, requests, errors).
pub mod common;
/// Controller configuration (defaults, device presets, hierarchical config structures).
pub mod config;
/// Request staging, channel scheduling, and clocking.
pub mod controller;
/// Device timing model (bank, rank, channel).
pub mod dram;
/// Address mapping and migration state.
pub mod mapping;
/// Counter collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Top-level controller; construct with `ControllerHub::new`.
pub use crate::controller::ControllerHub;
/// Interconnect interface implemented by the caller.
pub use crate::controller::Upstream;
/// Controller counters.
pub use crate::stats::MemoryCounter;
