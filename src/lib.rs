//! Satellite Orbits - morphing orbit kinematics for a planet-defense arcade game
//!
//! Core modules:
//! - `sim`: Orbits, straight-line motions, spins and the scene holding them
//! - `persistence`: Binary save/resume of the whole scene
//! - `config`: Universe limits and morph tuning
//! - `sync`: Logic/render frame lock
//! - `runtime`: Logic and render workers driven by the frame lock

pub mod config;
pub mod persistence;
pub mod runtime;
pub mod sim;
pub mod sync;

pub use config::{ConfigError, UniverseConfig};
pub use persistence::{PersistError, PersistResult, Persistable};
pub use sync::Synchronizer;

/// Timing constants of the demo driver
pub mod consts {
    /// Logic tick length in time units (60 ticks per unit)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Seed of the demo scene and its impulses
    pub const DEMO_SEED: u64 = 0x5a7e_1117;
    /// Number of satellites in the demo scene
    pub const DEMO_SATELLITES: usize = 6;
    /// Logic ticks before the demo pauses
    pub const DEMO_TICKS: i64 = 600;
    /// Average ticks between two random impulses
    pub const DEMO_IMPULSE_INTERVAL: u64 = 45;
}
