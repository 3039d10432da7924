//! edmd — an event-driven molecular dynamics engine.
//!
//! Time advances from collision to collision: the scheduler orders future
//! events, the liouvillean turns geometry into collision times and impulse
//! exchanges, and the driver commits events one at a time, fanning each one
//! out to read-only observer plugins.
//!
//! This is the umbrella crate: it provides the [`Simulation`] driver and
//! the output plugins, and re-exports the core types from the sub-crates.

pub mod plugins;
pub mod simulation;

pub use plugins::{CollisionCorrelator, KineticEnergy, MomentumWatch, OutputPlugin, SimView};
pub use simulation::{Diagnostics, Simulation, StopReason};

pub use edmd_config::{load_str, write_config, ConfigError, LoadedSim, Units};
pub use edmd_core::{
    Event, EventData, EventKind, EventSource, PairEventData, Particle, ParticleEventData,
};
pub use edmd_dynamics::{
    Global, Interaction, Liouvillean, Local, Model, System,
};
pub use edmd_math::{BoundaryCondition, Vec3};
pub use edmd_sched::Scheduler;

use thiserror::Error;

/// Umbrella error for driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] edmd_config::ConfigError),

    #[error(transparent)]
    Dynamics(#[from] edmd_dynamics::DynamicsError),

    #[error("observer {0} failed: {1}")]
    Plugin(String, String),
}

pub type Result<T> = std::result::Result<T, SimError>;
