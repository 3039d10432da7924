//! Core data model for the edmd engine: particles with local clocks, the
//! event tuple and per-particle change records, the property store, and the
//! range predicates that scope event generators.

pub mod data;
pub mod event;
pub mod particle;
pub mod property;
pub mod range;
pub mod species;

pub use data::{EventData, PairEventData, ParticleEventData};
pub use event::{Event, EventKind, EventSource, NO_PARTICLE};
pub use particle::{Orientation, Particle, ParticleId};
pub use property::{Dimension, Property, PropertyKind, PropertyRef, PropertyStore};
pub use range::{PairRange, Range};
pub use species::{resolve_masses, Species};

use thiserror::Error;

/// Errors raised while building or querying the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("invalid particle state: {0}")]
    InvalidParticle(String),

    #[error("no species covers particle {0}")]
    NoSpecies(ParticleId),
}

pub type Result<T> = std::result::Result<T, CoreError>;
