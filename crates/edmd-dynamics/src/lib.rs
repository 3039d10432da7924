//! Dynamics layer of the edmd engine: the liouvillean free-flight kernel,
//! collision root finders, and the interaction / local / global / system
//! event-generator families.

pub mod global;
pub mod interaction;
pub mod intersection;
pub mod liouvillean;
pub mod local;
pub mod model;
pub mod system;

pub use global::{CellGlobal, Global};
pub use interaction::Interaction;
pub use intersection::{next_event, OffcentreSpheres, OverlapFunction, EPS_BACK};
pub use liouvillean::{pair_mut, Liouvillean, PairMotion, PlateState};
pub use local::Local;
pub use model::{Context, Model};
pub use system::{AndersenThermostat, Halt, System};

use edmd_core::CoreError;
use thiserror::Error;

/// Errors raised while generating or resolving events.
#[derive(Debug, Error)]
pub enum DynamicsError {
    #[error("event references missing particle {0}")]
    MissingParticle(u32),

    #[error("pair event with identical participants (particle {0})")]
    SelfPair(u32),

    #[error("malformed event: {0}")]
    BadEvent(String),

    #[error("the cells global needs a periodic domain")]
    UnboundedCells,

    #[error("cell width {width} leaves fewer than 3 cells across a domain edge of {dim}")]
    CellResolution { width: f64, dim: f64 },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, DynamicsError>;
