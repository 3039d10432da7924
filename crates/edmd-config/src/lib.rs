//! XML snapshot format: load a complete simulation from a configuration
//! document and write one back out, round-trippably.
//!
//! Every element carries a `Type` discriminator selecting the concrete
//! variant. Numeric attributes are written in the declared unit system and
//! converted at load; attributes that fail to parse as numbers are treated
//! as property-name references. Load failures are fatal.

mod load;
mod write;

pub use load::load_str;
pub use write::write_config;

use edmd_core::Particle;
use edmd_dynamics::{Global, Model, System};
use thiserror::Error;

/// Scale factors of the declared unit system relative to internal units.
#[derive(Debug, Clone, PartialEq)]
pub struct Units {
    pub length: f64,
    pub time: f64,
    pub mass: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            length: 1.0,
            time: 1.0,
            mass: 1.0,
        }
    }
}

impl Units {
    pub fn velocity(&self) -> f64 {
        self.length / self.time
    }

    pub fn energy(&self) -> f64 {
        self.mass * self.velocity() * self.velocity()
    }

    /// Scale factor carrying a declared dimension into internal units.
    pub fn scale_of(&self, dimension: edmd_core::Dimension) -> f64 {
        match dimension {
            edmd_core::Dimension::Dimensionless => 1.0,
            edmd_core::Dimension::Length => self.length,
            edmd_core::Dimension::Time => self.time,
            edmd_core::Dimension::Mass => self.mass,
            edmd_core::Dimension::Energy => self.energy(),
        }
    }
}

/// Everything a configuration document describes.
pub struct LoadedSim {
    pub model: Model,
    pub globals: Vec<Global>,
    pub systems: Vec<System>,
    pub particles: Vec<Particle>,
    pub units: Units,
}

/// Fatal configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("element <{element}> is missing attribute {attribute}")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("attribute {attribute}=\"{value}\" is not a valid number")]
    BadNumber {
        attribute: &'static str,
        value: String,
    },

    #[error("element <{element}> has unknown Type \"{value}\"")]
    UnknownType { element: &'static str, value: String },

    #[error("malformed configuration: {0}")]
    Structure(String),

    #[error(transparent)]
    Core(#[from] edmd_core::CoreError),

    #[error(transparent)]
    Dynamics(#[from] edmd_dynamics::DynamicsError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
