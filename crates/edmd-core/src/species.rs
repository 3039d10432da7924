//! Species: mass assignment and a representative interaction per id range.

use crate::property::{PropertyRef, PropertyStore};
use crate::range::Range;
use crate::{CoreError, ParticleId, Result};

/// A named particle species covering a 1-range.
#[derive(Debug, Clone)]
pub struct Species {
    pub name: String,
    pub mass: PropertyRef,
    pub range: Range,
    /// Name of the interaction that represents this species' core geometry.
    pub int_name: String,
}

impl Species {
    pub fn new(
        name: impl Into<String>,
        mass: PropertyRef,
        range: Range,
        int_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mass,
            range,
            int_name: int_name.into(),
        }
    }
}

/// Resolve the mass of every particle from the species list.
///
/// Species are checked in declaration order; the first covering range wins.
/// Every particle must be covered.
pub fn resolve_masses(
    species: &[Species],
    store: &PropertyStore,
    n_particles: usize,
) -> Result<Vec<f64>> {
    let mut masses = Vec::with_capacity(n_particles);
    for id in 0..n_particles as ParticleId {
        let sp = species
            .iter()
            .find(|s| s.range.contains(id))
            .ok_or(CoreError::NoSpecies(id))?;
        masses.push(sp.mass.value(store, id));
    }
    Ok(masses)
}
