//! The static simulation model: everything fixed after loading.

use crate::interaction::Interaction;
use crate::liouvillean::Liouvillean;
use crate::local::Local;
use crate::Result;
use edmd_core::{resolve_masses, PairRange, ParticleId, PropertyStore, Species};
use edmd_math::BoundaryCondition;

/// Borrowed view of the model pieces every generator needs. Passed
/// explicitly to operations instead of living behind a global.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub bc: &'a BoundaryCondition,
    pub liouvillean: &'a Liouvillean,
    pub properties: &'a PropertyStore,
    pub masses: &'a [f64],
}

/// The immutable part of a loaded simulation.
#[derive(Debug, Clone)]
pub struct Model {
    pub bc: BoundaryCondition,
    pub liouvillean: Liouvillean,
    pub properties: PropertyStore,
    pub species: Vec<Species>,
    /// Per-particle masses, resolved from the species list at load time.
    pub masses: Vec<f64>,
    pub interactions: Vec<Interaction>,
    pub locals: Vec<Local>,
    /// Seed for every stochastic piece of the run.
    pub seed: u64,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bc: BoundaryCondition,
        liouvillean: Liouvillean,
        properties: PropertyStore,
        species: Vec<Species>,
        interactions: Vec<Interaction>,
        locals: Vec<Local>,
        seed: u64,
        n_particles: usize,
    ) -> Result<Self> {
        let masses = resolve_masses(&species, &properties, n_particles)?;
        Ok(Self {
            bc,
            liouvillean,
            properties,
            species,
            masses,
            interactions,
            locals,
            seed,
        })
    }

    pub fn ctx(&self) -> Context<'_> {
        Context {
            bc: &self.bc,
            liouvillean: &self.liouvillean,
            properties: &self.properties,
            masses: &self.masses,
        }
    }

    #[inline]
    pub fn mass(&self, id: ParticleId) -> f64 {
        self.masses[id as usize]
    }

    /// The interaction governing a pair: the first declared one whose
    /// 2-range admits it.
    pub fn interaction_for(&self, a: ParticleId, b: ParticleId) -> Option<(usize, &Interaction)> {
        self.interactions
            .iter()
            .enumerate()
            .find(|(_, i)| i.range().contains(a, b))
    }

    /// Widest interaction range in the model; sizes neighbour cells.
    pub fn max_int_dist(&self) -> f64 {
        let ctx = self.ctx();
        self.interactions
            .iter()
            .map(|i| i.max_int_dist(&ctx))
            .fold(0.0, f64::max)
    }
}
