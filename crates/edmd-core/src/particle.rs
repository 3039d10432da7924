//! Particle representation.

use crate::{CoreError, Result};
use edmd_math::Vec3;

/// Stable particle identifier.
pub type ParticleId = u32;

/// Rotational state for particles with off-centre geometry.
#[derive(Debug, Clone, Copy)]
pub struct Orientation {
    /// Unit quaternion body frame -> world frame.
    pub q: nalgebra::UnitQuaternion<f64>,
    /// Angular velocity (world frame, rad per unit time).
    pub angvel: Vec3,
}

impl Orientation {
    /// Non-rotating identity orientation.
    pub fn stationary() -> Self {
        Self {
            q: nalgebra::UnitQuaternion::identity(),
            angvel: Vec3::zeros(),
        }
    }
}

/// A particle with an analytic trajectory between events.
///
/// Invariant: at local clock `clock`, the trajectory implied by the active
/// liouvillean is valid for all later times until the next event touches
/// this particle. `event_count` is bumped on every committed state change
/// and stamps scheduled events for freshness checks.
#[derive(Debug, Clone)]
pub struct Particle {
    id: ParticleId,
    /// Position at `clock`.
    pub pos: Vec3,
    /// Velocity at `clock`.
    pub vel: Vec3,
    /// Simulation time at which `pos`/`vel` were last synchronized.
    pub clock: f64,
    /// Committed-event counter, used to detect stale scheduled events.
    pub event_count: u64,
    /// Optional rotational state.
    pub orientation: Option<Orientation>,
}

impl Particle {
    /// Create a particle at local clock zero.
    pub fn new(id: ParticleId, pos: Vec3, vel: Vec3) -> Result<Self> {
        if !pos.iter().all(|x| x.is_finite()) {
            return Err(CoreError::InvalidParticle(format!(
                "particle {id} position must be finite"
            )));
        }
        if !vel.iter().all(|x| x.is_finite()) {
            return Err(CoreError::InvalidParticle(format!(
                "particle {id} velocity must be finite"
            )));
        }
        Ok(Self {
            id,
            pos,
            vel,
            clock: 0.0,
            event_count: 0,
            orientation: None,
        })
    }

    /// Attach rotational state.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    #[inline]
    pub fn id(&self) -> ParticleId {
        self.id
    }

    /// Bump the freshness stamp after a committed state change.
    #[inline]
    pub fn bump_event_count(&mut self) {
        self.event_count = self.event_count.wrapping_add(1);
    }

    /// Kinetic energy for the given mass: m |v|^2 / 2.
    #[inline]
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * self.vel.norm_squared()
    }

    /// Linear momentum for the given mass.
    #[inline]
    pub fn momentum(&self, mass: f64) -> Vec3 {
        self.vel * mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_starts_synchronized_at_zero() {
        let p = Particle::new(3, Vec3::new(1.0, 2.0, 3.0), Vec3::zeros()).unwrap();
        assert_eq!(p.id(), 3);
        assert_eq!(p.clock, 0.0);
        assert_eq!(p.event_count, 0);
        assert!(p.orientation.is_none());
    }

    #[test]
    fn non_finite_state_is_rejected() {
        assert!(Particle::new(0, Vec3::new(f64::NAN, 0.0, 0.0), Vec3::zeros()).is_err());
        assert!(Particle::new(0, Vec3::zeros(), Vec3::new(0.0, f64::INFINITY, 0.0)).is_err());
    }

    #[test]
    fn kinetic_energy_uses_supplied_mass() {
        let p = Particle::new(0, Vec3::zeros(), Vec3::new(3.0, 4.0, 0.0)).unwrap();
        assert!((p.kinetic_energy(2.0) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn bump_event_count_increments() {
        let mut p = Particle::new(0, Vec3::zeros(), Vec3::zeros()).unwrap();
        p.bump_event_count();
        p.bump_event_count();
        assert_eq!(p.event_count, 2);
    }
}
