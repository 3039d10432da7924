//! Per-particle change records handed to observers after an event commits.

use crate::event::EventKind;
use crate::particle::ParticleId;
use edmd_math::Vec3;

/// State change of a single particle.
#[derive(Debug, Clone, Copy)]
pub struct ParticleEventData {
    pub id: ParticleId,
    /// Velocity before the event.
    pub old_vel: Vec3,
    /// Velocity after the event.
    pub new_vel: Vec3,
    /// Kinetic-energy change of this particle.
    pub delta_ke: f64,
    pub kind: EventKind,
}

impl ParticleEventData {
    /// Momentum change for the given mass.
    #[inline]
    pub fn delta_momentum(&self, mass: f64) -> Vec3 {
        (self.new_vel - self.old_vel) * mass
    }
}

/// State change of a colliding pair.
#[derive(Debug, Clone, Copy)]
pub struct PairEventData {
    pub p1: ParticleEventData,
    pub p2: ParticleEventData,
    /// Minimum-image separation at contact, from p2 to p1.
    pub rij: Vec3,
    /// Impulse applied to p1 (p2 receives the negative).
    pub impulse: Vec3,
    /// Total kinetic-energy change of the pair.
    pub delta_ke: f64,
    pub kind: EventKind,
}

/// The change record fanned out to observer plugins.
#[derive(Debug, Clone)]
pub enum EventData {
    /// Structural event, no state change.
    Virtual,
    Single(ParticleEventData),
    Pair(PairEventData),
    /// Many-particle event (thermostat, cell rebuild).
    Multi(Vec<ParticleEventData>),
}

impl EventData {
    /// Ids whose state changed, in deterministic order.
    pub fn touched(&self) -> Vec<ParticleId> {
        match self {
            EventData::Virtual => Vec::new(),
            EventData::Single(d) => vec![d.id],
            EventData::Pair(d) => vec![d.p1.id, d.p2.id],
            EventData::Multi(ds) => ds.iter().map(|d| d.id).collect(),
        }
    }

    /// Total kinetic-energy change committed by the event.
    pub fn delta_ke(&self) -> f64 {
        match self {
            EventData::Virtual => 0.0,
            EventData::Single(d) => d.delta_ke,
            EventData::Pair(d) => d.delta_ke,
            EventData::Multi(ds) => ds.iter().map(|d| d.delta_ke).sum(),
        }
    }
}
