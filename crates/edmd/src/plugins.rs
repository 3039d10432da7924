//! Observer plugins.
//!
//! Plugins receive each committed event together with its change record and
//! a read-only view of the simulation. A plugin that fails is disabled for
//! the remainder of the run; physics never depends on observers.

use crate::{Result, SimError};
use edmd_core::{Event, EventData, EventKind, Particle, ParticleId};
use edmd_dynamics::Model;
use edmd_math::{Histogram, Vec3};
use std::collections::HashMap;

/// Read-only snapshot handed to observers.
pub struct SimView<'a> {
    pub model: &'a Model,
    pub particles: &'a [Particle],
    pub time: f64,
    pub event_count: u64,
}

impl SimView<'_> {
    /// Total kinetic energy at the view's time.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| {
                let v = self.model.liouvillean.velocity_at(p, self.time);
                0.5 * self.model.mass(p.id()) * v.norm_squared()
            })
            .sum()
    }

    /// Total linear momentum at the view's time.
    pub fn momentum(&self) -> Vec3 {
        self.particles
            .iter()
            .map(|p| self.model.liouvillean.velocity_at(p, self.time) * self.model.mass(p.id()))
            .sum()
    }
}

/// The observer interface: a single entry point per committed event.
pub trait OutputPlugin {
    fn name(&self) -> &str;

    /// Called once when the plugin is registered.
    fn initialise(&mut self, _view: &SimView) {}

    /// Called after every committed event, in execution order.
    fn event_update(&mut self, event: &Event, data: &EventData, view: &SimView) -> Result<()>;

    /// Human-readable summary for the end-of-run report.
    fn report(&self, view: &SimView) -> String;
}

/// Tracks current and time-averaged kinetic energy (and thus temperature).
#[derive(Debug, Default)]
pub struct KineticEnergy {
    initial: f64,
    current: f64,
    acc: f64,
    acc_sq: f64,
    last_time: f64,
    elapsed: f64,
}

impl KineticEnergy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time-averaged kinetic energy so far.
    pub fn mean(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.acc / self.elapsed
        } else {
            self.current
        }
    }

    /// Time-averaged kT from equipartition: 2 <KE> / (3 N).
    pub fn mean_kt(&self, n_particles: usize) -> f64 {
        if n_particles == 0 {
            return 0.0;
        }
        2.0 * self.mean() / (3.0 * n_particles as f64)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl OutputPlugin for KineticEnergy {
    fn name(&self) -> &str {
        "kenergy"
    }

    fn initialise(&mut self, view: &SimView) {
        self.initial = view.kinetic_energy();
        self.current = self.initial;
        self.last_time = view.time;
    }

    fn event_update(&mut self, _event: &Event, data: &EventData, view: &SimView) -> Result<()> {
        let dt = view.time - self.last_time;
        self.acc += self.current * dt;
        self.acc_sq += self.current * self.current * dt;
        self.elapsed += dt;
        self.last_time = view.time;
        self.current += data.delta_ke();
        Ok(())
    }

    fn report(&self, view: &SimView) -> String {
        format!(
            "KE initial {:.6e}, current {:.6e}, mean kT {:.6e}",
            self.initial,
            self.current,
            self.mean_kt(view.particles.len())
        )
    }
}

/// Histogram of free times between successive core collisions of each pair.
#[derive(Debug)]
pub struct CollisionCorrelator {
    hist: Histogram,
    last_collision: HashMap<(ParticleId, ParticleId), f64>,
}

impl CollisionCorrelator {
    pub fn new(bin_width: f64) -> Self {
        Self {
            hist: Histogram::new(bin_width),
            last_collision: HashMap::new(),
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.hist
    }
}

impl OutputPlugin for CollisionCorrelator {
    fn name(&self) -> &str {
        "collision_correlator"
    }

    fn event_update(&mut self, _event: &Event, data: &EventData, view: &SimView) -> Result<()> {
        let EventData::Pair(pair) = data else {
            return Ok(());
        };
        if pair.kind != EventKind::Core {
            return Ok(());
        }
        let key = if pair.p1.id < pair.p2.id {
            (pair.p1.id, pair.p2.id)
        } else {
            (pair.p2.id, pair.p1.id)
        };
        if let Some(prev) = self.last_collision.insert(key, view.time) {
            self.hist.add(view.time - prev);
        }
        Ok(())
    }

    fn report(&self, _view: &SimView) -> String {
        let mean: f64 = if self.hist.sample_count() > 0 {
            self.hist
                .iter()
                .map(|(x, n)| x * n as f64)
                .sum::<f64>()
                / self.hist.sample_count() as f64
        } else {
            0.0
        };
        format!(
            "pair free times: {} samples, mean {:.6e}",
            self.hist.sample_count(),
            mean
        )
    }
}

/// Watches total-momentum drift of the untouched-by-walls subsystem.
#[derive(Debug, Default)]
pub struct MomentumWatch {
    initial: Vec3,
    current: Vec3,
    max_drift: f64,
}

impl MomentumWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_drift(&self) -> f64 {
        self.max_drift
    }

    fn apply(&mut self, d: &edmd_core::ParticleEventData, view: &SimView) {
        self.current += d.delta_momentum(view.model.mass(d.id));
    }
}

impl OutputPlugin for MomentumWatch {
    fn name(&self) -> &str {
        "momentum"
    }

    fn initialise(&mut self, view: &SimView) {
        self.initial = view.momentum();
        self.current = self.initial;
    }

    fn event_update(&mut self, _event: &Event, data: &EventData, view: &SimView) -> Result<()> {
        match data {
            EventData::Virtual => return Ok(()),
            EventData::Single(d) => self.apply(d, view),
            EventData::Pair(d) => {
                self.apply(&d.p1, view);
                self.apply(&d.p2, view);
            }
            EventData::Multi(ds) => {
                for d in ds {
                    self.apply(d, view);
                }
            }
        }
        self.max_drift = self.max_drift.max((self.current - self.initial).norm());
        Ok(())
    }

    fn report(&self, _view: &SimView) -> String {
        format!("max momentum drift {:.6e}", self.max_drift)
    }
}

impl SimError {
    /// Failure constructor for observer implementations.
    pub fn plugin(name: &str, message: impl Into<String>) -> Self {
        SimError::Plugin(name.to_string(), message.into())
    }
}
