//! Scheduled system events: periodic thermostats and the halt event.

use crate::model::Context;
use crate::Result;
use edmd_core::{Event, EventData, EventKind, EventSource, Particle, ParticleEventData, NO_PARTICLE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// An event source that fires on its own schedule and may touch many
/// particles at once. Re-registers itself after each firing.
#[derive(Debug)]
pub enum System {
    Andersen(AndersenThermostat),
    Halt(Halt),
}

impl System {
    pub fn name(&self) -> &str {
        match self {
            System::Andersen(a) => &a.name,
            System::Halt(h) => &h.name,
        }
    }

    /// Absolute time of the next firing, `+inf` when exhausted.
    pub fn next_event_time(&self) -> f64 {
        match self {
            System::Andersen(a) => a.next_t,
            System::Halt(h) => {
                if h.fired {
                    f64::INFINITY
                } else {
                    h.time
                }
            }
        }
    }

    pub fn get_event(&self, idx: usize) -> Event {
        let kind = match self {
            System::Andersen(_) => EventKind::Thermostat,
            System::Halt(_) => EventKind::Halt,
        };
        let time = self.next_event_time();
        if time.is_finite() {
            Event::new(time, kind, NO_PARTICLE, None, EventSource::System(idx))
        } else {
            Event::none(NO_PARTICLE, EventSource::System(idx))
        }
    }

    /// Replace the stochastic stream, for seed overrides after loading.
    pub fn reseed(&mut self, seed: u64) {
        if let System::Andersen(a) = self {
            a.rng = StdRng::seed_from_u64(seed);
        }
    }

    /// Fire the system event and reschedule the next occurrence.
    pub fn run_event(
        &mut self,
        ctx: &Context,
        particles: &mut [Particle],
        t: f64,
    ) -> Result<EventData> {
        match self {
            System::Andersen(a) => Ok(a.resample(ctx, particles, t)),
            System::Halt(h) => {
                h.fired = true;
                Ok(EventData::Virtual)
            }
        }
    }
}

/// Andersen-style thermostat: every `period`, each particle is re-drawn from
/// the Maxwell-Boltzmann distribution at `temperature` with probability
/// `fraction`, using the run's seeded stream for reproducibility.
#[derive(Debug)]
pub struct AndersenThermostat {
    pub name: String,
    pub period: f64,
    pub temperature: f64,
    pub fraction: f64,
    next_t: f64,
    rng: StdRng,
}

impl AndersenThermostat {
    pub fn new(
        name: impl Into<String>,
        period: f64,
        temperature: f64,
        fraction: f64,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            temperature,
            fraction,
            next_t: period,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn resample(&mut self, ctx: &Context, particles: &mut [Particle], t: f64) -> EventData {
        let mut changes = Vec::new();
        for p in particles.iter_mut() {
            if self.rng.gen::<f64>() >= self.fraction {
                continue;
            }
            ctx.liouvillean.advance(ctx.bc, p, t);
            let m = ctx.masses[p.id() as usize];
            let sigma = (self.temperature / m).sqrt();
            let old = p.vel;
            for k in 0..3 {
                let z: f64 = self.rng.sample(StandardNormal);
                p.vel[k] = sigma * z;
            }
            changes.push(ParticleEventData {
                id: p.id(),
                old_vel: old,
                new_vel: p.vel,
                delta_ke: 0.5 * m * (p.vel.norm_squared() - old.norm_squared()),
                kind: EventKind::Thermostat,
            });
        }
        self.next_t += self.period;
        EventData::Multi(changes)
    }
}

/// Stops the run at a fixed simulation time.
#[derive(Debug)]
pub struct Halt {
    pub name: String,
    pub time: f64,
    fired: bool,
}

impl Halt {
    pub fn new(name: impl Into<String>, time: f64) -> Self {
        Self {
            name: name.into(),
            time,
            fired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liouvillean::Liouvillean;
    use edmd_core::PropertyStore;
    use edmd_math::{BoundaryCondition, Vec3};

    fn fixture() -> (BoundaryCondition, Liouvillean, PropertyStore, Vec<f64>) {
        (
            BoundaryCondition::None,
            Liouvillean::Newtonian,
            PropertyStore::new(),
            vec![1.0; 16],
        )
    }

    fn particles(n: u32) -> Vec<Particle> {
        (0..n)
            .map(|id| {
                Particle::new(id, Vec3::new(id as f64, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)).unwrap()
            })
            .collect()
    }

    #[test]
    fn halt_fires_once() {
        let (bc, liou, props, masses) = fixture();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let mut sys = System::Halt(Halt::new("halt", 5.0));
        assert_eq!(sys.next_event_time(), 5.0);
        assert_eq!(sys.get_event(0).kind, EventKind::Halt);
        let mut ps = particles(1);
        sys.run_event(&ctx, &mut ps, 5.0).unwrap();
        assert!(sys.next_event_time().is_infinite());
        assert!(sys.get_event(0).is_none());
    }

    #[test]
    fn thermostat_reschedules_and_touches_a_fraction() {
        let (bc, liou, props, masses) = fixture();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let mut sys = System::Andersen(AndersenThermostat::new("anderson", 1.0, 1.0, 0.5, 42));
        let mut ps = particles(16);
        let t = sys.next_event_time();
        let data = sys.run_event(&ctx, &mut ps, t).unwrap();
        let touched = data.touched();
        assert!(!touched.is_empty() && touched.len() < 16);
        assert_eq!(sys.next_event_time(), 2.0);
        // Touched particles were synchronized to the firing time.
        for &id in &touched {
            assert_eq!(ps[id as usize].clock, t);
        }
    }

    #[test]
    fn identical_seeds_resample_identically() {
        let (bc, liou, props, masses) = fixture();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let run = |seed: u64| {
            let mut sys = System::Andersen(AndersenThermostat::new("t", 1.0, 1.5, 0.7, seed));
            let mut ps = particles(8);
            sys.run_event(&ctx, &mut ps, 1.0).unwrap();
            ps.iter().map(|p| p.vel).collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
    }
}
