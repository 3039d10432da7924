//! The event loop.

use crate::plugins::{OutputPlugin, SimView};
use crate::Result;
use edmd_config::{write_config, LoadedSim, Units};
use edmd_core::{Event, EventData, EventKind, EventSource, Particle, ParticleId, NO_PARTICLE};
use edmd_dynamics::{Global, Model, System};
use edmd_sched::Scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Relative slack allowed before an event is treated as acausal.
const EPS_CAUSALITY: f64 = 1e-9;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured event budget was spent.
    EventBudget,
    /// The configured simulation-time bound was reached.
    SimTimeBudget,
    /// A halt system event fired.
    Halted,
    /// The shared stop flag was set.
    StopFlag,
    /// No pending events remain anywhere.
    ExhaustedQueue,
}

/// Per-category non-fatal counters, reported at shutdown.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub overlaps: u64,
    pub acausal_discards: u64,
    pub disabled_plugins: u64,
}

struct PluginSlot {
    plugin: Box<dyn OutputPlugin>,
    enabled: bool,
}

/// The simulation driver: owns the particle store, the generators, the
/// scheduler, and the observer plugins, and runs the serial event loop.
pub struct Simulation {
    pub model: Model,
    pub globals: Vec<Global>,
    pub systems: Vec<System>,
    pub particles: Vec<Particle>,
    pub units: Units,
    scheduler: Scheduler,
    plugins: Vec<PluginSlot>,
    stop: Arc<AtomicBool>,
    time: f64,
    event_count: u64,
    diagnostics: Diagnostics,
}

impl Simulation {
    /// Build a simulation from a loaded configuration: initialise the
    /// globals and derive the initial event queue.
    pub fn new(loaded: LoadedSim) -> Result<Self> {
        let LoadedSim {
            model,
            mut globals,
            systems,
            particles,
            units,
        } = loaded;

        let max_range = model.max_int_dist();
        let ctx = model.ctx();
        for global in &mut globals {
            if let Global::Cells(cells) = global {
                cells.width = cells.width.max(max_range);
            }
            global.initialise(&ctx, &particles, 0.0)?;
        }

        let mut scheduler = Scheduler::new();
        scheduler.rebuild(&model, &globals, &particles, 0.0);

        Ok(Self {
            model,
            globals,
            systems,
            particles,
            units,
            scheduler,
            plugins: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            time: 0.0,
            event_count: 0,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Register an observer plugin.
    pub fn add_plugin(&mut self, mut plugin: Box<dyn OutputPlugin>) {
        plugin.initialise(&self.view());
        self.plugins.push(PluginSlot {
            plugin,
            enabled: true,
        });
    }

    /// Shared flag polled between events; setting it stops the run cleanly.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stale_discards(&self) -> u64 {
        self.scheduler.stale_discards()
    }

    fn view(&self) -> SimView<'_> {
        SimView {
            model: &self.model,
            particles: &self.particles,
            time: self.time,
            event_count: self.event_count,
        }
    }

    /// Total kinetic energy at the current global clock.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| {
                let v = self.model.liouvillean.velocity_at(p, self.time);
                0.5 * self.model.mass(p.id()) * v.norm_squared()
            })
            .sum()
    }

    /// Total linear momentum at the current global clock.
    pub fn momentum(&self) -> edmd_math::Vec3 {
        self.particles
            .iter()
            .map(|p| self.model.liouvillean.velocity_at(p, self.time) * self.model.mass(p.id()))
            .sum()
    }

    /// Stream every particle to the current global clock.
    pub fn synchronize(&mut self) {
        for p in &mut self.particles {
            self.model
                .liouvillean
                .advance(&self.model.bc, p, self.time);
        }
    }

    /// Emit a round-trippable configuration snapshot of the current state.
    pub fn snapshot(&mut self) -> Result<String> {
        self.synchronize();
        Ok(write_config(
            &self.model,
            &self.globals,
            &self.systems,
            &self.particles,
            &self.units,
        )?)
    }

    /// Run the event loop until a budget, a halt event, or the stop flag
    /// ends it.
    pub fn run(&mut self, max_events: Option<u64>, max_time: Option<f64>) -> Result<StopReason> {
        let events_at_start = self.event_count;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(self.finish(StopReason::StopFlag));
            }
            if let Some(budget) = max_events {
                if self.event_count - events_at_start >= budget {
                    return Ok(self.finish(StopReason::EventBudget));
                }
            }

            let queued = self.scheduler.pop_next(&self.particles);
            let next_system = self
                .systems
                .iter()
                .enumerate()
                .map(|(i, s)| (i, s.next_event_time()))
                .filter(|(_, t)| t.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            // Particle events win ties: system sources rank last.
            let event = match (queued, next_system) {
                (None, None) => return Ok(self.finish(StopReason::ExhaustedQueue)),
                (Some(q), Some((idx, ts))) if ts < q.event().time => {
                    self.scheduler.requeue(q);
                    self.systems[idx].get_event(idx)
                }
                (None, Some((idx, _))) => self.systems[idx].get_event(idx),
                (Some(q), _) => *q.event(),
            };

            if let Some(bound) = max_time {
                if event.time > bound {
                    if !matches!(event.source, EventSource::System(_)) {
                        // Push the particle event back for a later run call.
                        self.scheduler.push(event, &self.particles);
                    }
                    self.time = bound;
                    return Ok(self.finish(StopReason::SimTimeBudget));
                }
            }

            if event.time < self.time - EPS_CAUSALITY * self.time.abs().max(1.0) {
                tracing::warn!(
                    event_time = event.time,
                    clock = self.time,
                    "discarding acausal event"
                );
                self.diagnostics.acausal_discards += 1;
                debug_assert!(false, "acausal event popped from the scheduler");
                continue;
            }

            self.time = self.time.max(event.time);
            let data = self.dispatch(&event)?;
            self.event_count += 1;

            self.fan_out(&event, &data);

            let mut touched: Vec<ParticleId> = event
                .touched()
                .filter(|&id| id != NO_PARTICLE)
                .collect();
            for id in data.touched() {
                if !touched.contains(&id) {
                    touched.push(id);
                }
            }
            self.scheduler.full_update(
                &self.model,
                &self.globals,
                &mut self.particles,
                self.time,
                &touched,
            );

            if event.kind == EventKind::Halt {
                return Ok(self.finish(StopReason::Halted));
            }
        }
    }

    fn dispatch(&mut self, event: &Event) -> Result<EventData> {
        let ctx = self.model.ctx();
        match event.source {
            EventSource::Interaction(i) => {
                let interaction = &self.model.interactions[i];
                if let Some(b) = event.secondary {
                    let (pa, pb) = (
                        &self.particles[event.primary as usize],
                        &self.particles[b as usize],
                    );
                    if interaction.check_overlaps(&ctx, self.time, pa, pb) {
                        self.diagnostics.overlaps += 1;
                    }
                }
                let data = interaction.run_event(&ctx, &mut self.particles, event)?;
                Ok(EventData::Pair(data))
            }
            EventSource::Local(i) => {
                let data = self.model.locals[i].run_event(&ctx, &mut self.particles, event)?;
                Ok(EventData::Single(data))
            }
            EventSource::Global(i) => {
                Ok(self.globals[i].run_event(&ctx, &mut self.particles, event)?)
            }
            EventSource::System(i) => {
                Ok(self.systems[i].run_event(&ctx, &mut self.particles, event.time)?)
            }
        }
    }

    fn fan_out(&mut self, event: &Event, data: &EventData) {
        let view = SimView {
            model: &self.model,
            particles: &self.particles,
            time: self.time,
            event_count: self.event_count,
        };
        for slot in &mut self.plugins {
            if !slot.enabled {
                continue;
            }
            if let Err(err) = slot.plugin.event_update(event, data, &view) {
                tracing::warn!(
                    plugin = slot.plugin.name(),
                    %err,
                    "observer failed and is disabled for the rest of the run"
                );
                slot.enabled = false;
                self.diagnostics.disabled_plugins += 1;
            }
        }
    }

    fn finish(&self, reason: StopReason) -> StopReason {
        tracing::info!(
            ?reason,
            events = self.event_count,
            time = self.time,
            stale_discards = self.scheduler.stale_discards(),
            overlaps = self.diagnostics.overlaps,
            acausal_discards = self.diagnostics.acausal_discards,
            disabled_plugins = self.diagnostics.disabled_plugins,
            "run finished"
        );
        reason
    }

    /// Reports from every registered plugin, in registration order.
    pub fn plugin_reports(&self) -> Vec<(String, String)> {
        self.plugins
            .iter()
            .map(|slot| {
                (
                    slot.plugin.name().to_string(),
                    slot.plugin.report(&self.view()),
                )
            })
            .collect()
    }
}
