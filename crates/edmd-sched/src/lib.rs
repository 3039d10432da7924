//! The pending-event queue.
//!
//! Every state change pushes fresh candidate events for the touched
//! particles; entries are stamped with the participants' event counters and
//! stale entries are discarded silently at pop time. Equal-time entries pop
//! in a fixed secondary order so runs are reproducible.

use edmd_core::{Event, Particle, ParticleId};
use edmd_dynamics::{Global, Model};
use ordered_float::NotNan;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A heap entry: an event plus the freshness stamps taken when it was
/// computed.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    time: NotNan<f64>,
    event: Event,
    stamp1: u64,
    stamp2: Option<u64>,
}

impl QueuedEvent {
    pub fn event(&self) -> &Event {
        &self.event
    }

    fn key(&self) -> (NotNan<f64>, (ParticleId, (u8, usize), edmd_core::EventKind, ParticleId)) {
        (self.time, self.event.tie_break())
    }

    /// Fresh iff no participant has committed an event since computation.
    fn is_fresh(&self, particles: &[Particle]) -> bool {
        let p1 = match particles.get(self.event.primary as usize) {
            Some(p) => p,
            None => return false,
        };
        if p1.event_count != self.stamp1 {
            return false;
        }
        match (self.event.secondary, self.stamp2) {
            (Some(id), Some(stamp)) => particles
                .get(id as usize)
                .is_some_and(|p| p.event_count == stamp),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority queue of pending events keyed on time, with lazy invalidation.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<QueuedEvent>>,
    stale_discards: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries discarded as stale so far.
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }

    /// Pending entry count (stale entries included).
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop everything and recompute candidates for every particle. The
    /// queue is derived state and can be rebuilt at any time.
    pub fn rebuild(&mut self, model: &Model, globals: &[Global], particles: &[Particle], t: f64) {
        self.heap.clear();
        for p in particles {
            self.schedule_particle(model, globals, particles, t, p.id());
        }
    }

    /// Insert an externally produced event, stamping it now.
    pub fn push(&mut self, event: Event, particles: &[Particle]) {
        if event.is_none() {
            return;
        }
        let time = match NotNan::new(event.time) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(?event, "dropping event with NaN time");
                return;
            }
        };
        let stamp1 = match particles.get(event.primary as usize) {
            Some(p) => p.event_count,
            None => return,
        };
        let stamp2 = event
            .secondary
            .and_then(|id| particles.get(id as usize).map(|p| p.event_count));
        self.heap.push(Reverse(QueuedEvent {
            time,
            event,
            stamp1,
            stamp2,
        }));
    }

    /// Compute and enqueue every candidate event for one particle:
    /// interactions against its eligible partners, in-range locals, and the
    /// structural events of each global.
    pub fn schedule_particle(
        &mut self,
        model: &Model,
        globals: &[Global],
        particles: &[Particle],
        t: f64,
        id: ParticleId,
    ) {
        let ctx = model.ctx();
        let p = &particles[id as usize];
        let cells = globals.iter().find_map(|g| match g {
            Global::Cells(c) => Some(c),
        });

        match cells {
            Some(c) => {
                for j in c.neighbours(id) {
                    if let Some((idx, inter)) = model.interaction_for(id, j) {
                        let ev = inter.get_event(idx, &ctx, t, p, &particles[j as usize]);
                        self.push(ev, particles);
                    }
                }
            }
            None => {
                for other in particles {
                    if other.id() == id {
                        continue;
                    }
                    if let Some((idx, inter)) = model.interaction_for(id, other.id()) {
                        let ev = inter.get_event(idx, &ctx, t, p, other);
                        self.push(ev, particles);
                    }
                }
            }
        }

        let cell_box = cells.map(|c| c.cell_box_of(id));
        for (idx, local) in model.locals.iter().enumerate() {
            if !local.range().contains(id) {
                continue;
            }
            if let Some((origin, dims)) = &cell_box {
                if !local.is_in_cell(origin, dims) {
                    continue;
                }
            }
            self.push(local.get_event(idx, &ctx, t, p), particles);
        }

        for (gidx, global) in globals.iter().enumerate() {
            self.push(global.get_event(gidx, &ctx, t, p), particles);
        }
    }

    /// Bump the freshness stamps of the touched particles and recompute
    /// their candidate events. Called by the driver after each committed
    /// event.
    pub fn full_update(
        &mut self,
        model: &Model,
        globals: &[Global],
        particles: &mut [Particle],
        t: f64,
        ids: &[ParticleId],
    ) {
        for &id in ids {
            particles[id as usize].bump_event_count();
        }
        let particles: &[Particle] = particles;
        for &id in ids {
            self.schedule_particle(model, globals, particles, t, id);
        }
    }

    /// Remove and return the earliest fresh entry. Stale entries are
    /// silently discarded; their replacements were already enqueued by the
    /// `full_update` that invalidated them.
    pub fn pop_next(&mut self, particles: &[Particle]) -> Option<QueuedEvent> {
        while let Some(Reverse(qe)) = self.heap.pop() {
            if qe.is_fresh(particles) {
                return Some(qe);
            }
            self.stale_discards += 1;
        }
        None
    }

    /// Return an entry taken with `pop_next` but not consumed.
    pub fn requeue(&mut self, qe: QueuedEvent) {
        self.heap.push(Reverse(qe));
    }
}
