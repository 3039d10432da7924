//! Many-particle event generators.
//!
//! The cells global maintains a neighbour list over a periodic domain: it
//! fires a cell-crossing event whenever a particle leaves its cell and hands
//! the scheduler the candidate partners from the surrounding cells.

use crate::intersection::plane_root;
use crate::model::Context;
use crate::{DynamicsError, Result};
use edmd_core::{Event, EventData, EventKind, EventSource, Particle, ParticleId};
use edmd_math::Vec3;

/// A generator for events that touch the structure of the simulation rather
/// than a single pair.
#[derive(Debug, Clone)]
pub enum Global {
    Cells(CellGlobal),
}

impl Global {
    pub fn name(&self) -> &str {
        match self {
            Global::Cells(c) => &c.name,
        }
    }

    /// Build internal tables from the loaded particle states.
    pub fn initialise(&mut self, ctx: &Context, particles: &[Particle], t: f64) -> Result<()> {
        match self {
            Global::Cells(c) => c.initialise(ctx, particles, t),
        }
    }

    /// Next structural event for `p`, or the sentinel.
    pub fn get_event(&self, idx: usize, ctx: &Context, t: f64, p: &Particle) -> Event {
        match self {
            Global::Cells(c) => c.crossing_event(idx, ctx, t, p),
        }
    }

    /// Apply a structural event; re-registration happens implicitly when the
    /// scheduler recomputes the touched particle.
    pub fn run_event(
        &mut self,
        ctx: &Context,
        particles: &mut [Particle],
        event: &Event,
    ) -> Result<EventData> {
        match self {
            Global::Cells(c) => c.run_crossing(ctx, particles, event),
        }
    }
}

/// Cell neighbour list for a rectangular periodic domain.
#[derive(Debug, Clone)]
pub struct CellGlobal {
    pub name: String,
    /// Requested minimum cell width (at least the widest interaction range).
    pub width: f64,
    counts: [usize; 3],
    cell_dims: Vec3,
    domain: Vec3,
    cell_of: Vec<usize>,
    members: Vec<Vec<ParticleId>>,
}

impl CellGlobal {
    pub fn new(name: impl Into<String>, width: f64) -> Self {
        Self {
            name: name.into(),
            width,
            counts: [0; 3],
            cell_dims: Vec3::zeros(),
            domain: Vec3::zeros(),
            cell_of: Vec::new(),
            members: Vec::new(),
        }
    }

    fn initialise(&mut self, ctx: &Context, particles: &[Particle], t: f64) -> Result<()> {
        let dims = ctx.bc.dims().ok_or(DynamicsError::UnboundedCells)?;
        for k in 0..3 {
            let n = (dims[k] / self.width).floor() as usize;
            if n < 3 {
                return Err(DynamicsError::CellResolution {
                    width: self.width,
                    dim: dims[k],
                });
            }
            self.counts[k] = n;
            self.cell_dims[k] = dims[k] / n as f64;
        }
        self.domain = dims;
        self.members = vec![Vec::new(); self.counts.iter().product()];
        self.cell_of = vec![0; particles.len()];
        for p in particles {
            let pos = ctx.bc.wrapped(&ctx.liouvillean.position_at(p, t));
            let cell = self.cell_index(&self.cell_coords(&pos));
            self.cell_of[p.id() as usize] = cell;
            self.members[cell].push(p.id());
        }
        for cell in &mut self.members {
            cell.sort_unstable();
        }
        Ok(())
    }

    fn cell_coords(&self, pos: &Vec3) -> [usize; 3] {
        let mut coords = [0; 3];
        for k in 0..3 {
            let frac = (pos[k] + 0.5 * self.domain[k]) / self.cell_dims[k];
            coords[k] = (frac.floor() as isize).clamp(0, self.counts[k] as isize - 1) as usize;
        }
        coords
    }

    fn cell_index(&self, coords: &[usize; 3]) -> usize {
        coords[0] + self.counts[0] * (coords[1] + self.counts[1] * coords[2])
    }

    fn coords_of(&self, cell: usize) -> [usize; 3] {
        let i = cell % self.counts[0];
        let j = (cell / self.counts[0]) % self.counts[1];
        let k = cell / (self.counts[0] * self.counts[1]);
        [i, j, k]
    }

    /// Lower corner and edge lengths of the cell currently holding `id`.
    pub fn cell_box_of(&self, id: ParticleId) -> (Vec3, Vec3) {
        let coords = self.coords_of(self.cell_of[id as usize]);
        let mut origin = Vec3::zeros();
        for k in 0..3 {
            origin[k] = -0.5 * self.domain[k] + coords[k] as f64 * self.cell_dims[k];
        }
        (origin, self.cell_dims)
    }

    /// Candidate interaction partners of `id`: the members of its cell and
    /// the 26 surrounding cells, ascending, excluding `id` itself.
    pub fn neighbours(&self, id: ParticleId) -> Vec<ParticleId> {
        let home = self.coords_of(self.cell_of[id as usize]);
        let mut out = Vec::new();
        for dz in -1isize..=1 {
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let coords = [
                        wrap_coord(home[0], dx, self.counts[0]),
                        wrap_coord(home[1], dy, self.counts[1]),
                        wrap_coord(home[2], dz, self.counts[2]),
                    ];
                    for &other in &self.members[self.cell_index(&coords)] {
                        if other != id {
                            out.push(other);
                        }
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    fn crossing_event(&self, idx: usize, ctx: &Context, t: f64, p: &Particle) -> Event {
        let pos = ctx.bc.wrapped(&ctx.liouvillean.position_at(p, t));
        let vel = ctx.liouvillean.velocity_at(p, t);
        let g = ctx.liouvillean.accel();
        let coords = self.cell_coords(&pos);

        let mut best = f64::INFINITY;
        for k in 0..3 {
            let lo = -0.5 * self.domain[k] + coords[k] as f64 * self.cell_dims[k];
            let hi = lo + self.cell_dims[k];
            // Downward crossing of the lower face, upward crossing of the
            // upper face (plane_root wants the approach direction negative).
            if let Some(dt) = plane_root(pos[k] - lo, vel[k], g[k]) {
                best = best.min(dt);
            }
            if let Some(dt) = plane_root(hi - pos[k], -vel[k], -g[k]) {
                best = best.min(dt);
            }
        }

        if best.is_finite() {
            Event::new(t + best, EventKind::Cell, p.id(), None, EventSource::Global(idx))
        } else {
            Event::none(p.id(), EventSource::Global(idx))
        }
    }

    fn run_crossing(
        &mut self,
        ctx: &Context,
        particles: &mut [Particle],
        event: &Event,
    ) -> Result<EventData> {
        let id = event.primary;
        let p = particles
            .get_mut(id as usize)
            .ok_or(DynamicsError::MissingParticle(id))?;
        ctx.liouvillean.advance(ctx.bc, p, event.time);

        // Identify the crossed face from the synchronized position: the face
        // the particle sits on while moving outward. Robust against the
        // position landing an ulp on either side of the boundary.
        let old_cell = self.cell_of[id as usize];
        let coords = self.coords_of(old_cell);
        let mut best_axis = 0;
        let mut best_dir = 0isize;
        let mut best_gap = f64::INFINITY;
        for k in 0..3 {
            if p.vel[k] == 0.0 {
                continue;
            }
            let lo = -0.5 * self.domain[k] + coords[k] as f64 * self.cell_dims[k];
            let hi = lo + self.cell_dims[k];
            let (face, dir) = if p.vel[k] > 0.0 { (hi, 1) } else { (lo, -1) };
            // Distance to the face on the periodic circle; the advanced
            // position may already be folded to the opposite domain edge.
            let raw = (p.pos[k] - face).abs();
            let gap = raw.min(self.domain[k] - raw) / self.cell_dims[k];
            if gap < best_gap {
                best_gap = gap;
                best_axis = k;
                best_dir = dir;
            }
        }

        let mut new_coords = coords;
        new_coords[best_axis] =
            wrap_coord(coords[best_axis], best_dir, self.counts[best_axis]);
        let new_cell = self.cell_index(&new_coords);

        if new_cell != old_cell {
            if let Ok(slot) = self.members[old_cell].binary_search(&id) {
                self.members[old_cell].remove(slot);
            }
            if let Err(slot) = self.members[new_cell].binary_search(&id) {
                self.members[new_cell].insert(slot, id);
            }
            self.cell_of[id as usize] = new_cell;
        }

        Ok(EventData::Virtual)
    }
}

fn wrap_coord(base: usize, delta: isize, count: usize) -> usize {
    (base as isize + delta).rem_euclid(count as isize) as usize
}
