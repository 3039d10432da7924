//! Pair-potential event generators.
//!
//! Each variant carries its parameters inline; a single match on the
//! discriminator selects the analytic kernel. `get_event` is pure,
//! `run_event` applies the collision through the liouvillean.

use crate::model::Context;
use crate::{pair_mut, DynamicsError, Result};
use edmd_core::{Event, EventKind, EventSource, PairEventData, PairRange, Particle, PropertyRef};
use edmd_math::Mat3;

/// A pair interaction scoped by a 2-range.
#[derive(Debug, Clone)]
pub enum Interaction {
    /// Smooth hard spheres with restitution.
    HardSphere {
        name: String,
        range: PairRange,
        diameter: PropertyRef,
        elasticity: PropertyRef,
    },
    /// Hard core plus an attractive square well of width `lambda * d`.
    SquareWell {
        name: String,
        range: PairRange,
        diameter: PropertyRef,
        elasticity: PropertyRef,
        lambda: f64,
        well_depth: f64,
    },
    /// Axis-aligned parallel hard cubes (max-norm contact).
    ParallelCubes {
        name: String,
        range: PairRange,
        diameter: f64,
        elasticity: f64,
    },
    /// Parallel hard cubes in a fixed rotated frame.
    RotatedParallelCubes {
        name: String,
        range: PairRange,
        diameter: f64,
        elasticity: f64,
        rotation: Mat3,
    },
}

impl Interaction {
    pub fn name(&self) -> &str {
        match self {
            Interaction::HardSphere { name, .. }
            | Interaction::SquareWell { name, .. }
            | Interaction::ParallelCubes { name, .. }
            | Interaction::RotatedParallelCubes { name, .. } => name,
        }
    }

    pub fn range(&self) -> &PairRange {
        match self {
            Interaction::HardSphere { range, .. }
            | Interaction::SquareWell { range, .. }
            | Interaction::ParallelCubes { range, .. }
            | Interaction::RotatedParallelCubes { range, .. } => range,
        }
    }

    /// Mean contact diameter of a pair.
    fn pair_diameter(&self, ctx: &Context, a: u32, b: u32) -> f64 {
        match self {
            Interaction::HardSphere { diameter, .. } | Interaction::SquareWell { diameter, .. } => {
                0.5 * (diameter.value(ctx.properties, a) + diameter.value(ctx.properties, b))
            }
            Interaction::ParallelCubes { diameter, .. }
            | Interaction::RotatedParallelCubes { diameter, .. } => *diameter,
        }
    }

    fn pair_elasticity(&self, ctx: &Context, a: u32, b: u32) -> f64 {
        match self {
            Interaction::HardSphere { elasticity, .. }
            | Interaction::SquareWell { elasticity, .. } => {
                0.5 * (elasticity.value(ctx.properties, a) + elasticity.value(ctx.properties, b))
            }
            Interaction::ParallelCubes { elasticity, .. }
            | Interaction::RotatedParallelCubes { elasticity, .. } => *elasticity,
        }
    }

    /// Earliest future event this interaction produces for the pair, or the
    /// "no event" sentinel. Does not mutate particle state.
    pub fn get_event(
        &self,
        idx: usize,
        ctx: &Context,
        t: f64,
        p1: &Particle,
        p2: &Particle,
    ) -> Event {
        debug_assert_ne!(p1.id(), p2.id(), "pair events need distinct particles");
        let source = EventSource::Interaction(idx);
        let d = self.pair_diameter(ctx, p1.id(), p2.id());

        let (time, kind) = match self {
            Interaction::HardSphere { .. } => (
                ctx.liouvillean.sphere_sphere_in_root(ctx.bc, p1, p2, t, d),
                EventKind::Core,
            ),
            Interaction::SquareWell { lambda, .. } => {
                let rw = lambda * d;
                let pm = ctx.liouvillean.pair_motion(ctx.bc, p1, p2, t);
                let r2 = pm.rij.norm_squared();
                let inside = if (r2 - rw * rw).abs() < 1e-9 * rw * rw {
                    pm.rij.dot(&pm.vij) < 0.0
                } else {
                    r2 < rw * rw
                };
                if inside {
                    let t_core = ctx.liouvillean.sphere_sphere_in_root(ctx.bc, p1, p2, t, d);
                    let t_out = ctx.liouvillean.sphere_sphere_out_root(ctx.bc, p1, p2, t, rw);
                    if t_core <= t_out {
                        (t_core, EventKind::Core)
                    } else {
                        (t_out, EventKind::WellOut)
                    }
                } else {
                    (
                        ctx.liouvillean.sphere_sphere_in_root(ctx.bc, p1, p2, t, rw),
                        EventKind::WellIn,
                    )
                }
            }
            Interaction::ParallelCubes { .. } => {
                match ctx.liouvillean.cube_cube_in_root(ctx.bc, p1, p2, t, d, None) {
                    Some((tc, _)) => (tc, EventKind::Core),
                    None => (f64::INFINITY, EventKind::None),
                }
            }
            Interaction::RotatedParallelCubes { rotation, .. } => {
                match ctx
                    .liouvillean
                    .cube_cube_in_root(ctx.bc, p1, p2, t, d, Some(rotation))
                {
                    Some((tc, _)) => (tc, EventKind::Core),
                    None => (f64::INFINITY, EventKind::None),
                }
            }
        };

        if time.is_finite() {
            Event::new(time, kind, p1.id(), Some(p2.id()), source)
        } else {
            Event::none(p1.id(), source)
        }
    }

    /// Resolve a previously scheduled event, mutating the touched pair.
    pub fn run_event(
        &self,
        ctx: &Context,
        particles: &mut [Particle],
        event: &Event,
    ) -> Result<PairEventData> {
        let a = event.primary;
        let b = event
            .secondary
            .ok_or_else(|| DynamicsError::BadEvent("pair event without secondary".into()))?;
        if a == b {
            return Err(DynamicsError::SelfPair(a));
        }
        let (m1, m2) = (ctx.masses[a as usize], ctx.masses[b as usize]);
        let d = self.pair_diameter(ctx, a, b);
        let e = self.pair_elasticity(ctx, a, b);
        let (p1, p2) = pair_mut(particles, a as usize, b as usize);

        let data = match self {
            Interaction::HardSphere { .. } => ctx.liouvillean.smooth_spheres_coll(
                ctx.bc,
                p1,
                p2,
                m1,
                m2,
                event.time,
                e,
                d * d,
                EventKind::Core,
            ),
            Interaction::SquareWell { well_depth, .. } => match event.kind {
                EventKind::Core => ctx.liouvillean.smooth_spheres_coll(
                    ctx.bc,
                    p1,
                    p2,
                    m1,
                    m2,
                    event.time,
                    e,
                    d * d,
                    EventKind::Core,
                ),
                EventKind::WellIn => ctx.liouvillean.well_edge_coll(
                    ctx.bc, p1, p2, m1, m2, event.time, *well_depth, true,
                ),
                EventKind::WellOut => ctx.liouvillean.well_edge_coll(
                    ctx.bc, p1, p2, m1, m2, event.time, *well_depth, false,
                ),
                kind => {
                    return Err(DynamicsError::BadEvent(format!(
                        "square well cannot resolve {kind:?}"
                    )));
                }
            },
            Interaction::ParallelCubes { .. } => ctx
                .liouvillean
                .parallel_cube_coll(ctx.bc, p1, p2, m1, m2, event.time, e, None),
            Interaction::RotatedParallelCubes { rotation, .. } => ctx
                .liouvillean
                .parallel_cube_coll(ctx.bc, p1, p2, m1, m2, event.time, e, Some(rotation)),
        };
        Ok(data)
    }

    /// Upper bound on the interaction range, used to size neighbour cells.
    pub fn max_int_dist(&self, ctx: &Context) -> f64 {
        match self {
            Interaction::HardSphere { diameter, .. } => diameter.max_value(ctx.properties),
            Interaction::SquareWell {
                diameter, lambda, ..
            } => lambda * diameter.max_value(ctx.properties),
            Interaction::ParallelCubes { diameter, .. }
            | Interaction::RotatedParallelCubes { diameter, .. } => 3f64.sqrt() * diameter,
        }
    }

    /// Volume excluded to other particles by particle `id`.
    pub fn excluded_volume(&self, ctx: &Context, id: u32) -> f64 {
        match self {
            Interaction::HardSphere { diameter, .. } | Interaction::SquareWell { diameter, .. } => {
                let d = diameter.value(ctx.properties, id);
                d * d * d * std::f64::consts::PI / 6.0
            }
            Interaction::ParallelCubes { diameter, .. }
            | Interaction::RotatedParallelCubes { diameter, .. } => diameter.powi(3),
        }
    }

    /// Diagnostic: true (and logged) if the pair violates the hard-core
    /// non-overlap invariant at time `t`.
    pub fn check_overlaps(&self, ctx: &Context, t: f64, p1: &Particle, p2: &Particle) -> bool {
        let d = self.pair_diameter(ctx, p1.id(), p2.id());
        let pm = ctx.liouvillean.pair_motion(ctx.bc, p1, p2, t);
        let overlapped = match self {
            Interaction::HardSphere { .. } | Interaction::SquareWell { .. } => {
                pm.rij.norm_squared() < d * d * (1.0 - 1e-9)
            }
            Interaction::ParallelCubes { .. } => (0..3).all(|k| pm.rij[k].abs() < d * (1.0 - 1e-9)),
            Interaction::RotatedParallelCubes { rotation, .. } => {
                let r = rotation * pm.rij;
                (0..3).all(|k| r[k].abs() < d * (1.0 - 1e-9))
            }
        };
        if overlapped {
            tracing::warn!(
                interaction = self.name(),
                p1 = p1.id(),
                p2 = p2.id(),
                separation2 = pm.rij.norm_squared(),
                contact = d,
                "overlap detected in diagnostics"
            );
        }
        overlapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liouvillean::Liouvillean;
    use crate::model::Context;
    use approx::assert_relative_eq;
    use edmd_core::PropertyStore;
    use edmd_math::{rotation_z, BoundaryCondition, Vec3};

    fn ctx_parts() -> (BoundaryCondition, Liouvillean, PropertyStore, Vec<f64>) {
        (
            BoundaryCondition::None,
            Liouvillean::Newtonian,
            PropertyStore::new(),
            vec![1.0; 8],
        )
    }

    fn particle(id: u32, pos: [f64; 3], vel: [f64; 3]) -> Particle {
        Particle::new(id, Vec3::from(pos), Vec3::from(vel)).unwrap()
    }

    fn hard_sphere() -> Interaction {
        Interaction::HardSphere {
            name: "bulk".into(),
            range: PairRange::All,
            diameter: PropertyRef::Inline(1.0),
            elasticity: PropertyRef::Inline(1.0),
        }
    }

    #[test]
    fn hard_sphere_schedules_core_event() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let p1 = particle(0, [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let p2 = particle(1, [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let ev = hard_sphere().get_event(0, &ctx, 0.0, &p1, &p2);
        assert_eq!(ev.kind, EventKind::Core);
        assert_relative_eq!(ev.time, 0.5, epsilon = 1e-12);
        assert_eq!(ev.secondary, Some(1));
    }

    #[test]
    fn grazing_miss_gives_sentinel() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let p1 = particle(0, [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let p2 = particle(1, [1.0, 1.01, 0.0], [-1.0, 0.0, 0.0]);
        let ev = hard_sphere().get_event(0, &ctx, 0.0, &p1, &p2);
        assert!(ev.is_none());
    }

    #[test]
    fn run_event_exchanges_head_on_velocities() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let mut particles = vec![
            particle(0, [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            particle(1, [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]),
        ];
        let inter = hard_sphere();
        let ev = inter.get_event(0, &ctx, 0.0, &particles[0], &particles[1]);
        let data = inter.run_event(&ctx, &mut particles, &ev).unwrap();
        assert_relative_eq!(particles[0].vel, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(particles[1].vel, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(data.delta_ke, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn square_well_schedules_entry_from_outside() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let sw = Interaction::SquareWell {
            name: "sticky".into(),
            range: PairRange::All,
            diameter: PropertyRef::Inline(1.0),
            elasticity: PropertyRef::Inline(1.0),
            lambda: 1.5,
            well_depth: 0.2,
        };
        let p1 = particle(0, [-2.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let p2 = particle(1, [2.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let ev = sw.get_event(0, &ctx, 0.0, &p1, &p2);
        assert_eq!(ev.kind, EventKind::WellIn);
        // Gap 4 closes to the well edge 1.5 at relative speed 2.
        assert_relative_eq!(ev.time, 1.25, epsilon = 1e-12);
    }

    #[test]
    fn square_well_inside_picks_earlier_of_core_and_escape() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let sw = Interaction::SquareWell {
            name: "sticky".into(),
            range: PairRange::All,
            diameter: PropertyRef::Inline(1.0),
            elasticity: PropertyRef::Inline(1.0),
            lambda: 2.0,
            well_depth: 0.2,
        };
        // Inside the well, approaching: next event is the core collision.
        let p1 = particle(0, [-0.75, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let p2 = particle(1, [0.75, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let ev = sw.get_event(0, &ctx, 0.0, &p1, &p2);
        assert_eq!(ev.kind, EventKind::Core);
        assert_relative_eq!(ev.time, 0.25, epsilon = 1e-12);

        // Inside the well, receding: next event is the escape attempt.
        let p1 = particle(0, [-0.75, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let p2 = particle(1, [0.75, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let ev = sw.get_event(0, &ctx, 0.0, &p1, &p2);
        assert_eq!(ev.kind, EventKind::WellOut);
        assert_relative_eq!(ev.time, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn rotated_cubes_contact_in_the_rotated_frame() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let angle = 30f64.to_radians();
        let cubes = Interaction::RotatedParallelCubes {
            name: "cubes".into(),
            range: PairRange::All,
            diameter: 1.0,
            elasticity: 1.0,
            rotation: rotation_z(angle),
        };
        // Frame-axis separation 1.2 closing at the parallel velocity
        // component; contact when the frame-x gap reaches the side length.
        let p1 = particle(0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let sep = rotation_z(angle).transpose() * Vec3::new(1.2, 0.0, 0.0);
        let mut p2 = particle(1, [0.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        p2.pos = sep;
        p2.vel = rotation_z(angle).transpose() * Vec3::new(-1.0, 0.0, 0.0);
        let ev = cubes.get_event(0, &ctx, 0.0, &p1, &p2);
        assert_eq!(ev.kind, EventKind::Core);
        assert_relative_eq!(ev.time, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn max_int_dist_bounds_each_geometry() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        assert_relative_eq!(hard_sphere().max_int_dist(&ctx), 1.0);
        let cubes = Interaction::ParallelCubes {
            name: "cubes".into(),
            range: PairRange::All,
            diameter: 2.0,
            elasticity: 1.0,
        };
        assert_relative_eq!(cubes.max_int_dist(&ctx), 2.0 * 3f64.sqrt());
    }

    #[test]
    fn self_pair_event_is_rejected() {
        let (bc, liou, props, masses) = ctx_parts();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let mut particles = vec![particle(0, [0.0; 3], [0.0; 3])];
        let ev = Event::new(1.0, EventKind::Core, 0, Some(0), EventSource::Interaction(0));
        assert!(matches!(
            hard_sphere().run_event(&ctx, &mut particles, &ev),
            Err(DynamicsError::SelfPair(0))
        ));
    }
}
