//! Immobile-obstacle event generators: walls, cylinders, and the
//! oscillating plate.

use crate::liouvillean::PlateState;
use crate::model::Context;
use crate::{DynamicsError, Result};
use edmd_core::{Event, EventKind, EventSource, Particle, ParticleEventData, Range};
use edmd_math::Vec3;

/// A per-particle obstacle fixed in space, scoped by a 1-range.
#[derive(Debug, Clone)]
pub enum Local {
    /// Infinite plane through `origin` with unit `normal`.
    PlaneWall {
        name: String,
        range: Range,
        elasticity: f64,
        origin: Vec3,
        normal: Vec3,
    },
    /// Slab of half-thickness `sigma`, reflecting from both faces.
    DoubleWall {
        name: String,
        range: Range,
        elasticity: f64,
        origin: Vec3,
        normal: Vec3,
        sigma: f64,
    },
    /// Infinite cylinder wall about `axis` through `origin`.
    CylinderWall {
        name: String,
        range: Range,
        elasticity: f64,
        origin: Vec3,
        axis: Vec3,
        radius: f64,
    },
    /// Oscillating plate slab.
    OscillatingPlate {
        name: String,
        range: Range,
        elasticity: f64,
        plate: PlateState,
    },
}

impl Local {
    pub fn name(&self) -> &str {
        match self {
            Local::PlaneWall { name, .. }
            | Local::DoubleWall { name, .. }
            | Local::CylinderWall { name, .. }
            | Local::OscillatingPlate { name, .. } => name,
        }
    }

    pub fn range(&self) -> &Range {
        match self {
            Local::PlaneWall { range, .. }
            | Local::DoubleWall { range, .. }
            | Local::CylinderWall { range, .. }
            | Local::OscillatingPlate { range, .. } => range,
        }
    }

    /// Earliest future collision of `p` with this obstacle, or the sentinel.
    pub fn get_event(&self, idx: usize, ctx: &Context, t: f64, p: &Particle) -> Event {
        let source = EventSource::Local(idx);
        let time = match self {
            Local::PlaneWall { origin, normal, .. } => {
                ctx.liouvillean.plane_wall_collision(p, t, origin, normal)
            }
            Local::DoubleWall {
                origin,
                normal,
                sigma,
                ..
            } => ctx
                .liouvillean
                .slab_wall_collision(p, t, origin, normal, *sigma),
            Local::CylinderWall {
                origin,
                axis,
                radius,
                ..
            } => ctx
                .liouvillean
                .cylinder_wall_collision(p, t, origin, axis, *radius),
            Local::OscillatingPlate { plate, .. } => {
                ctx.liouvillean.oscillating_plate_collision(p, t, plate)
            }
        };
        if time.is_finite() {
            Event::new(time, EventKind::Wall, p.id(), None, source)
        } else {
            Event::none(p.id(), source)
        }
    }

    /// Resolve a previously scheduled wall event for its particle.
    pub fn run_event(
        &self,
        ctx: &Context,
        particles: &mut [Particle],
        event: &Event,
    ) -> Result<ParticleEventData> {
        let idx = event.primary as usize;
        let p = particles
            .get_mut(idx)
            .ok_or(DynamicsError::MissingParticle(event.primary))?;
        let m = ctx.masses[idx];
        let data = match self {
            Local::PlaneWall {
                elasticity, normal, ..
            }
            | Local::DoubleWall {
                elasticity, normal, ..
            } => ctx
                .liouvillean
                .run_plane_wall(ctx.bc, p, m, event.time, *elasticity, normal),
            Local::CylinderWall {
                elasticity,
                origin,
                axis,
                ..
            } => ctx
                .liouvillean
                .run_cylinder_wall(ctx.bc, p, m, event.time, *elasticity, origin, axis),
            Local::OscillatingPlate {
                elasticity, plate, ..
            } => ctx
                .liouvillean
                .run_oscillating_plate(ctx.bc, p, m, event.time, *elasticity, plate),
        };
        Ok(data)
    }

    /// Conservative test for pruning this obstacle from cells it cannot
    /// intersect. Curved and moving obstacles always report true.
    pub fn is_in_cell(&self, origin: &Vec3, dims: &Vec3) -> bool {
        match self {
            Local::PlaneWall {
                origin: wall_origin,
                normal,
                ..
            } => cube_plane_overlap(origin, dims, wall_origin, normal, 0.0),
            Local::DoubleWall {
                origin: wall_origin,
                normal,
                sigma,
                ..
            } => cube_plane_overlap(origin, dims, wall_origin, normal, *sigma),
            Local::CylinderWall { .. } => true,
            Local::OscillatingPlate { .. } => true,
        }
    }
}

/// Does the axis-aligned cube at `origin` with edge lengths `dims` touch the
/// slab of half-thickness `sigma` around the plane?
fn cube_plane_overlap(
    origin: &Vec3,
    dims: &Vec3,
    plane_origin: &Vec3,
    normal: &Vec3,
    sigma: f64,
) -> bool {
    let mut min_d = f64::INFINITY;
    let mut max_d = f64::NEG_INFINITY;
    for corner in 0..8 {
        let mut r = *origin - plane_origin;
        for k in 0..3 {
            if corner & (1 << k) != 0 {
                r[k] += dims[k];
            }
        }
        let d = r.dot(normal);
        min_d = min_d.min(d);
        max_d = max_d.max(d);
    }
    min_d <= sigma && max_d >= -sigma
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liouvillean::Liouvillean;
    use approx::assert_relative_eq;
    use edmd_core::PropertyStore;
    use edmd_math::BoundaryCondition;

    fn fixture() -> (BoundaryCondition, Liouvillean, PropertyStore, Vec<f64>) {
        (
            BoundaryCondition::None,
            Liouvillean::Newtonian,
            PropertyStore::new(),
            vec![1.0; 4],
        )
    }

    fn particle(id: u32, pos: [f64; 3], vel: [f64; 3]) -> Particle {
        Particle::new(id, Vec3::from(pos), Vec3::from(vel)).unwrap()
    }

    #[test]
    fn plane_wall_event_and_reflection() {
        let (bc, liou, props, masses) = fixture();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let wall = Local::PlaneWall {
            name: "ground".into(),
            range: Range::All,
            elasticity: 1.0,
            origin: Vec3::zeros(),
            normal: Vec3::new(0.0, 1.0, 0.0),
        };
        let mut particles = vec![particle(0, [0.0, 2.0, 0.0], [0.3, -1.0, 0.0])];
        let ev = wall.get_event(0, &ctx, 0.0, &particles[0]);
        assert_eq!(ev.kind, EventKind::Wall);
        assert_relative_eq!(ev.time, 2.0, epsilon = 1e-12);

        let data = wall.run_event(&ctx, &mut particles, &ev).unwrap();
        assert_relative_eq!(particles[0].vel, Vec3::new(0.3, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(data.delta_ke, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn double_wall_reflects_from_both_faces() {
        let (bc, liou, props, masses) = fixture();
        let ctx = Context {
            bc: &bc,
            liouvillean: &liou,
            properties: &props,
            masses: &masses,
        };
        let wall = Local::DoubleWall {
            name: "slab".into(),
            range: Range::All,
            elasticity: 1.0,
            origin: Vec3::zeros(),
            normal: Vec3::new(1.0, 0.0, 0.0),
            sigma: 0.5,
        };
        // From the +x side, contact at x = +0.5.
        let p = particle(0, [2.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let ev = wall.get_event(0, &ctx, 0.0, &p);
        assert_relative_eq!(ev.time, 1.5, epsilon = 1e-12);
        // From the -x side, contact at x = -0.5.
        let p = particle(0, [-2.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let ev = wall.get_event(0, &ctx, 0.0, &p);
        assert_relative_eq!(ev.time, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn cylinder_is_always_in_cell() {
        let cyl = Local::CylinderWall {
            name: "pipe".into(),
            range: Range::All,
            elasticity: 1.0,
            origin: Vec3::new(100.0, 100.0, 0.0),
            axis: Vec3::new(0.0, 0.0, 1.0),
            radius: 1.0,
        };
        // Conservative over-approximation regardless of geometry.
        assert!(cyl.is_in_cell(&Vec3::zeros(), &Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn plane_prunes_far_cells() {
        let wall = Local::PlaneWall {
            name: "ground".into(),
            range: Range::All,
            elasticity: 1.0,
            origin: Vec3::zeros(),
            normal: Vec3::new(0.0, 1.0, 0.0),
        };
        assert!(wall.is_in_cell(&Vec3::new(0.0, -0.5, 0.0), &Vec3::new(1.0, 1.0, 1.0)));
        assert!(!wall.is_in_cell(&Vec3::new(0.0, 3.0, 0.0), &Vec3::new(1.0, 1.0, 1.0)));
        assert!(!wall.is_in_cell(&Vec3::new(0.0, -9.0, 0.0), &Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn range_scopes_the_obstacle() {
        let wall = Local::PlaneWall {
            name: "ground".into(),
            range: Range::Single(2),
            elasticity: 1.0,
            origin: Vec3::zeros(),
            normal: Vec3::new(0.0, 1.0, 0.0),
        };
        assert!(wall.range().contains(2));
        assert!(!wall.range().contains(3));
    }
}
