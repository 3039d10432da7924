//! The physics kernel: analytic free flight, collision-time predicates in
//! the pair frame, and momentum-exchange resolvers.
//!
//! One liouvillean is active per simulation. All pair predicates first fold
//! the separation through the boundary condition, then work on relative
//! coordinates; gravity cancels in the pair frame, so pair roots stay
//! quadratic for every supported free-flight law.

use crate::intersection::{
    cube_in_root, next_event, plane_root, sphere_in_root, sphere_out_root, OffcentreSpheres,
    OverlapFunction, EPS_BACK,
};
use edmd_core::{EventKind, PairEventData, Particle, ParticleEventData};
use edmd_math::{BoundaryCondition, Mat3, Vec3};

/// The active free-flight law.
#[derive(Debug, Clone, PartialEq)]
pub enum Liouvillean {
    /// Straight-line ballistic flight.
    Newtonian,
    /// Ballistic flight under a uniform acceleration field.
    Gravity(Vec3),
}

/// Relative coordinates of a synchronized pair.
#[derive(Debug, Clone, Copy)]
pub struct PairMotion {
    /// Minimum-image separation, from p2 to p1.
    pub rij: Vec3,
    /// Relative velocity of p1 with respect to p2.
    pub vij: Vec3,
}

impl Liouvillean {
    /// The uniform acceleration of the free-flight law.
    #[inline]
    pub fn accel(&self) -> Vec3 {
        match self {
            Liouvillean::Newtonian => Vec3::zeros(),
            Liouvillean::Gravity(g) => *g,
        }
    }

    /// Position of `p` extrapolated along its trajectory to absolute time `t`.
    #[inline]
    pub fn position_at(&self, p: &Particle, t: f64) -> Vec3 {
        let dt = t - p.clock;
        p.pos + p.vel * dt + self.accel() * (0.5 * dt * dt)
    }

    /// Velocity of `p` extrapolated to absolute time `t`.
    #[inline]
    pub fn velocity_at(&self, p: &Particle, t: f64) -> Vec3 {
        p.vel + self.accel() * (t - p.clock)
    }

    /// True iff `p` is synchronized at time `t`.
    #[inline]
    pub fn is_up_to_date(&self, p: &Particle, t: f64) -> bool {
        (p.clock - t).abs() <= EPS_BACK * t.abs().max(1.0)
    }

    /// Stream `p` to absolute time `t`, bumping its local clock.
    ///
    /// Positions are folded back into the primary image on periodic domains.
    pub fn advance(&self, bc: &BoundaryCondition, p: &mut Particle, t: f64) {
        let dt = t - p.clock;
        p.pos += p.vel * dt + self.accel() * (0.5 * dt * dt);
        p.vel += self.accel() * dt;
        bc.apply(&mut p.pos);
        if let Some(ori) = p.orientation.as_mut() {
            ori.q = nalgebra::UnitQuaternion::from_scaled_axis(ori.angvel * dt) * ori.q;
        }
        p.clock = t;
    }

    /// Relative coordinates of a pair at time `t`, minimum-imaged.
    pub fn pair_motion(
        &self,
        bc: &BoundaryCondition,
        p1: &Particle,
        p2: &Particle,
        t: f64,
    ) -> PairMotion {
        let mut rij = self.position_at(p1, t) - self.position_at(p2, t);
        bc.apply(&mut rij);
        PairMotion {
            rij,
            vij: self.velocity_at(p1, t) - self.velocity_at(p2, t),
        }
    }

    /// Earliest absolute time >= `t` at which the centres of `p1` and `p2`
    /// come within `d`, or `+inf`.
    pub fn sphere_sphere_in_root(
        &self,
        bc: &BoundaryCondition,
        p1: &Particle,
        p2: &Particle,
        t: f64,
        d: f64,
    ) -> f64 {
        let pm = self.pair_motion(bc, p1, p2, t);
        match sphere_in_root(&pm.rij, &pm.vij, d) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// Absolute time at which the pair separation grows to `d` (square-well
    /// escape root), or `+inf`.
    pub fn sphere_sphere_out_root(
        &self,
        bc: &BoundaryCondition,
        p1: &Particle,
        p2: &Particle,
        t: f64,
        d: f64,
    ) -> f64 {
        let pm = self.pair_motion(bc, p1, p2, t);
        match sphere_out_root(&pm.rij, &pm.vij, d) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// Max-norm contact of two parallel cubes of side `d`, optionally in a
    /// rotated frame. Returns the absolute time and contact axis.
    pub fn cube_cube_in_root(
        &self,
        bc: &BoundaryCondition,
        p1: &Particle,
        p2: &Particle,
        t: f64,
        d: f64,
        rotation: Option<&Mat3>,
    ) -> Option<(f64, usize)> {
        let pm = self.pair_motion(bc, p1, p2, t);
        let (rij, vij) = match rotation {
            Some(rot) => (rot * pm.rij, rot * pm.vij),
            None => (pm.rij, pm.vij),
        };
        cube_in_root(&rij, &vij, d).map(|(dt, axis)| (t + dt, axis))
    }

    /// First crossing of the plane through `origin` with unit normal `normal`
    /// by the point trajectory of `p`, arriving against the normal.
    pub fn plane_wall_collision(
        &self,
        p: &Particle,
        t: f64,
        origin: &Vec3,
        normal: &Vec3,
    ) -> f64 {
        let h0 = (self.position_at(p, t) - origin).dot(normal);
        let vn = self.velocity_at(p, t).dot(normal);
        let gn = self.accel().dot(normal);
        match plane_root(h0, vn, gn) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// First contact with a static slab of half-thickness `sigma`, hitting
    /// whichever face the particle currently sees.
    pub fn slab_wall_collision(
        &self,
        p: &Particle,
        t: f64,
        origin: &Vec3,
        normal: &Vec3,
        sigma: f64,
    ) -> f64 {
        let h0 = (self.position_at(p, t) - origin).dot(normal);
        let vn = self.velocity_at(p, t).dot(normal);
        let gn = self.accel().dot(normal);
        let side = if h0 >= 0.0 { 1.0 } else { -1.0 };
        match plane_root(side * h0 - sigma, side * vn, side * gn) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// First intersection of `p` with an infinite cylinder wall of radius
    /// `radius` about `axis` through `origin`, from either side.
    pub fn cylinder_wall_collision(
        &self,
        p: &Particle,
        t: f64,
        origin: &Vec3,
        axis: &Vec3,
        radius: f64,
    ) -> f64 {
        let perp = |x: &Vec3| x - axis * x.dot(axis);
        let rho = perp(&(self.position_at(p, t) - origin));
        let v = perp(&self.velocity_at(p, t));
        let g = perp(&self.accel());

        let dt = if g.norm() < 1e-12 {
            if rho.norm_squared() < radius * radius {
                sphere_out_root(&rho, &v, radius)
            } else {
                sphere_in_root(&rho, &v, radius)
            }
        } else {
            let gap = CylinderGap {
                rho,
                v,
                g,
                radius,
                side: if rho.norm() >= radius { 1.0 } else { -1.0 },
            };
            let reach = rho.norm() + 2.0 * radius;
            let v_scale = (v.norm() + (2.0 * g.norm() * reach).sqrt()).max(1e-12);
            next_event(&gap, 8.0 * reach / v_scale)
        };
        match dt {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// First contact with an oscillating plate, from the particle's side.
    pub fn oscillating_plate_collision(&self, p: &Particle, t: f64, plate: &PlateState) -> f64 {
        let h0 = (self.position_at(p, t) - plate.origin).dot(&plate.normal);
        let vn = self.velocity_at(p, t).dot(&plate.normal);
        let gn = self.accel().dot(&plate.normal);
        let s0 = plate.displacement(t);
        let side = if h0 - s0 >= 0.0 { 1.0 } else { -1.0 };

        let gap = PlateGap {
            h0,
            vn,
            gn,
            side,
            sigma: plate.sigma,
            delta: plate.delta,
            omega: plate.omega,
            phase: plate.omega * t + plate.phase,
        };
        let period = 2.0 * std::f64::consts::PI / plate.omega;
        let t_max = 3.0 * period + (h0.abs() + plate.delta.abs() + plate.sigma) / vn.abs().max(1e-12);
        match next_event(&gap, t_max) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// Contact root for two spheres mounted off-centre on rotating bodies,
    /// searched up to `t + horizon`.
    #[allow(clippy::too_many_arguments)]
    pub fn offcentre_spheres_root(
        &self,
        bc: &BoundaryCondition,
        p1: &Particle,
        p2: &Particle,
        t: f64,
        offset_1: &Vec3,
        offset_2: &Vec3,
        diameter: f64,
        max_dist: f64,
        horizon: f64,
    ) -> f64 {
        let pm = self.pair_motion(bc, p1, p2, t);
        let world = |p: &Particle, off: &Vec3| match &p.orientation {
            Some(o) => (o.q * off, o.angvel),
            None => (*off, Vec3::zeros()),
        };
        let (off_1, angv_1) = world(p1, offset_1);
        let (off_2, angv_2) = world(p2, offset_2);
        let f = OffcentreSpheres::new(
            pm.rij, pm.vij, angv_1, angv_2, off_1, off_2, diameter, diameter, max_dist,
        );
        match next_event(&f, horizon) {
            Some(dt) => t + dt,
            None => f64::INFINITY,
        }
    }

    /// Resolve a smooth-sphere collision with restitution `e` at contact
    /// distance squared `d2`. The impulse acts along the contact line and
    /// leaves the relative normal velocity at `-e` times its incoming value.
    #[allow(clippy::too_many_arguments)]
    pub fn smooth_spheres_coll(
        &self,
        bc: &BoundaryCondition,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        t: f64,
        e: f64,
        d2: f64,
        kind: EventKind,
    ) -> PairEventData {
        self.advance(bc, p1, t);
        self.advance(bc, p2, t);
        let mut rij = p1.pos - p2.pos;
        bc.apply(&mut rij);
        let vij = p1.vel - p2.vel;
        let r2 = rij.norm_squared();

        if r2 < d2 * (1.0 - 1e-6) {
            tracing::warn!(
                p1 = p1.id(),
                p2 = p2.id(),
                r2,
                d2,
                "overlapped pair handed to sphere resolver"
            );
        }

        let mu = m1 * m2 / (m1 + m2);
        let dp = rij * ((1.0 + e) * mu * rij.dot(&vij) / r2);

        let old1 = p1.vel;
        let old2 = p2.vel;
        p1.vel -= dp / m1;
        p2.vel += dp / m2;

        pair_data(p1, p2, old1, old2, m1, m2, rij, -dp, kind)
    }

    /// Resolve a parallel-cube collision: a 1D elastic exchange along the
    /// max-norm contact axis, in the rotated frame when one is given.
    #[allow(clippy::too_many_arguments)]
    pub fn parallel_cube_coll(
        &self,
        bc: &BoundaryCondition,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        t: f64,
        e: f64,
        rotation: Option<&Mat3>,
    ) -> PairEventData {
        self.advance(bc, p1, t);
        self.advance(bc, p2, t);
        let mut rij = p1.pos - p2.pos;
        bc.apply(&mut rij);
        let vij = p1.vel - p2.vel;

        let (rij_f, vij_f) = match rotation {
            Some(rot) => (rot * rij, rot * vij),
            None => (rij, vij),
        };
        let mut axis = 0;
        for k in 1..3 {
            if rij_f[k].abs() > rij_f[axis].abs() {
                axis = k;
            }
        }

        let mu = m1 * m2 / (m1 + m2);
        let mut dp_f = Vec3::zeros();
        dp_f[axis] = (1.0 + e) * mu * vij_f[axis];
        let dp = match rotation {
            Some(rot) => rot.transpose() * dp_f,
            None => dp_f,
        };

        let old1 = p1.vel;
        let old2 = p2.vel;
        p1.vel -= dp / m1;
        p2.vel += dp / m2;

        pair_data(p1, p2, old1, old2, m1, m2, rij, -dp, EventKind::Core)
    }

    /// Resolve a square-well outer-edge crossing: capture on the way in,
    /// escape or bounce on the way out, by comparing the normal kinetic
    /// energy against the well depth.
    #[allow(clippy::too_many_arguments)]
    pub fn well_edge_coll(
        &self,
        bc: &BoundaryCondition,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        t: f64,
        well_depth: f64,
        entering: bool,
    ) -> PairEventData {
        self.advance(bc, p1, t);
        self.advance(bc, p2, t);
        let mut rij = p1.pos - p2.pos;
        bc.apply(&mut rij);
        let r_hat = rij / rij.norm();
        let vij = p1.vel - p2.vel;
        let vn = vij.dot(&r_hat);
        let mu = m1 * m2 / (m1 + m2);

        let (vn_new, kind) = if entering {
            // Capture: the well does work on the pair.
            (-(vn * vn + 2.0 * well_depth / mu).sqrt(), EventKind::WellIn)
        } else {
            let arg = vn * vn - 2.0 * well_depth / mu;
            if arg > 0.0 {
                ((arg).sqrt(), EventKind::WellOut)
            } else {
                // Not enough normal energy to climb out: elastic bounce.
                (-vn, EventKind::WellBounce)
            }
        };

        let dvn = vn_new - vn;
        let old1 = p1.vel;
        let old2 = p2.vel;
        p1.vel += r_hat * (mu / m1 * dvn);
        p2.vel -= r_hat * (mu / m2 * dvn);

        pair_data(p1, p2, old1, old2, m1, m2, rij, r_hat * (mu * dvn), kind)
    }

    /// Specular reflection off a static plane with restitution `e`.
    pub fn run_plane_wall(
        &self,
        bc: &BoundaryCondition,
        p: &mut Particle,
        m: f64,
        t: f64,
        e: f64,
        normal: &Vec3,
    ) -> ParticleEventData {
        self.advance(bc, p, t);
        let old = p.vel;
        let vn = p.vel.dot(normal);
        p.vel -= normal * ((1.0 + e) * vn);
        single_data(p, old, m, EventKind::Wall)
    }

    /// Reflection off a cylinder wall along the radial contact normal.
    #[allow(clippy::too_many_arguments)]
    pub fn run_cylinder_wall(
        &self,
        bc: &BoundaryCondition,
        p: &mut Particle,
        m: f64,
        t: f64,
        e: f64,
        origin: &Vec3,
        axis: &Vec3,
    ) -> ParticleEventData {
        self.advance(bc, p, t);
        let rel = p.pos - origin;
        let rho = rel - axis * rel.dot(axis);
        let n = rho / rho.norm();
        let old = p.vel;
        let vn = p.vel.dot(&n);
        p.vel -= n * ((1.0 + e) * vn);
        single_data(p, old, m, EventKind::Wall)
    }

    /// Reflection off the oscillating plate in its instantaneous rest frame.
    pub fn run_oscillating_plate(
        &self,
        bc: &BoundaryCondition,
        p: &mut Particle,
        m: f64,
        t: f64,
        e: f64,
        plate: &PlateState,
    ) -> ParticleEventData {
        self.advance(bc, p, t);
        let u = plate.normal * plate.velocity(t);
        let old = p.vel;
        let vn_rel = (p.vel - u).dot(&plate.normal);
        p.vel -= plate.normal * ((1.0 + e) * vn_rel);
        single_data(p, old, m, EventKind::Wall)
    }
}

fn single_data(p: &Particle, old: Vec3, m: f64, kind: EventKind) -> ParticleEventData {
    ParticleEventData {
        id: p.id(),
        old_vel: old,
        new_vel: p.vel,
        delta_ke: 0.5 * m * (p.vel.norm_squared() - old.norm_squared()),
        kind,
    }
}

#[allow(clippy::too_many_arguments)]
fn pair_data(
    p1: &Particle,
    p2: &Particle,
    old1: Vec3,
    old2: Vec3,
    m1: f64,
    m2: f64,
    rij: Vec3,
    impulse: Vec3,
    kind: EventKind,
) -> PairEventData {
    let d1 = single_data(p1, old1, m1, kind);
    let d2 = single_data(p2, old2, m2, kind);
    PairEventData {
        delta_ke: d1.delta_ke + d2.delta_ke,
        p1: d1,
        p2: d2,
        rij,
        impulse,
        kind,
    }
}

/// State of an oscillating plate: a slab of half-thickness `sigma` whose
/// centre moves as `origin + normal * delta * cos(omega t + phase)`.
#[derive(Debug, Clone)]
pub struct PlateState {
    pub origin: Vec3,
    pub normal: Vec3,
    pub delta: f64,
    pub omega: f64,
    pub phase: f64,
    pub sigma: f64,
}

impl PlateState {
    /// Plate-centre displacement along the normal at absolute time `t`.
    #[inline]
    pub fn displacement(&self, t: f64) -> f64 {
        self.delta * (self.omega * t + self.phase).cos()
    }

    /// Plate-centre normal velocity at absolute time `t`.
    #[inline]
    pub fn velocity(&self, t: f64) -> f64 {
        -self.delta * self.omega * (self.omega * t + self.phase).sin()
    }
}

struct CylinderGap {
    rho: Vec3,
    v: Vec3,
    g: Vec3,
    radius: f64,
    side: f64,
}

impl OverlapFunction for CylinderGap {
    fn eval(&self, t: f64) -> f64 {
        let rho = self.rho + self.v * t + self.g * (0.5 * t * t);
        self.side * (rho.norm_squared() - self.radius * self.radius)
    }

    fn deriv(&self, t: f64) -> f64 {
        let rho = self.rho + self.v * t + self.g * (0.5 * t * t);
        let drho = self.v + self.g * t;
        self.side * 2.0 * rho.dot(&drho)
    }

    fn max_abs_deriv(&self, t_max: f64) -> f64 {
        let reach = self.rho.norm() + self.v.norm() * t_max + 0.5 * self.g.norm() * t_max * t_max;
        2.0 * reach * (self.v.norm() + self.g.norm() * t_max)
    }
}

struct PlateGap {
    h0: f64,
    vn: f64,
    gn: f64,
    side: f64,
    sigma: f64,
    delta: f64,
    omega: f64,
    /// Oscillator phase at the search origin.
    phase: f64,
}

impl OverlapFunction for PlateGap {
    fn eval(&self, t: f64) -> f64 {
        let plate = self.delta * (self.omega * t + self.phase).cos();
        self.side * (self.h0 + self.vn * t + 0.5 * self.gn * t * t - plate) - self.sigma
    }

    fn deriv(&self, t: f64) -> f64 {
        let dplate = -self.delta * self.omega * (self.omega * t + self.phase).sin();
        self.side * (self.vn + self.gn * t - dplate)
    }

    fn max_abs_deriv(&self, t_max: f64) -> f64 {
        self.vn.abs() + self.gn.abs() * t_max + (self.delta * self.omega).abs()
    }
}

/// Mutable borrows of two distinct particles from the store.
pub fn pair_mut(particles: &mut [Particle], i: usize, j: usize) -> (&mut Particle, &mut Particle) {
    assert_ne!(i, j, "pair events need two distinct particles");
    if i < j {
        let (a, b) = particles.split_at_mut(j);
        (&mut a[i], &mut b[0])
    } else {
        let (a, b) = particles.split_at_mut(i);
        (&mut b[0], &mut a[j])
    }
}
