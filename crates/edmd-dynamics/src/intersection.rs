//! Root finders for collision predicates.
//!
//! Quadratic predicates (spheres, faces) are solved in closed form; rotating
//! or oscillating geometry goes through a conservative-advancement search
//! over an [`OverlapFunction`].

use edmd_math::{rodrigues, Vec3};

/// Back-off tolerance admitting "just collided" roots.
///
/// Roots in `[-EPS_BACK, 0)` are clamped to zero so a pair sitting exactly
/// at contact after a previous event is not reported as missed.
pub const EPS_BACK: f64 = 1e-12;

/// Earliest time at which `|rij + vij t| = d` for an approaching pair.
///
/// Returns `None` for receding or missing pairs; an overlapped approaching
/// pair collides immediately.
pub fn sphere_in_root(rij: &Vec3, vij: &Vec3, d: f64) -> Option<f64> {
    let b = rij.dot(vij);
    if b >= 0.0 {
        return None;
    }
    let c = rij.norm_squared() - d * d;
    if c < 0.0 {
        return Some(0.0);
    }
    let a = vij.norm_squared();
    let disc = b * b - a * c;
    if disc <= 0.0 {
        return None;
    }
    // Stable form of the smaller root; -b + sqrt(disc) > 0 since b < 0.
    let t = c / (-b + disc.sqrt());
    if t < -EPS_BACK {
        return None;
    }
    Some(t.max(0.0))
}

/// Time at which `|rij + vij t| = d` from the inside (the larger root).
///
/// Used for square-well escapes; `None` when there is no relative motion.
pub fn sphere_out_root(rij: &Vec3, vij: &Vec3, d: f64) -> Option<f64> {
    let a = vij.norm_squared();
    if a < 1e-300 {
        return None;
    }
    let b = rij.dot(vij);
    let c = rij.norm_squared() - d * d;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b + disc.sqrt()) / a;
    if t < -EPS_BACK {
        return None;
    }
    Some(t.max(0.0))
}

/// Earliest contact of two parallel axis-aligned cubes of side `d` under the
/// max-norm, with the contact axis.
///
/// Sweeps the per-axis entry/exit windows; the last axis to enter defines
/// the contact face.
pub fn cube_in_root(rij: &Vec3, vij: &Vec3, d: f64) -> Option<(f64, usize)> {
    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;
    let mut axis = usize::MAX;

    for k in 0..3 {
        let x = rij[k];
        let v = vij[k];
        if v.abs() < 1e-300 {
            if x.abs() >= d {
                return None;
            }
            continue;
        }
        let mut t1 = (-d - x) / v;
        let mut t2 = (d - x) / v;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            axis = k;
        }
        t_exit = t_exit.min(t2);
    }

    if axis == usize::MAX || t_enter >= t_exit || t_enter < -EPS_BACK {
        return None;
    }
    Some((t_enter.max(0.0), axis))
}

/// Smallest admissible root of `h(t) = h0 + vn t + gn t^2 / 2` with the
/// trajectory moving against the surface normal at impact (`h'(t) < 0`).
///
/// The derivative condition makes the root self-stabilizing: a particle
/// sitting exactly on the surface after a reflection is receding and gets
/// no second root, whatever side of zero `h0` landed on.
pub fn plane_root(h0: f64, vn: f64, gn: f64) -> Option<f64> {
    let approaching = |t: f64| vn + gn * t < 0.0;

    if gn.abs() < 1e-300 {
        if vn.abs() < 1e-300 {
            return None;
        }
        let t = -h0 / vn;
        if t >= -EPS_BACK && approaching(t) {
            return Some(t.max(0.0));
        }
        return None;
    }

    let a = 0.5 * gn;
    let disc = vn * vn - 4.0 * a * h0;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let q = -0.5 * (vn + vn.signum() * sq);
    let (mut r1, mut r2) = (q / a, if q.abs() > 1e-300 { h0 / q } else { q / a });
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }
    for t in [r1, r2] {
        if t >= -EPS_BACK && approaching(t) {
            return Some(t.max(0.0));
        }
    }
    None
}

/// A scalar separation function `f(t)`: positive while clear, zero at
/// contact, negative when overlapped.
pub trait OverlapFunction {
    fn eval(&self, t: f64) -> f64;
    fn deriv(&self, t: f64) -> f64;
    /// An upper bound on `|f'|` over `[0, t_max]`.
    fn max_abs_deriv(&self, t_max: f64) -> f64;
}

const MAX_STEPS: usize = 100_000;
const BISECTIONS: usize = 128;

/// First root of `f` in `[0, t_max]` by conservative advancement.
///
/// An overlapped, approaching state collides immediately. The step size is
/// `f / L` with `L` the caller's derivative bound, so no sign change can be
/// stepped over; stalled searches (tangential approaches) give up and
/// report no event.
pub fn next_event<F: OverlapFunction>(f: &F, t_max: f64) -> Option<f64> {
    if !(t_max > 0.0) {
        return None;
    }
    let bound = f.max_abs_deriv(t_max).max(1e-300);
    let min_step = (t_max * 1e-9).max(1e-14);

    let mut t = 0.0;
    if f.eval(0.0) <= 0.0 {
        if f.deriv(0.0) < 0.0 {
            return Some(0.0);
        }
        // Separating from an overlapped state: leave the overlap region
        // before searching for the next approach.
        let step = t_max / 1024.0;
        while f.eval(t) <= 0.0 {
            t += step;
            if t >= t_max {
                return None;
            }
        }
    }

    let mut t_prev = t;
    for _ in 0..MAX_STEPS {
        if t >= t_max {
            return None;
        }
        let ft = f.eval(t);
        if ft <= 0.0 {
            return Some(refine(f, t_prev, t));
        }
        t_prev = t;
        t += (ft / bound).max(min_step);
    }
    None
}

fn refine<F: OverlapFunction>(f: &F, mut lo: f64, mut hi: f64) -> f64 {
    for _ in 0..BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if f.eval(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Overlap function for two spheres mounted off-centre on rotating bodies.
///
/// The sphere centres sit at body-frame offsets rotating with the bodies'
/// angular velocities while the body separation translates uniformly, so
/// the function is invariant under advancing the state along its own
/// trajectory.
#[derive(Debug, Clone)]
pub struct OffcentreSpheres {
    pub rij: Vec3,
    pub vij: Vec3,
    pub angvi: Vec3,
    pub angvj: Vec3,
    pub offset_i: Vec3,
    pub offset_j: Vec3,
    /// Contact separation of the two sphere centres.
    pub contact: f64,
    /// Upper bound on the centre separation over the search horizon.
    pub max_dist: f64,
}

impl OffcentreSpheres {
    pub fn new(
        rij: Vec3,
        vij: Vec3,
        angvi: Vec3,
        angvj: Vec3,
        offset_i: Vec3,
        offset_j: Vec3,
        diameter_i: f64,
        diameter_j: f64,
        max_dist: f64,
    ) -> Self {
        Self {
            rij,
            vij,
            angvi,
            angvj,
            offset_i,
            offset_j,
            contact: 0.5 * (diameter_i + diameter_j),
            max_dist,
        }
    }

    fn separation(&self, t: f64) -> (Vec3, Vec3) {
        let off_i = rodrigues(&(self.angvi * t)) * self.offset_i;
        let off_j = rodrigues(&(self.angvj * t)) * self.offset_j;
        let sep = self.rij + self.vij * t + off_i - off_j;
        let dsep = self.vij + self.angvi.cross(&off_i) - self.angvj.cross(&off_j);
        (sep, dsep)
    }
}

impl OverlapFunction for OffcentreSpheres {
    fn eval(&self, t: f64) -> f64 {
        let (sep, _) = self.separation(t);
        sep.norm_squared() - self.contact * self.contact
    }

    fn deriv(&self, t: f64) -> f64 {
        let (sep, dsep) = self.separation(t);
        2.0 * sep.dot(&dsep)
    }

    fn max_abs_deriv(&self, _t_max: f64) -> f64 {
        let speed = self.vij.norm()
            + self.angvi.norm() * self.offset_i.norm()
            + self.angvj.norm() * self.offset_j.norm();
        2.0 * self.max_dist * speed
    }
}
