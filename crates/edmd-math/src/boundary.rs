//! Boundary conditions for the simulation domain.
//!
//! Pair predicates operate on relative separations; the boundary condition
//! folds a separation into its minimum image before any root finding.

use crate::Vec3;

/// Domain boundary condition.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCondition {
    /// Infinite domain, separations pass through unchanged.
    None,
    /// Rectangular periodic domain centred on the origin.
    Periodic {
        /// Edge lengths of the primary image.
        dims: Vec3,
    },
}

impl BoundaryCondition {
    /// Create a periodic cube of edge length `l`.
    pub fn cubic(l: f64) -> Self {
        BoundaryCondition::Periodic {
            dims: Vec3::new(l, l, l),
        }
    }

    /// Fold `r` into the minimum image, component-wise into [-L/2, L/2).
    #[inline]
    pub fn apply(&self, r: &mut Vec3) {
        if let BoundaryCondition::Periodic { dims } = self {
            for k in 0..3 {
                r[k] -= dims[k] * (r[k] / dims[k]).round();
            }
        }
    }

    /// Minimum-image copy of `r`.
    #[inline]
    pub fn wrapped(&self, r: &Vec3) -> Vec3 {
        let mut out = *r;
        self.apply(&mut out);
        out
    }

    /// True for periodic domains.
    pub fn is_periodic(&self) -> bool {
        matches!(self, BoundaryCondition::Periodic { .. })
    }

    /// Edge lengths for bounded domains.
    pub fn dims(&self) -> Option<Vec3> {
        match self {
            BoundaryCondition::Periodic { dims } => Some(*dims),
            BoundaryCondition::None => None,
        }
    }
}
