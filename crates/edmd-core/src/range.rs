//! Range predicates scoping event generators to particles or pairs.
//!
//! Ranges are pure and immutable after construction.

use crate::{CoreError, ParticleId, Result};

/// Predicate over a single particle id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    All,
    Single(ParticleId),
    /// Inclusive id interval.
    Interval {
        start: ParticleId,
        end: ParticleId,
    },
    List(Vec<ParticleId>),
}

impl Range {
    #[inline]
    pub fn contains(&self, id: ParticleId) -> bool {
        match self {
            Range::All => true,
            Range::Single(s) => id == *s,
            Range::Interval { start, end } => id >= *start && id <= *end,
            Range::List(ids) => ids.contains(&id),
        }
    }
}

/// Predicate over an unordered pair of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairRange {
    All,
    Pair(ParticleId, ParticleId),
    List(Vec<(ParticleId, ParticleId)>),
    /// Both ids lie in `[start, end]` and in the same contiguous chain of
    /// length `interval`.
    IntraChains {
        start: ParticleId,
        end: ParticleId,
        interval: ParticleId,
    },
}

impl PairRange {
    /// Build an intra-chain range; the id interval must split evenly into
    /// chains of length `interval`.
    pub fn intra_chains(start: ParticleId, end: ParticleId, interval: ParticleId) -> Result<Self> {
        if interval == 0 || end < start {
            return Err(CoreError::InvalidRange(format!(
                "IntraChains [{start}, {end}] with interval {interval} is degenerate"
            )));
        }
        if (end - start + 1) % interval != 0 {
            return Err(CoreError::InvalidRange(format!(
                "IntraChains [{start}, {end}] does not split evenly into chains of {interval}"
            )));
        }
        Ok(PairRange::IntraChains {
            start,
            end,
            interval,
        })
    }

    #[inline]
    pub fn contains(&self, a: ParticleId, b: ParticleId) -> bool {
        match self {
            PairRange::All => true,
            PairRange::Pair(x, y) => (a == *x && b == *y) || (a == *y && b == *x),
            PairRange::List(pairs) => pairs
                .iter()
                .any(|&(x, y)| (a == x && b == y) || (a == y && b == x)),
            PairRange::IntraChains {
                start,
                end,
                interval,
            } => {
                a >= *start
                    && a <= *end
                    && b >= *start
                    && b <= *end
                    && (a - start) / interval == (b - start) / interval
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_interval_membership() {
        assert!(Range::Single(4).contains(4));
        assert!(!Range::Single(4).contains(5));
        let iv = Range::Interval { start: 2, end: 6 };
        assert!(iv.contains(2) && iv.contains(6));
        assert!(!iv.contains(1) && !iv.contains(7));
    }

    #[test]
    fn pair_is_unordered() {
        let r = PairRange::Pair(3, 8);
        assert!(r.contains(3, 8));
        assert!(r.contains(8, 3));
        assert!(!r.contains(3, 7));
    }

    #[test]
    fn intra_chains_memberships() {
        let r = PairRange::intra_chains(0, 9, 5).unwrap();
        assert!(r.contains(2, 4));
        assert!(!r.contains(4, 5));
        assert!(r.contains(5, 9));
        assert!(!r.contains(3, 5));
    }

    #[test]
    fn intra_chains_requires_even_split() {
        assert!(PairRange::intra_chains(0, 9, 4).is_err());
        assert!(PairRange::intra_chains(0, 9, 5).is_ok());
        assert!(PairRange::intra_chains(5, 3, 1).is_err());
    }

    #[test]
    fn intra_chains_excludes_ids_outside_interval() {
        let r = PairRange::intra_chains(5, 14, 5).unwrap();
        assert!(!r.contains(0, 6));
        assert!(r.contains(5, 9));
        assert!(!r.contains(9, 10));
        assert!(r.contains(10, 14));
        assert!(!r.contains(14, 15));
    }
}
