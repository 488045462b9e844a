//! Wire-chamber hit types and orderings.
//!
//! Hits are kept in a per-event buffer sorted by [`WireHit::wire_order`];
//! all set operations (road building, pattern matching) then work on plain
//! indices into that buffer, so index order and hit order agree.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Wire-angle family of a plane (projection type).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProjKind {
    U = 0,
    V = 1,
    X = 2,
    Y = 3,
}

impl ProjKind {
    /// Single character representation for debugging
    pub fn as_char(self) -> char {
        match self {
            ProjKind::U => 'u',
            ProjKind::V => 'v',
            ProjKind::X => 'x',
            ProjKind::Y => 'y',
        }
    }
}

/// A single hit on a drift-chamber wire plane.
///
/// `pos_left`/`pos_right` are the two drift-ambiguous track positions,
/// `wire_pos - drift` and `wire_pos + drift`. Freshly decoded hits start
/// with both equal to the wire position.
#[derive(Clone, Debug)]
pub struct WireHit {
    /// Projection type of the plane this hit is on.
    pub proj: ProjKind,
    /// Plane number within the projection.
    pub plane_num: u16,
    /// Wire number within the plane.
    pub wire_num: i32,
    /// Wire position across the detector (m).
    pub wire_pos: f64,
    /// Position resolution (m).
    pub resolution: f64,
    /// Raw TDC value (channels).
    pub raw_tdc: i32,
    /// Hit time corrected for TDC offset (s).
    pub drift_time: f64,
    /// Left drift-ambiguous position (m).
    pub pos_left: f64,
    /// Right drift-ambiguous position (m).
    pub pos_right: f64,
}

impl WireHit {
    /// Create a hit with no drift correction applied yet.
    pub fn new(
        proj: ProjKind,
        plane_num: u16,
        wire_num: i32,
        wire_pos: f64,
        raw_tdc: i32,
        drift_time: f64,
        resolution: f64,
    ) -> Self {
        Self {
            proj,
            plane_num,
            wire_num,
            wire_pos,
            resolution,
            raw_tdc,
            drift_time,
            pos_left: wire_pos,
            pos_right: wire_pos,
        }
    }

    /// Drift distance from the wire (m).
    #[inline]
    pub fn drift_dist(&self) -> f64 {
        self.pos_right - self.wire_pos
    }

    /// Strict ordering on (projection, plane, wire, drift time).
    ///
    /// Hits sorted this way are in order of increasing wire number and,
    /// per wire, in the order in which they arrived.
    pub fn wire_order(&self, other: &WireHit) -> Ordering {
        self.proj
            .cmp(&other.proj)
            .then(self.plane_num.cmp(&other.plane_num))
            .then(self.wire_num.cmp(&other.wire_num))
            .then(self.drift_time.total_cmp(&other.drift_time))
    }

    /// Proximity ordering for clustering: hits on the same plane within
    /// `max_dist` wires of each other compare equal. With `max_dist == 0`
    /// this reduces to [`WireHit::wire_order`].
    pub fn wire_dist_cmp(&self, other: &WireHit, max_dist: i32) -> Ordering {
        debug_assert!(max_dist >= 0);
        let ord = self
            .proj
            .cmp(&other.proj)
            .then(self.plane_num.cmp(&other.plane_num));
        if ord != Ordering::Equal {
            return ord;
        }
        if self.wire_num + max_dist < other.wire_num {
            return Ordering::Less;
        }
        if other.wire_num + max_dist < self.wire_num {
            return Ordering::Greater;
        }
        if max_dist > 0 {
            return Ordering::Equal;
        }
        self.wire_num
            .cmp(&other.wire_num)
            .then(self.drift_time.total_cmp(&other.drift_time))
    }

    /// Interval comparison on the drift positions with tolerance, used to
    /// pair hits from companion planes. Returns `Equal` when the intervals
    /// `[pos_left, pos_right]` overlap within `max_dist`.
    pub fn dist_cmp(&self, other: &WireHit, max_dist: f64) -> Ordering {
        if self.pos_right + max_dist < other.pos_left {
            Ordering::Less
        } else if other.pos_right + max_dist < self.pos_left {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Set of hit indices into a wire-order-sorted hit buffer.
pub type HitSet = BTreeSet<usize>;

/// Sort a hit buffer into wire order.
pub fn sort_hits(hits: &mut [WireHit]) {
    hits.sort_by(|a, b| a.wire_order(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(plane: u16, wire: i32, time: f64) -> WireHit {
        WireHit::new(ProjKind::X, plane, wire, wire as f64 * 0.01, 0, time, 0.0002)
    }

    #[test]
    fn test_wire_order_is_lexicographic() {
        let a = hit(0, 3, 1.0e-7);
        let b = hit(0, 3, 2.0e-7);
        let c = hit(0, 4, 0.0);
        let d = hit(1, 0, 0.0);

        assert_eq!(a.wire_order(&b), Ordering::Less);
        assert_eq!(b.wire_order(&c), Ordering::Less);
        assert_eq!(c.wire_order(&d), Ordering::Less);
        assert_eq!(a.wire_order(&a), Ordering::Equal);
    }

    #[test]
    fn test_wire_order_projection_dominates() {
        let u = WireHit::new(ProjKind::U, 5, 100, 1.0, 0, 0.0, 0.0002);
        let v = WireHit::new(ProjKind::V, 0, 0, 0.0, 0, 0.0, 0.0002);
        assert_eq!(u.wire_order(&v), Ordering::Less);
    }

    #[test]
    fn test_wire_dist_cmp_equivalence_window() {
        let a = hit(0, 10, 0.0);
        let b = hit(0, 12, 0.0);
        let c = hit(0, 13, 0.0);

        assert_eq!(a.wire_dist_cmp(&b, 2), Ordering::Equal);
        assert_eq!(a.wire_dist_cmp(&c, 2), Ordering::Less);
        assert_eq!(c.wire_dist_cmp(&a, 2), Ordering::Greater);
    }

    #[test]
    fn test_wire_dist_cmp_zero_matches_wire_order() {
        let a = hit(0, 10, 1.0e-7);
        let b = hit(0, 10, 2.0e-7);
        assert_eq!(a.wire_dist_cmp(&b, 0), a.wire_order(&b));
    }

    #[test]
    fn test_dist_cmp_overlap() {
        let mut a = hit(0, 10, 0.0);
        a.pos_left = 0.10;
        a.pos_right = 0.12;
        let mut b = hit(0, 20, 0.0);
        b.pos_left = 0.125;
        b.pos_right = 0.14;

        assert_eq!(a.dist_cmp(&b, 0.0), Ordering::Less);
        assert_eq!(a.dist_cmp(&b, 0.01), Ordering::Equal);
        assert_eq!(b.dist_cmp(&a, 0.01), Ordering::Equal);
        assert_eq!(b.dist_cmp(&a, 0.0), Ordering::Greater);
    }

    #[test]
    fn test_sort_hits() {
        let mut hits = vec![hit(1, 0, 0.0), hit(0, 5, 2.0e-7), hit(0, 5, 1.0e-7)];
        sort_hits(&mut hits);
        assert_eq!(hits[0].plane_num, 0);
        assert!(hits[0].drift_time < hits[1].drift_time);
        assert_eq!(hits[2].plane_num, 1);
    }
}
