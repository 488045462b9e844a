//! Pairing of hits from two companion planes.
//!
//! Companion planes see the same tracks half a cell apart, so their hits
//! come in close pairs. This iterator merges two wire-order-sorted hit
//! collections, emitting matched pairs and leaving unmatched hits as
//! singletons. When several hits of the second plane match one hit of the
//! first, the iterator scans them with the first hit held fixed, then
//! restores the saved second-plane cursor for the next first-plane hit;
//! hits already paired in the scan are skipped as singleton candidates but
//! may still pair with the following hit.

use std::cmp::Ordering;

use crate::core::types::WireHit;

/// One emitted pair: indices into the two input collections. A `None` side
/// marks a singleton.
pub type HitPair = (Option<usize>, Option<usize>);

/// Merge iterator over two ordered hit collections.
pub struct HitPairIter<'a> {
    coll_a: &'a [WireHit],
    coll_b: &'a [WireHit],
    max_dist: f64,
    ia: usize,
    ib: usize,
    save_ib: usize,
    save_hit: Option<usize>,
    scanning: bool,
    started: bool,
    next: (Option<usize>, Option<usize>),
}

impl<'a> HitPairIter<'a> {
    /// Pair hits from `coll_a` and `coll_b` whose drift intervals overlap
    /// within `max_dist`. Both collections must be sorted in wire order.
    pub fn new(coll_a: &'a [WireHit], coll_b: &'a [WireHit], max_dist: f64) -> Self {
        Self {
            coll_a,
            coll_b,
            max_dist,
            ia: 0,
            ib: 0,
            save_ib: 0,
            save_hit: None,
            scanning: false,
            started: false,
            next: (None, None),
        }
    }

    fn advance_a(&mut self) -> Option<usize> {
        if self.ia < self.coll_a.len() {
            self.ia += 1;
            Some(self.ia - 1)
        } else {
            None
        }
    }

    fn advance_b(&mut self) -> Option<usize> {
        if self.ib < self.coll_b.len() {
            self.ib += 1;
            Some(self.ib - 1)
        } else {
            None
        }
    }

    #[inline]
    fn cmp_ab(&self, a: usize, b: usize) -> Ordering {
        self.coll_a[a].dist_cmp(&self.coll_b[b], self.max_dist)
    }
}

impl Iterator for HitPairIter<'_> {
    type Item = HitPair;

    fn next(&mut self) -> Option<HitPair> {
        if !self.started {
            self.next = (self.advance_a(), self.advance_b());
            self.started = true;
        }

        let mut current = self.next;
        match current {
            (Some(a), Some(b)) => match self.cmp_ab(a, b) {
                Ordering::Less => {
                    self.next.0 = self.advance_a();
                    current.1 = None;
                }
                Ordering::Greater => {
                    self.next.1 = self.advance_b();
                    current.0 = None;
                }
                Ordering::Equal => {
                    let next_b = self.advance_b();
                    let scan_over = match next_b {
                        None => true,
                        Some(nb) => self.cmp_ab(a, nb) == Ordering::Less,
                    };
                    if scan_over {
                        if self.scanning {
                            // End of a scan over B with a held fixed: return
                            // B to the start of the scan and move on in A.
                            self.scanning = false;
                            self.ib = self.save_ib;
                            let mut hit_b = self.save_hit;
                            let hit_a = self.advance_a();
                            if let Some(ha) = hit_a {
                                // Skip the Bs paired in the prior scan until
                                // either B reaches the hit that ended it or
                                // B could pair with the new A.
                                while hit_b != next_b {
                                    match hit_b {
                                        Some(hb)
                                            if self.coll_b[hb]
                                                .dist_cmp(&self.coll_a[ha], self.max_dist)
                                                == Ordering::Less =>
                                        {
                                            hit_b = self.advance_b();
                                        }
                                        _ => break,
                                    }
                                }
                            } else {
                                // No more As; only the rest of B remains.
                                hit_b = next_b;
                            }
                            self.next = (hit_a, hit_b);
                        } else {
                            // Single match: advance both planes.
                            self.next = (self.advance_a(), next_b);
                        }
                    } else {
                        // More than one B matches this a: hold a fixed and
                        // walk along B, remembering where the scan began.
                        if !self.scanning {
                            self.scanning = true;
                            self.save_ib = self.ib;
                            self.save_hit = Some(b);
                        }
                        self.next.1 = next_b;
                    }
                }
            },
            (Some(_), None) => {
                self.next.0 = self.advance_a();
            }
            (None, Some(_)) => {
                self.next.1 = self.advance_b();
            }
            (None, None) => return None,
        }
        Some(current)
    }
}
