//! Clustering of matched patterns into track roads.
//!
//! A road is a maximal group of compatible pattern matches: all members
//! share a common core of hits, and that core must keep enough planes
//! covered. The common set can only shrink as patterns are added; an
//! addition that would shrink it below the coverage requirement is
//! rejected and the road keeps its previous state.

use crate::core::types::{HitSet, WireHit};

use super::compare::{Consumption, MatchRecord};
use super::ProjectionConfig;

/// Planes allowed to go uncovered by a road's hit set.
const MAX_MISSING_PLANES: u32 = 1;

/// Build-phase state, dropped when the road is finished.
#[derive(Debug)]
struct BuildInfo {
    /// Indices of the matches added to this road.
    patterns: Vec<usize>,
    /// Hits common to every added pattern.
    common_hits: HitSet,
}

/// One candidate track in a projection.
#[derive(Debug)]
pub struct Road {
    n_layers: usize,
    n_planes: usize,
    /// Union of the hits of all added patterns.
    hits: HitSet,
    /// Smallest front/back bin over the added patterns.
    left: [u16; 2],
    /// Largest front/back bin over the added patterns.
    right: [u16; 2],
    build: Option<BuildInfo>,
}

impl Road {
    pub fn new(config: &ProjectionConfig) -> Self {
        debug_assert!(config.n_layers >= 1 && config.n_planes >= config.n_layers);
        Self {
            n_layers: config.n_layers,
            n_planes: config.n_planes,
            hits: HitSet::new(),
            left: [u16::MAX; 2],
            right: [0; 2],
            build: Some(BuildInfo {
                patterns: Vec::new(),
                common_hits: HitSet::new(),
            }),
        }
    }

    /// Whether the given hits keep enough planes covered for a cohesive
    /// road. At most [`MAX_MISSING_PLANES`] planes may be unrepresented.
    fn check_match(&self, hits: &HitSet, all_hits: &[WireHit]) -> bool {
        let mut covered = 0u32;
        for &index in hits {
            covered |= 1 << all_hits[index].plane_num;
        }
        let mut n_miss = 0;
        for plane in 0..self.n_planes {
            if covered & (1 << plane) == 0 {
                n_miss += 1;
                if n_miss > MAX_MISSING_PLANES {
                    return false;
                }
            }
        }
        true
    }

    /// Try to add a matched pattern to this road.
    ///
    /// Accepted iff the road is still building, the pattern is not fully
    /// consumed, and the shrunken common hit set still covers enough
    /// planes. Returns whether the pattern was taken.
    pub fn add(&mut self, index: usize, matches: &[MatchRecord], all_hits: &[WireHit]) -> bool {
        if self.build.is_none() {
            return false;
        }
        let record = &matches[index];
        if record.used == Consumption::Full {
            return false;
        }

        let first = self.build.as_ref().unwrap().patterns.is_empty();
        if first {
            if !self.check_match(&record.hits, all_hits) {
                return false;
            }
            self.hits = record.hits.clone();
            self.build.as_mut().unwrap().common_hits = record.hits.clone();
        } else {
            let new_common: HitSet = {
                let build = self.build.as_ref().unwrap();
                build.common_hits.intersection(&record.hits).copied().collect()
            };
            let old_size = self.build.as_ref().unwrap().common_hits.len();
            debug_assert!(new_common.len() <= old_size);
            if new_common.len() < old_size {
                // The commons shrank; only accept if the road stays good.
                if !self.check_match(&new_common, all_hits) {
                    return false;
                }
                self.build.as_mut().unwrap().common_hits = new_common;
            }
            self.hits.extend(record.hits.iter().copied());
        }

        self.build.as_mut().unwrap().patterns.push(index);

        let back = self.n_layers - 1;
        self.left[0] = self.left[0].min(record.bins[0]);
        self.left[1] = self.left[1].min(record.bins[back]);
        self.right[0] = self.right[0].max(record.bins[0]);
        self.right[1] = self.right[1].max(record.bins[back]);
        true
    }

    /// Whether a match lies close enough to this road's current bounds to
    /// be offered to [`Road::add`].
    pub fn is_adjacent(&self, record: &MatchRecord, max_dist: u16) -> bool {
        let back = self.n_layers - 1;
        let front_bin = record.bins[0] as u32;
        let back_bin = record.bins[back] as u32;
        let dist = max_dist as u32;
        front_bin + dist >= self.left[0] as u32
            && front_bin <= self.right[0] as u32 + dist
            && back_bin + dist >= self.left[1] as u32
            && back_bin <= self.right[1] as u32 + dist
    }

    /// Freeze the road and mark every added pattern as consumed: fully if
    /// all of its hits are in the common set, partially otherwise.
    pub fn finish(&mut self, matches: &mut [MatchRecord]) {
        debug_assert!(self.build.is_some(), "road finished twice");
        let Some(build) = self.build.take() else {
            return;
        };
        for &index in &build.patterns {
            let record = &mut matches[index];
            debug_assert!(record.used != Consumption::Full);
            record.used = if record.hits.is_subset(&build.common_hits) {
                Consumption::Full
            } else {
                Consumption::Partial
            };
        }
    }

    /// Hits common to all added patterns. `None` once finished.
    pub fn common_hits(&self) -> Option<&HitSet> {
        self.build.as_ref().map(|b| &b.common_hits)
    }

    /// Indices of the added matches. Empty once finished.
    pub fn pattern_indices(&self) -> &[usize] {
        self.build.as_ref().map(|b| b.patterns.as_slice()).unwrap_or(&[])
    }

    pub fn n_patterns(&self) -> usize {
        self.pattern_indices().len()
    }

    /// Union of the hits of all added patterns.
    pub fn hits(&self) -> &HitSet {
        &self.hits
    }

    pub fn left(&self) -> [u16; 2] {
        self.left
    }

    pub fn right(&self) -> [u16; 2] {
        self.right
    }

    pub fn is_finished(&self) -> bool {
        self.build.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ProjKind, WireHit};
    use crate::tree::{LinkKind, NodeDescriptor};

    fn config(n_layers: usize, n_planes: usize) -> ProjectionConfig {
        ProjectionConfig {
            n_layers,
            n_planes,
            width: 8.0,
            cluster_max_dist: 0,
            pattern_max_dist: 1,
            max_missing_layers: 1,
        }
    }

    fn plane_hit(plane: u16) -> WireHit {
        WireHit::new(ProjKind::X, plane, 5, 5.5, 0, 0.0, 0.0002)
    }

    fn record(bins: Vec<u16>, hits: &[usize]) -> MatchRecord {
        MatchRecord {
            node: NodeDescriptor {
                pattern: 0,
                kind: LinkKind::Normal,
                depth: 3,
                shift: bins[0] as u32,
                mirrored: false,
            },
            bins,
            hits: hits.iter().copied().collect(),
            used: Consumption::Unused,
        }
    }

    #[test]
    fn test_single_full_match_road() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2)];
        let mut matches = vec![record(vec![5, 5, 5], &[0, 1, 2])];

        let mut road = Road::new(&config(3, 3));
        assert!(road.add(0, &matches, &hits));
        assert_eq!(road.common_hits().unwrap(), &HitSet::from([0, 1, 2]));
        assert_eq!(road.hits(), &HitSet::from([0, 1, 2]));
        assert_eq!(road.left(), [5, 5]);
        assert_eq!(road.right(), [5, 5]);

        road.finish(&mut matches);
        assert!(road.is_finished());
        assert_eq!(matches[0].used, Consumption::Full);
    }

    #[test]
    fn test_rejects_pattern_that_shrinks_commons_too_far() {
        // hits 0..=2 on planes 0..=2, hit 3 alone on plane 3
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2), plane_hit(3)];
        let mut matches = vec![
            record(vec![5, 5, 5, 5], &[0, 1, 2]),
            record(vec![5, 5, 5, 5], &[3]),
        ];

        let mut road = Road::new(&config(4, 4));
        assert!(road.add(0, &matches, &hits));
        // disjoint hit set empties the commons, all planes go missing
        assert!(!road.add(1, &matches, &hits));
        assert_eq!(road.n_patterns(), 1);
        assert_eq!(road.common_hits().unwrap(), &HitSet::from([0, 1, 2]));

        road.finish(&mut matches);
        assert_eq!(matches[0].used, Consumption::Full);
        assert_eq!(matches[1].used, Consumption::Unused);
    }

    #[test]
    fn test_partial_consumption() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2), plane_hit(2)];
        let mut matches = vec![
            record(vec![5, 5, 5], &[0, 1, 2]),
            record(vec![5, 5, 6], &[0, 1, 3]),
        ];

        let mut road = Road::new(&config(3, 3));
        assert!(road.add(0, &matches, &hits));
        // commons shrink to {0, 1} but still cover planes 0 and 1
        assert!(road.add(1, &matches, &hits));
        assert_eq!(road.common_hits().unwrap(), &HitSet::from([0, 1]));
        assert_eq!(road.hits(), &HitSet::from([0, 1, 2, 3]));
        assert_eq!(road.right(), [5, 6]);

        road.finish(&mut matches);
        assert_eq!(matches[0].used, Consumption::Partial);
        assert_eq!(matches[1].used, Consumption::Partial);
    }

    #[test]
    fn test_first_pattern_must_cover_planes() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2), plane_hit(3)];
        let mut road = Road::new(&config(4, 4));
        // only two of four planes covered
        let matches = vec![record(vec![5, 5, 5, 5], &[0, 1])];
        assert!(!road.add(0, &matches, &hits));
        assert_eq!(road.n_patterns(), 0);
    }

    #[test]
    fn test_fully_consumed_pattern_is_refused() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2)];
        let mut matches = vec![record(vec![5, 5, 5], &[0, 1, 2])];
        matches[0].used = Consumption::Full;

        let mut road = Road::new(&config(3, 3));
        assert!(!road.add(0, &matches, &hits));
    }

    #[test]
    fn test_add_after_finish_is_refused() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2)];
        let mut matches = vec![
            record(vec![5, 5, 5], &[0, 1, 2]),
            record(vec![5, 5, 5], &[0, 1, 2]),
        ];

        let mut road = Road::new(&config(3, 3));
        assert!(road.add(0, &matches, &hits));
        road.finish(&mut matches);
        assert!(!road.add(1, &matches, &hits));
    }

    #[test]
    fn test_adjacency_window() {
        let hits = vec![plane_hit(0), plane_hit(1), plane_hit(2)];
        let matches = vec![record(vec![5, 5, 5], &[0, 1, 2])];
        let mut road = Road::new(&config(3, 3));
        road.add(0, &matches, &hits);

        assert!(road.is_adjacent(&record(vec![6, 5, 6], &[]), 1));
        assert!(road.is_adjacent(&record(vec![4, 5, 4], &[]), 1));
        assert!(!road.is_adjacent(&record(vec![7, 5, 5], &[]), 1));
        assert!(!road.is_adjacent(&record(vec![5, 5, 3], &[]), 1));
    }
}
