//! Recursive pattern tree builder.
//!
//! Starting from the all-zero root, every pattern is asked for its child
//! candidates at the next resolution level. Candidates already in the hash
//! table are reused by reference (after re-checking the slope bound when the
//! reuse happens shallower than any previous validation); new candidates
//! must pass both geometric predicates before they are stored and linked.
//! A pattern's subtree is extended further down whenever the pattern is
//! reached from a shallower level than before.

use std::time::{Duration, Instant};

use crate::error::Result;

use super::child_iter::ChildIter;
use super::config::TreeParam;
use super::geometry::{line_ok, slope_ok};
use super::hash::{HashEntry, PatternHash};
use super::pattern::{Link, LinkKind, Pattern, PatternId, PatternStore};
use super::pattern_tree::PatternTree;

/// Statistics of one tree build.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeStats {
    /// Number of distinct stored patterns.
    pub n_patterns: usize,
    /// Number of child links.
    pub n_links: usize,
    /// Longest child list of any pattern.
    pub max_child_list: usize,
    /// Longest hash collision chain.
    pub max_hash_chain: usize,
    /// Approximate memory footprint of the pattern graph.
    pub n_bytes: usize,
    /// Approximate memory footprint of the hash table.
    pub n_hash_bytes: usize,
    /// Wall-clock build time.
    pub build_time: Duration,
}

/// Builder for the template database of straight-line patterns.
#[derive(Debug)]
pub struct PatternGenerator {
    nlevels: u16,
    nplanes: usize,
    z: Vec<f64>,
    max_slope: f64,
    store: PatternStore,
    hash: PatternHash,
    stats: TreeStats,
}

impl PatternGenerator {
    pub fn new() -> Self {
        Self {
            nlevels: 0,
            nplanes: 0,
            z: Vec::new(),
            max_slope: 0.0,
            store: PatternStore::new(),
            hash: PatternHash::new(1),
            stats: TreeStats::default(),
        }
    }

    /// Generate a pattern tree for the given parameters.
    ///
    /// Fails only on invalid parameters; generation itself never aborts.
    pub fn generate(&mut self, param: &TreeParam) -> Result<PatternTree> {
        let norm = param.normalized()?;

        self.nlevels = norm.n_levels();
        self.nplanes = norm.n_planes();
        self.z = norm.zpos.clone();
        self.max_slope = norm.max_slope;
        self.store = PatternStore::new();
        self.hash = PatternHash::new(self.nlevels);
        self.stats = TreeStats::default();

        let start = Instant::now();

        let root = self.store.insert(Pattern::zeroed(self.nplanes));
        self.hash.insert(&self.store, root);
        self.make_child_nodes(root, 1);

        self.calc_statistics();
        self.stats.build_time = start.elapsed();

        log::info!(
            "pattern tree built: {} patterns, {} links, {} levels, {} planes in {:?}",
            self.stats.n_patterns,
            self.stats.n_links,
            self.nlevels,
            self.nplanes,
            self.stats.build_time
        );
        log::debug!(
            "tree memory: {} pattern bytes, {} hash bytes, max child list {}, max chain {}",
            self.stats.n_bytes,
            self.stats.n_hash_bytes,
            self.stats.max_child_list,
            self.stats.max_hash_chain
        );

        PatternTree::from_build(&self.store, Link::new(root, LinkKind::Normal), norm)
    }

    /// Statistics of the last build.
    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// The build arena of the last generation.
    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    fn entry_mut(&mut self, id: PatternId) -> &mut HashEntry {
        let bits = self.store.pattern(id).bits().to_vec();
        self.hash
            .find_mut(&self.store, &bits)
            .expect("every stored pattern is hashed")
    }

    /// Generate child nodes for the given parent pattern.
    fn make_child_nodes(&mut self, parent: PatternId, depth: u16) {
        // Being asked for children at this depth means the parent itself is
        // in use one level above.
        if depth > 0 {
            self.entry_mut(parent).used_at_depth(depth - 1);
        }

        if depth >= self.nlevels {
            return;
        }

        if !self.store.pattern(parent).has_children() {
            let parent_bits = self.store.pattern(parent).bits().to_vec();
            for child in ChildIter::new(&parent_bits) {
                match self
                    .hash
                    .find(&self.store, &child.bits)
                    .map(|e| (e.pattern, e.min_depth))
                {
                    Some((existing, min_depth)) => {
                        // A pattern validated only deeper down must pass the
                        // slope bound again; the bound is tighter at small
                        // depth. The line test is depth-independent and
                        // already passed at insertion.
                        if depth >= min_depth || slope_ok(&child.bits, depth, self.max_slope) {
                            self.store
                                .pattern_mut(parent)
                                .add_child(Link::new(existing, child.kind));
                        }
                    }
                    None => {
                        if slope_ok(&child.bits, depth, self.max_slope)
                            && line_ok(&child.bits, &self.z)
                        {
                            let id = self.store.insert(Pattern::from_bits(child.bits));
                            self.hash.insert(&self.store, id);
                            self.store
                                .pattern_mut(parent)
                                .add_child(Link::new(id, child.kind));
                        }
                    }
                }
            }
        }

        let links: Vec<Link> = self.store.pattern(parent).children().to_vec();
        for ln in links {
            let child_bits = self.store.pattern(ln.child).bits().to_vec();
            let min_depth = self
                .hash
                .find(&self.store, &child_bits)
                .expect("linked patterns are hashed")
                .min_depth;
            // Descend if the child has no subtree yet, or if it now appears
            // shallower than before and its subtree must reach deeper down.
            if !self.store.pattern(ln.child).has_children() || min_depth > depth {
                self.make_child_nodes(ln.child, depth + 1);
            }
        }
    }

    /// Collect statistics on the build tree. Averages and memory use can
    /// only be computed once the tree is complete.
    fn calc_statistics(&mut self) {
        let stats = &mut self.stats;
        stats.n_patterns = 0;
        stats.n_links = 0;
        stats.max_child_list = 0;

        for entry in self.hash.entries() {
            stats.n_patterns += 1;
            let n_children = self.store.pattern(entry.pattern).children().len();
            stats.n_links += n_children;
            stats.max_child_list = stats.max_child_list.max(n_children);
        }
        stats.max_hash_chain = self.hash.max_chain();

        stats.n_bytes = stats.n_patterns * std::mem::size_of::<Pattern>()
            + stats.n_patterns * self.nplanes * std::mem::size_of::<u16>()
            + stats.n_links * std::mem::size_of::<Link>();
        stats.n_hash_bytes = self.hash.n_buckets() * std::mem::size_of::<usize>()
            + stats.n_patterns * std::mem::size_of::<HashEntry>();
    }
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_param(max_depth: u16, width: f64, max_slope: f64) -> TreeParam {
        TreeParam {
            max_depth,
            width,
            zpos: vec![0.0, 1.0],
            max_slope,
        }
    }

    #[test]
    fn test_minimal_tree_patterns_and_links() {
        let mut generator = PatternGenerator::new();
        let tree = generator
            .generate(&two_layer_param(1, 1.0, 0.0))
            .unwrap();

        // Only the flat and the one-bin-slope pattern exist.
        assert_eq!(tree.n_patterns(), 2);
        assert_eq!(generator.stats().n_patterns, 2);

        let root = tree.store().pattern(tree.root_link().child);
        assert_eq!(root.bits(), &[0, 0]);
        let kinds: Vec<(Vec<u16>, LinkKind)> = root
            .children()
            .iter()
            .map(|l| (tree.store().pattern(l.child).bits().to_vec(), l.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (vec![0, 0], LinkKind::Shifted),
                (vec![0, 1], LinkKind::Normal),
                (vec![0, 1], LinkKind::Mirrored),
                (vec![0, 0], LinkKind::Normal),
            ]
        );
    }

    #[test]
    fn test_stored_patterns_are_canonical() {
        let mut generator = PatternGenerator::new();
        let tree = generator
            .generate(&TreeParam {
                max_depth: 4,
                width: 2.0,
                zpos: vec![0.0, 0.3, 0.7, 1.0],
                max_slope: 0.3,
            })
            .unwrap();

        for pattern in tree.store().iter() {
            assert_eq!(pattern.bits()[0], 0);
            assert!(pattern.width() >= 0);
            let spread = *pattern.bits().iter().max().unwrap() as i32
                - *pattern.bits().iter().min().unwrap() as i32;
            assert_eq!(spread, pattern.width());
        }
    }

    #[test]
    fn test_links_are_one_level_refinements() {
        let mut generator = PatternGenerator::new();
        let tree = generator
            .generate(&TreeParam {
                max_depth: 3,
                width: 2.0,
                zpos: vec![0.0, 0.5, 1.0],
                max_slope: 0.5,
            })
            .unwrap();

        let store = tree.store();
        for parent in store.iter() {
            for link in parent.children() {
                let child = store.pattern(link.child);
                let width = child.width();
                for (i, &p) in parent.bits().iter().enumerate() {
                    let b = child.bits()[i] as i32;
                    // undo the canonicalization: mirror first, then shift
                    let m = if link.kind.mirrors() { width - b } else { b };
                    let effective = m as u32 + link.kind.shift_bit();
                    let doubled = (p as u32) << 1;
                    assert!(
                        effective == doubled || effective == doubled + 1,
                        "link {:?} -> {:?} ({:?}) is not a refinement",
                        parent.bits(),
                        child.bits(),
                        link.kind
                    );
                }
            }
        }
    }

    #[test]
    fn test_every_stored_pattern_passes_checks_at_min_depth() {
        let mut generator = PatternGenerator::new();
        let param = TreeParam {
            max_depth: 4,
            width: 2.0,
            zpos: vec![0.0, 0.5, 1.0],
            max_slope: 0.25,
        };
        let norm = param.normalized().unwrap();
        generator.generate(&param).unwrap();

        for entry in generator.hash.entries() {
            let pattern = generator.store.pattern(entry.pattern);
            assert!(entry.min_depth < u16::MAX, "pattern never marked used");
            assert!(slope_ok(pattern.bits(), entry.min_depth, norm.max_slope));
            assert!(line_ok(pattern.bits(), &norm.zpos));
        }
    }

    #[test]
    fn test_wider_patterns_appear_with_depth() {
        let mut generator = PatternGenerator::new();
        let tree = generator
            .generate(&two_layer_param(3, 4.0, 1.0))
            .unwrap();

        for b in 0..=4u16 {
            assert!(
                tree.store().iter().any(|p| p.bits() == [0, b]),
                "pattern [0, {}] missing",
                b
            );
        }
    }

    #[test]
    fn test_max_slope_zero_limits_width() {
        let mut generator = PatternGenerator::new();
        let tree = generator
            .generate(&two_layer_param(4, 1.0, 0.0))
            .unwrap();

        for pattern in tree.store().iter() {
            assert!(pattern.width() < 2);
        }
        assert_eq!(tree.n_patterns(), 2);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let mut generator = PatternGenerator::new();
        assert!(generator.generate(&two_layer_param(0, 1.0, 0.0)).is_err());
        assert!(generator.generate(&two_layer_param(3, -1.0, 0.0)).is_err());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let param = TreeParam {
            max_depth: 5,
            width: 2.0,
            zpos: vec![0.0, 0.4, 1.0],
            max_slope: 0.3,
        };
        let tree_a = PatternGenerator::new().generate(&param).unwrap();
        let tree_b = PatternGenerator::new().generate(&param).unwrap();
        assert_eq!(tree_a, tree_b);
    }
}
