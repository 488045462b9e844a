//! Matching tree patterns against the event hitpattern.

use crate::core::types::HitSet;
use crate::error::Result;
use crate::tree::{NodeDescriptor, NodeVisitor, PatternStore, TreeOp};

use super::hitpattern::Hitpattern;

/// Allowed combinations of missing layers, indexed by missing-layer bitmap.
#[derive(Clone, Debug)]
pub struct LayerCombos {
    allowed: Vec<bool>,
}

impl LayerCombos {
    /// Allow every combination with at most `max_missing` missing layers.
    pub fn with_max_missing(n_layers: usize, max_missing: u32) -> Self {
        debug_assert!(n_layers < 32);
        let allowed = (0..1u32 << n_layers)
            .map(|combo| combo.count_ones() <= max_missing)
            .collect();
        Self { allowed }
    }

    /// Additionally allow one specific missing-layer combination.
    pub fn allow(&mut self, combo: u32) {
        self.allowed[combo as usize] = true;
    }

    #[inline]
    pub fn is_allowed(&self, combo: u32) -> bool {
        self.allowed[combo as usize]
    }
}

/// How much of a matched pattern has been claimed by roads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Consumption {
    #[default]
    Unused,
    /// Shares some of its hits with a road.
    Partial,
    /// All of its hits are in a road's common set; must not join another.
    Full,
}

/// One pattern instance matching the event, with the hits that fired it.
#[derive(Clone, Debug)]
pub struct MatchRecord {
    pub node: NodeDescriptor,
    /// Actual bin per layer at the node's depth.
    pub bins: Vec<u16>,
    pub hits: HitSet,
    pub used: Consumption,
}

/// Visitor comparing every tree node with the hitpattern.
///
/// Nodes are tested at every depth on the way down and the walk never
/// prunes; a node whose missing-layer combination is allowed and that sits
/// at the deepest level is recorded as a match together with the hits of
/// its satisfied bins.
pub struct ComparePattern<'a> {
    hitpattern: &'a Hitpattern,
    combos: &'a LayerCombos,
    nlevels: u16,
    matches: &'a mut Vec<MatchRecord>,
}

impl<'a> ComparePattern<'a> {
    pub fn new(
        hitpattern: &'a Hitpattern,
        combos: &'a LayerCombos,
        nlevels: u16,
        matches: &'a mut Vec<MatchRecord>,
    ) -> Self {
        Self {
            hitpattern,
            combos,
            nlevels,
            matches,
        }
    }
}

impl NodeVisitor for ComparePattern<'_> {
    fn visit(&mut self, nd: &NodeDescriptor, store: &PatternStore) -> Result<TreeOp> {
        let pattern = store.pattern(nd.pattern);
        let n = pattern.n_bits();

        let mut missing = 0u32;
        let mut bins = Vec::with_capacity(n);
        for layer in 0..n {
            let bin = nd.bin(pattern, layer);
            bins.push(bin as u16);
            if !self.hitpattern.test(layer, nd.depth, bin as usize) {
                missing |= 1 << layer;
            }
        }

        if nd.depth + 1 == self.nlevels && self.combos.is_allowed(missing) {
            let mut hits = HitSet::new();
            for layer in 0..n {
                if missing & (1 << layer) == 0 {
                    hits.extend(
                        self.hitpattern
                            .hits_in_bin(layer, bins[layer] as usize)
                            .iter()
                            .copied(),
                    );
                }
            }
            self.matches.push(MatchRecord {
                node: *nd,
                bins,
                hits,
                used: Consumption::Unused,
            });
        }

        // Children at finer resolution may refine this node's match.
        Ok(TreeOp::Recurse)
    }
}
