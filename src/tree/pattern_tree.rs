//! The immutable pattern template database served to event search.

use std::path::Path;

use crate::error::Result;

use super::config::TreeParam;
use super::pattern::{Link, PatternStore};
use super::serialization;
use super::walk::{CopyPattern, NodeVisitor, TreeOp, TreeWalk};

/// Precomputed template database of straight-line patterns.
///
/// Immutable once built; event workers may share it read-only. Produced
/// either by [`PatternGenerator`](super::PatternGenerator) or by loading a
/// tree file.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTree {
    param: TreeParam,
    store: PatternStore,
    root: Link,
}

impl PatternTree {
    /// Copy a build graph into a compact tree of its own.
    ///
    /// The copy assigns pattern ids in first-visit order of the walk, the
    /// same order the serializer uses, so a generated tree and its
    /// round-tripped image are structurally identical.
    pub fn from_build(store: &PatternStore, root: Link, param: TreeParam) -> Result<PatternTree> {
        let nlevels = param.n_levels();
        let mut copy = CopyPattern::new(nlevels);
        TreeWalk::new(nlevels).walk(store, root, &mut copy)?;
        let (store, root) = copy.into_store()?;
        Ok(PatternTree { param, store, root })
    }

    /// Assemble a tree from already-deserialized parts.
    pub(crate) fn from_parts(param: TreeParam, store: PatternStore, root: Link) -> PatternTree {
        PatternTree { param, store, root }
    }

    /// Apply a visitor to every node, depth first.
    pub fn walk<V: NodeVisitor>(&self, visitor: &mut V) -> Result<TreeOp> {
        TreeWalk::new(self.n_levels()).walk(&self.store, self.root, visitor)
    }

    #[inline]
    pub fn n_levels(&self) -> u16 {
        self.param.n_levels()
    }

    #[inline]
    pub fn n_planes(&self) -> usize {
        self.param.n_planes()
    }

    #[inline]
    pub fn zpos(&self) -> &[f64] {
        &self.param.zpos
    }

    #[inline]
    pub fn param(&self) -> &TreeParam {
        &self.param
    }

    #[inline]
    pub fn root_link(&self) -> Link {
        self.root
    }

    #[inline]
    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    /// Number of distinct stored patterns.
    #[inline]
    pub fn n_patterns(&self) -> usize {
        self.store.len()
    }

    /// Write the tree to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serialization::save(self, path)
    }

    /// Read a tree from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PatternTree> {
        serialization::load(path)
    }
}
