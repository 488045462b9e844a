//! Depth-first traversal of the pattern graph.
//!
//! The pattern graph is self-referential: a pattern may be its own
//! descendant through shift links. Traversal therefore tracks the depth
//! coordinate explicitly and stops descending at the tree's level count,
//! while a running [`NodeDescriptor`] accumulates the shift and mirror
//! state along the path.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{RekhaError, Result};

use super::pattern::{Link, LinkKind, Pattern, PatternId, PatternStore};

/// What the walker should do after visiting a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeOp {
    /// Descend into the node's children.
    Recurse,
    /// Prune the subtree below this node.
    SkipChildren,
    /// Abort the walk.
    Terminate,
}

/// Traversal snapshot of one pattern instance.
///
/// `shift` and `mirrored` are cumulative along the path from the root, so
/// the same stored pattern yields a different descriptor for each of its
/// occurrences in the unrolled tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub pattern: PatternId,
    pub kind: LinkKind,
    pub depth: u16,
    pub shift: u32,
    pub mirrored: bool,
}

impl NodeDescriptor {
    /// Actual bin covered on layer `i`, with the mirror applied before the
    /// shift.
    #[inline]
    pub fn bin(&self, pattern: &Pattern, i: usize) -> u32 {
        let b = pattern.bits()[i] as i32;
        let v = if self.mirrored { pattern.width() - b } else { b };
        v as u32 + self.shift
    }
}

/// Visitor applied to every node of a walk.
pub trait NodeVisitor {
    fn visit(&mut self, nd: &NodeDescriptor, store: &PatternStore) -> Result<TreeOp>;
}

/// Pre-order walker over a pattern graph.
#[derive(Clone, Copy, Debug)]
pub struct TreeWalk {
    nlevels: u16,
}

impl TreeWalk {
    pub fn new(nlevels: u16) -> Self {
        Self { nlevels }
    }

    /// Walk the graph below `root`, applying `visitor` to every node.
    pub fn walk<V: NodeVisitor>(
        &self,
        store: &PatternStore,
        root: Link,
        visitor: &mut V,
    ) -> Result<TreeOp> {
        self.visit_node(store, root, 0, 0, false, visitor)
    }

    fn visit_node<V: NodeVisitor>(
        &self,
        store: &PatternStore,
        link: Link,
        depth: u16,
        shift: u32,
        mirrored: bool,
        visitor: &mut V,
    ) -> Result<TreeOp> {
        let nd = NodeDescriptor {
            pattern: link.child,
            kind: link.kind,
            depth,
            shift,
            mirrored,
        };
        let op = visitor.visit(&nd, store)?;
        if op == TreeOp::Recurse && depth + 1 < self.nlevels {
            for ln in store.pattern(link.child).children() {
                let child_shift = (shift << 1) + ln.kind.shift_bit();
                let child_mirrored = mirrored ^ ln.kind.mirrors();
                let ret =
                    self.visit_node(store, *ln, depth + 1, child_shift, child_mirrored, visitor)?;
                if ret == TreeOp::Terminate {
                    return Ok(TreeOp::Terminate);
                }
            }
        }
        Ok(op)
    }
}

/// Counts pattern instances, i.e. every node of the unrolled tree
/// including repeats of shared patterns.
#[derive(Debug, Default)]
pub struct CountPatterns {
    count: u64,
}

impl CountPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl NodeVisitor for CountPatterns {
    fn visit(&mut self, _nd: &NodeDescriptor, _store: &PatternStore) -> Result<TreeOp> {
        self.count += 1;
        Ok(TreeOp::Recurse)
    }
}

/// Prints every actual (shifted and mirrored) pattern of the tree.
///
/// In dump mode each pattern becomes one line of bin numbers; otherwise an
/// ASCII picture with one row per layer is drawn.
pub struct PrintPatterns<'a, W: Write> {
    out: &'a mut W,
    dump: bool,
    count: u64,
}

impl<'a, W: Write> PrintPatterns<'a, W> {
    pub fn new(out: &'a mut W, dump: bool) -> Self {
        Self {
            out,
            dump,
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> NodeVisitor for PrintPatterns<'_, W> {
    fn visit(&mut self, nd: &NodeDescriptor, store: &PatternStore) -> Result<TreeOp> {
        self.count += 1;
        let pattern = store.pattern(nd.pattern);

        if self.dump {
            write!(self.out, "{:2}", nd.depth)?;
            for i in 0..pattern.n_bits() {
                write!(self.out, " {:5}", nd.bin(pattern, i))?;
            }
            writeln!(self.out)?;
        } else {
            let op = (if nd.mirrored { 2 } else { 0 }) + nd.kind.shift_bit();
            for i in 0..pattern.n_bits() {
                let v = nd.bin(pattern, i);
                write!(self.out, "{}-{}", nd.depth, op)?;
                for _ in 0..nd.depth {
                    write!(self.out, " ")?;
                }
                write!(self.out, " |")?;
                for _ in 0..v {
                    write!(self.out, ".")?;
                }
                write!(self.out, "O")?;
                let nbins = 1u32 << nd.depth;
                for _ in v + 1..nbins {
                    write!(self.out, ".")?;
                }
                writeln!(self.out, "|")?;
            }
            writeln!(self.out)?;
        }
        Ok(TreeOp::Recurse)
    }
}

/// Copies a walked graph into a fresh [`PatternStore`], preserving shared
/// structure.
///
/// Uses the same first-occurrence index map as the binary serializer: the
/// first visit of a pattern allocates it in the target store and recurses,
/// a revisit only links the recorded copy and prunes. Parent attachment is
/// tracked with a stack of open nodes and their outstanding child counts,
/// mirroring the walker's depth bound.
pub struct CopyPattern {
    nlevels: u16,
    target: PatternStore,
    map: HashMap<PatternId, PatternId>,
    stack: Vec<(PatternId, usize)>,
    root: Option<Link>,
}

impl CopyPattern {
    pub fn new(nlevels: u16) -> Self {
        Self {
            nlevels,
            target: PatternStore::new(),
            map: HashMap::new(),
            stack: Vec::new(),
            root: None,
        }
    }

    /// Number of distinct patterns copied so far.
    pub fn n_copied(&self) -> usize {
        self.target.len()
    }

    /// Finish the copy, returning the new store and its root link.
    pub fn into_store(self) -> Result<(PatternStore, Link)> {
        if !self.stack.is_empty() {
            return Err(RekhaError::Format(
                "pattern copy ended with unattached children".into(),
            ));
        }
        let root = self
            .root
            .ok_or_else(|| RekhaError::Format("pattern copy saw no nodes".into()))?;
        Ok((self.target, root))
    }
}

impl NodeVisitor for CopyPattern {
    fn visit(&mut self, nd: &NodeDescriptor, store: &PatternStore) -> Result<TreeOp> {
        let (id, inline_children, op) = match self.map.get(&nd.pattern) {
            Some(&id) => (id, 0, TreeOp::SkipChildren),
            None => {
                let source = store.pattern(nd.pattern);
                let id = self
                    .target
                    .insert(Pattern::from_bits(source.bits().to_vec()));
                self.map.insert(nd.pattern, id);
                let inline = if nd.depth + 1 < self.nlevels {
                    source.children().len()
                } else {
                    0
                };
                (id, inline, TreeOp::Recurse)
            }
        };

        let link = Link::new(id, nd.kind);
        match self.stack.last_mut() {
            Some(parent) => {
                debug_assert!(parent.1 > 0);
                self.target.pattern_mut(parent.0).add_child(link);
                parent.1 -= 1;
            }
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(link);
            }
        }

        if inline_children > 0 {
            self.stack.push((id, inline_children));
        } else {
            while matches!(self.stack.last(), Some(&(_, 0))) {
                self.stack.pop();
            }
        }
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-layer store with the root linking to itself (shifted) and to a
    /// sloped child, which again links to itself.
    fn sample_store() -> (PatternStore, Link) {
        let mut store = PatternStore::new();
        let root = store.insert(Pattern::zeroed(2));
        let slope = store.insert(Pattern::from_bits(vec![0, 1]));

        store.pattern_mut(root).add_child(Link::new(root, LinkKind::Shifted));
        store.pattern_mut(root).add_child(Link::new(slope, LinkKind::Normal));
        store.pattern_mut(root).add_child(Link::new(slope, LinkKind::Mirrored));
        store.pattern_mut(slope).add_child(Link::new(slope, LinkKind::Shifted));

        (store, Link::new(root, LinkKind::Normal))
    }

    struct Recorder {
        seen: Vec<(u16, u32, bool)>,
    }

    impl NodeVisitor for Recorder {
        fn visit(&mut self, nd: &NodeDescriptor, _store: &PatternStore) -> Result<TreeOp> {
            self.seen.push((nd.depth, nd.shift, nd.mirrored));
            Ok(TreeOp::Recurse)
        }
    }

    #[test]
    fn test_walk_accumulates_shift_and_mirror() {
        let (store, root) = sample_store();
        let mut rec = Recorder { seen: Vec::new() };
        TreeWalk::new(3).walk(&store, root, &mut rec).unwrap();

        // root, then each child subtree in link order down to depth 2
        assert_eq!(
            rec.seen,
            vec![
                (0, 0, false), // root
                (1, 1, false), // root -> root, shifted
                (2, 3, false), //   -> root, shifted again
                (2, 2, false), //   -> slope
                (2, 2, true),  //   -> slope, mirrored
                (1, 0, false), // root -> slope
                (2, 1, false), //   -> slope -> slope, shifted
                (1, 0, true),  // root -> slope, mirrored
                (2, 1, true),  //   keeps the mirror state
            ]
        );
    }

    #[test]
    fn test_walk_depth_bound() {
        let (store, root) = sample_store();
        let mut count = CountPatterns::new();
        TreeWalk::new(1).walk(&store, root, &mut count).unwrap();
        assert_eq!(count.count(), 1);

        let mut count = CountPatterns::new();
        TreeWalk::new(2).walk(&store, root, &mut count).unwrap();
        assert_eq!(count.count(), 4);
    }

    struct SkipAll;
    impl NodeVisitor for SkipAll {
        fn visit(&mut self, _nd: &NodeDescriptor, _store: &PatternStore) -> Result<TreeOp> {
            Ok(TreeOp::SkipChildren)
        }
    }

    #[test]
    fn test_skip_children_prunes() {
        let (store, root) = sample_store();
        let mut counting_skipper = SkipAll;
        let op = TreeWalk::new(3)
            .walk(&store, root, &mut counting_skipper)
            .unwrap();
        assert_eq!(op, TreeOp::SkipChildren);
    }

    struct StopAt {
        limit: u64,
        seen: u64,
    }
    impl NodeVisitor for StopAt {
        fn visit(&mut self, _nd: &NodeDescriptor, _store: &PatternStore) -> Result<TreeOp> {
            self.seen += 1;
            if self.seen >= self.limit {
                return Ok(TreeOp::Terminate);
            }
            Ok(TreeOp::Recurse)
        }
    }

    #[test]
    fn test_terminate_aborts_walk() {
        let (store, root) = sample_store();
        let mut stopper = StopAt { limit: 3, seen: 0 };
        let op = TreeWalk::new(5).walk(&store, root, &mut stopper).unwrap();
        assert_eq!(op, TreeOp::Terminate);
        assert_eq!(stopper.seen, 3);
    }

    #[test]
    fn test_copy_preserves_shared_structure() {
        let (store, root) = sample_store();
        let mut copy = CopyPattern::new(3);
        TreeWalk::new(3).walk(&store, root, &mut copy).unwrap();
        let (copied, new_root) = copy.into_store().unwrap();

        assert_eq!(copied.len(), store.len());
        assert_eq!(new_root.kind, LinkKind::Normal);
        let r = copied.pattern(new_root.child);
        assert_eq!(r.bits(), &[0, 0]);
        assert_eq!(r.children().len(), 3);
        // self link still points at the root copy
        assert_eq!(r.children()[0], Link::new(new_root.child, LinkKind::Shifted));
    }

    #[test]
    fn test_dump_mode_prints_actual_bins() {
        let (store, root) = sample_store();
        let mut buf = Vec::new();
        let mut print = PrintPatterns::new(&mut buf, true);
        TreeWalk::new(2).walk(&store, root, &mut print).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), ["0", "0", "0"]);
        // shifted root at depth 1 covers bin 1 on both layers
        assert_eq!(lines[1].split_whitespace().collect::<Vec<_>>(), ["1", "1", "1"]);
        // mirrored slope at depth 1 covers bins 1, 0
        assert_eq!(lines[3].split_whitespace().collect::<Vec<_>>(), ["1", "1", "0"]);
    }
}
