//! Build-time pattern tree: generation, traversal and serialization of
//! the straight-line template database.

mod child_iter;
mod config;
mod generator;
mod geometry;
mod hash;
mod pattern;
mod pattern_tree;
mod serialization;
mod walk;

pub use child_iter::{Child, ChildIter};
pub use config::TreeParam;
pub use generator::{PatternGenerator, TreeStats};
pub use geometry::{line_ok, slope_ok};
pub use pattern::{Link, LinkKind, Pattern, PatternId, PatternStore};
pub use pattern_tree::PatternTree;
pub use serialization::{index_size, write_records};
pub use walk::{
    CopyPattern, CountPatterns, NodeDescriptor, NodeVisitor, PrintPatterns, TreeOp, TreeWalk,
};
