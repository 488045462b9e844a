//! RekhaTrack - pattern-tree track reconstruction for layered wire-chamber
//! detectors
//!
//! # Architecture
//!
//! The crate is organized into 3 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    search/                          │  ← Event-time search
//! │    (hitpattern, pattern matching, road building)    │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     tree/                           │  ← Template database
//! │   (generation, traversal, binary serialization)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (hits, orderings)                   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Phases
//!
//! ## Build phase (one-shot, at setup time)
//!
//! [`PatternGenerator`] enumerates every bit pattern a straight line of
//! bounded slope can produce across the detector layers, at every
//! resolution up to the configured depth. Patterns are deduplicated
//! through a hash table and shared between parents via typed links
//! (plain, shifted, mirrored), so the result is a self-referential DAG
//! compressed far below its unrolled size. The finished [`PatternTree`]
//! can be written to a portable big-endian binary file and reloaded.
//!
//! ## Serve phase (per event)
//!
//! Raw wire hits fill a per-layer [`Hitpattern`] bitmap. Walking the tree
//! with the [`ComparePattern`] visitor yields the pattern instances
//! matching the event; [`Road`] builders then cluster compatible matches
//! into candidate tracks sharing a common hit core, ready for downstream
//! fitting. [`HitPairIter`] pairs hits from companion planes for that
//! analysis.
//!
//! The pattern tree is immutable after generation and may be shared
//! read-only across event workers; all per-event state lives in
//! [`Projection`].

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Pattern tree (depends on core)
// ============================================================================
pub mod tree;

// ============================================================================
// Layer 3: Event search (depends on core, tree)
// ============================================================================
pub mod search;

pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

pub use crate::error::{RekhaError, Result};

// Core types
pub use crate::core::types::{sort_hits, HitSet, ProjKind, WireHit};

// Tree building and traversal
pub use crate::tree::{
    CountPatterns, Link, LinkKind, NodeDescriptor, NodeVisitor, Pattern, PatternGenerator,
    PatternId, PatternStore, PatternTree, PrintPatterns, TreeOp, TreeParam, TreeStats, TreeWalk,
};

// Event search
pub use crate::search::{
    ComparePattern, Consumption, HitPair, HitPairIter, Hitpattern, LayerCombos, MatchRecord,
    Projection, ProjectionConfig, Road,
};
