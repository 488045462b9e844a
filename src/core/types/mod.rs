//! Core data types for track reconstruction.
//!
//! - [`WireHit`]: a single drift-chamber hit with its wire and timing data
//! - [`ProjKind`]: the wire-angle family a plane belongs to
//! - [`HitSet`]: an ordered set of hit indices used for road building

mod hit;

pub use hit::{sort_hits, HitSet, ProjKind, WireHit};
