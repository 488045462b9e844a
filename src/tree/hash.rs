//! Deduplicating dictionary of patterns keyed on bit content.
//!
//! Every distinct pattern is stored once in the arena; the hash table maps
//! bit content back to its id and remembers the shallowest depth at which
//! the pattern has been validated. That depth matters because the slope
//! bound is looser at small depths: a pattern first accepted deep in the
//! tree must be re-checked before it may be referenced from a shallower
//! level.

use super::pattern::{hash_bits, PatternId, PatternStore};

/// Table entry for one stored pattern.
#[derive(Clone, Copy, Debug)]
pub struct HashEntry {
    pub pattern: PatternId,
    /// Shallowest depth at which this pattern has been validated.
    /// Starts unvalidated (`u16::MAX`).
    pub min_depth: u16,
}

impl HashEntry {
    /// Record a use of the pattern at the given depth.
    #[inline]
    pub fn used_at_depth(&mut self, depth: u16) {
        if depth < self.min_depth {
            self.min_depth = depth;
        }
    }
}

/// Chained hash table over pattern bit content.
///
/// `2^(nlevels-1) * 2^(nplanes-2)` is the upper limit for the number of
/// patterns, so `2^(nlevels-1)` buckets keep the expected chain length at
/// `2^(nplanes-2)`, which is livable. New entries go to the chain head.
#[derive(Debug)]
pub struct PatternHash {
    buckets: Vec<Vec<HashEntry>>,
}

impl PatternHash {
    pub fn new(nlevels: u16) -> Self {
        debug_assert!(nlevels >= 1);
        Self {
            buckets: vec![Vec::new(); 1usize << (nlevels - 1)],
        }
    }

    #[inline]
    fn bucket_of(&self, bits: &[u16]) -> usize {
        hash_bits(bits) as usize % self.buckets.len()
    }

    /// Add a stored pattern to the table. The entry starts unvalidated.
    pub fn insert(&mut self, store: &PatternStore, id: PatternId) {
        let bucket = self.bucket_of(store.pattern(id).bits());
        self.buckets[bucket].insert(
            0,
            HashEntry {
                pattern: id,
                min_depth: u16::MAX,
            },
        );
    }

    /// Look up a pattern by bit content.
    pub fn find(&self, store: &PatternStore, bits: &[u16]) -> Option<&HashEntry> {
        self.buckets[self.bucket_of(bits)]
            .iter()
            .find(|e| store.pattern(e.pattern).bits() == bits)
    }

    /// Look up a pattern by bit content, for min-depth updates.
    pub fn find_mut(&mut self, store: &PatternStore, bits: &[u16]) -> Option<&mut HashEntry> {
        let bucket = self.bucket_of(bits);
        self.buckets[bucket]
            .iter_mut()
            .find(|e| store.pattern(e.pattern).bits() == bits)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HashEntry> {
        self.buckets.iter().flatten()
    }

    pub fn n_entries(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Length of the longest collision chain.
    pub fn max_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }
}
