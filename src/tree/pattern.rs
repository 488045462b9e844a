//! Bit patterns and the arena that owns them.
//!
//! A [`Pattern`] is an N-tuple of bin numbers, one per detector layer, in
//! canonical form: the first bin is zero and the endpoint width is
//! non-negative. Patterns own their outgoing child links; links carry arena
//! indices, never references, so the self-referential pattern graph (the
//! root links back to itself) stays expressible without shared ownership.

/// Arena index of a pattern in a [`PatternStore`].
pub type PatternId = u32;

/// Transform a parent applies to a referenced child pattern.
///
/// Bit 0 shifts the child one bin to the right, bit 1 mirrors it across its
/// width. To recover the actual child, mirror first, then shift. A
/// simultaneously shifted and mirrored child never occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkKind {
    Normal = 0,
    Shifted = 1,
    Mirrored = 2,
}

impl LinkKind {
    /// Convert from the on-disk tag value.
    #[inline]
    pub fn from_u8(value: u8) -> Option<LinkKind> {
        match value {
            0 => Some(LinkKind::Normal),
            1 => Some(LinkKind::Shifted),
            2 => Some(LinkKind::Mirrored),
            _ => None,
        }
    }

    /// The shift contribution of this link (0 or 1).
    #[inline]
    pub fn shift_bit(self) -> u32 {
        self as u32 & 1
    }

    /// Whether this link mirrors the child.
    #[inline]
    pub fn mirrors(self) -> bool {
        self as u8 & 2 != 0
    }
}

/// A typed reference from a parent pattern to a child pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub child: PatternId,
    pub kind: LinkKind,
}

impl Link {
    #[inline]
    pub fn new(child: PatternId, kind: LinkKind) -> Self {
        Self { child, kind }
    }
}

/// A canonical bit pattern over the detector layers, plus its child links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    bits: Vec<u16>,
    children: Vec<Link>,
}

impl Pattern {
    /// The all-zero pattern (the tree root) over `n` layers.
    pub fn zeroed(n: usize) -> Self {
        Self {
            bits: vec![0; n],
            children: Vec::new(),
        }
    }

    pub fn from_bits(bits: Vec<u16>) -> Self {
        debug_assert!(!bits.is_empty());
        Self {
            bits,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn bits(&self) -> &[u16] {
        &self.bits
    }

    #[inline]
    pub fn n_bits(&self) -> usize {
        self.bits.len()
    }

    /// Signed endpoint width, last bin minus first bin.
    ///
    /// Canonical stored patterns have `width() >= 0`; the candidate filter
    /// guarantees it also equals `max(bits) - min(bits)` for them.
    #[inline]
    pub fn width(&self) -> i32 {
        self.bits[self.bits.len() - 1] as i32 - self.bits[0] as i32
    }

    #[inline]
    pub fn children(&self) -> &[Link] {
        &self.children
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Append a child link. Link order is part of the tree's serialized
    /// form, so children must be added in enumeration order.
    pub fn add_child(&mut self, link: Link) {
        self.children.push(link);
    }
}

/// Hash key of a pattern's bit content.
///
/// Only bucket placement depends on this, never the generated structure,
/// so a simple deterministic fold suffices.
pub(crate) fn hash_bits(bits: &[u16]) -> u32 {
    bits.iter()
        .fold(0u32, |h, &b| h.wrapping_shl(1).wrapping_add(b as u32))
}

/// Indexable owner of all patterns in a tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatternStore {
    patterns: Vec<Pattern>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern, returning its id.
    pub fn insert(&mut self, pattern: Pattern) -> PatternId {
        let id = self.patterns.len() as PatternId;
        self.patterns.push(pattern);
        id
    }

    #[inline]
    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.patterns[id as usize]
    }

    #[inline]
    pub fn pattern_mut(&mut self, id: PatternId) -> &mut Pattern {
        &mut self.patterns[id as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }
}
