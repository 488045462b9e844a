//! Enumeration of candidate child patterns under resolution doubling.
//!
//! Each bin of a parent pattern splits in two when the resolution doubles,
//! so a parent with N bits has up to `2^N` candidate children: child bit `i`
//! is `2 * parent[i]` or `2 * parent[i] + 1`. Candidates whose extremal bins
//! stick out beyond the endpoint width are dropped; the survivors are
//! normalized (first bin forced to zero, recorded as a shift) and
//! canonicalized (negative-width patterns mirrored).

use super::pattern::LinkKind;

/// One candidate child pattern together with the transform that relates it
/// to the enumerated position under its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Child {
    pub bits: Vec<u16>,
    pub kind: LinkKind,
}

/// Iterator over the suitable child patterns of a parent pattern.
///
/// Trials run from `2^N - 1` down to 0; this order is part of the tree's
/// serialized form. The iterator is finite and restarted only by
/// constructing a new one.
pub struct ChildIter<'a> {
    parent: &'a [u16],
    trial: u32,
}

impl<'a> ChildIter<'a> {
    pub fn new(parent: &'a [u16]) -> Self {
        debug_assert!(parent.len() >= 2 && parent.len() < 32);
        Self {
            parent,
            trial: 1u32 << parent.len(),
        }
    }
}

impl Iterator for ChildIter<'_> {
    type Item = Child;

    fn next(&mut self) -> Option<Child> {
        while self.trial > 0 {
            self.trial -= 1;
            let c = self.trial;

            let bits: Vec<u16> = self
                .parent
                .iter()
                .enumerate()
                .map(|(i, &b)| (b << 1) + ((c >> i) & 1) as u16)
                .collect();

            let minbit = *bits.iter().min().unwrap() as i32;
            let maxbit = *bits.iter().max().unwrap() as i32;
            let width = bits[bits.len() - 1] as i32 - bits[0] as i32;
            if maxbit - minbit > width.abs() {
                continue;
            }

            let mut bits = bits;
            let shifted = minbit > 0;
            if shifted {
                // minbit can only be 1 here since parent[0] == 0
                for b in &mut bits {
                    *b -= 1;
                }
            }
            let mirrored = width < 0;
            if mirrored {
                let w = (-width) as u16;
                for b in &mut bits {
                    *b = w - *b;
                }
            }
            debug_assert!(!(shifted && mirrored));

            let kind = if mirrored {
                LinkKind::Mirrored
            } else if shifted {
                LinkKind::Shifted
            } else {
                LinkKind::Normal
            };
            return Some(Child { bits, kind });
        }
        None
    }
}
