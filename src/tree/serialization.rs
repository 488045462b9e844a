//! Binary tree file round-trip.
//!
//! The pattern graph has shared nodes, so the record stream uses
//! first-occurrence encoding: the first visit of a pattern writes its state
//! inline and recurses over its children, every later reference writes only
//! the index the pattern got on first emission and prunes. All integers are
//! big-endian regardless of host, written byte by byte.
//!
//! A file is the record stream prefixed with a magic/version/parameter
//! header; the bare stream is exposed separately for tests and embedding.
//!
//! # Record format
//!
//! ```text
//! tag (1 byte):  high bit set   -> new pattern, link type = tag & 0x7f
//!                high bit clear -> back-reference, link type = tag
//! new pattern:   bins[1..n] (bin_size bytes each), child count (u16),
//!                then the child records inline
//! back-ref:      pattern index (idx_size bytes)
//! ```
//!
//! `bin_size` is the number of bytes a finest-resolution bin value needs;
//! `idx_size` (1, 2 or 4) is chosen from the total pattern count.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{RekhaError, Result};

use super::config::TreeParam;
use super::pattern::{Link, LinkKind, Pattern, PatternId, PatternStore};
use super::pattern_tree::PatternTree;
use super::walk::{NodeDescriptor, NodeVisitor, TreeOp};

use std::collections::HashMap;

// Tree file format constants
const TREE_MAGIC: u32 = 0x524B_5054; // "RKPT"
const TREE_VERSION: u32 = 1;

/// Index bytes needed to back-reference any of `n_patterns` patterns.
pub fn index_size(n_patterns: usize) -> usize {
    if n_patterns < 1 << 8 {
        1
    } else if n_patterns < 1 << 16 {
        2
    } else {
        4
    }
}

/// Bytes needed for a finest-resolution bin value.
fn bin_size(nlevels: u16) -> usize {
    (nlevels as usize - 1 + 7) / 8
}

fn write_uint_be<W: Write>(out: &mut W, value: u64, size: usize) -> std::io::Result<()> {
    let bytes = value.to_be_bytes();
    out.write_all(&bytes[8 - size..])
}

fn read_uint_be<R: Read>(input: &mut R, size: usize) -> std::io::Result<u64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes[8 - size..])?;
    Ok(u64::from_be_bytes(bytes))
}

fn write_f64_be<W: Write>(out: &mut W, value: f64) -> std::io::Result<()> {
    out.write_all(&value.to_bits().to_be_bytes())
}

fn read_f64_be<R: Read>(input: &mut R) -> std::io::Result<f64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(f64::from_bits(u64::from_be_bytes(bytes)))
}

/// Serializing visitor: first-occurrence emission with back-references.
struct WritePattern<'a, W: Write> {
    out: &'a mut W,
    nlevels: u16,
    idx_size: usize,
    bin_size: usize,
    map: HashMap<PatternId, u32>,
}

impl<W: Write> NodeVisitor for WritePattern<'_, W> {
    fn visit(&mut self, nd: &NodeDescriptor, store: &PatternStore) -> Result<TreeOp> {
        match self.map.get(&nd.pattern) {
            None => {
                let index = self.map.len() as u32;
                self.map.insert(nd.pattern, index);
                let pattern = store.pattern(nd.pattern);

                // Header for a new pattern: link type with the high bit set
                self.out.write_all(&[nd.kind as u8 | 0x80])?;
                // Pattern state; bits[0] is always 0 and is skipped
                for &b in &pattern.bits()[1..] {
                    write_uint_be(self.out, b as u64, self.bin_size)?;
                }
                // Child records follow inline, but only down to the level
                // bound; the count must describe what is actually emitted.
                let n_inline = if nd.depth + 1 < self.nlevels {
                    pattern.children().len()
                } else {
                    0
                };
                write_uint_be(self.out, n_inline as u64, 2)?;
                Ok(TreeOp::Recurse)
            }
            Some(&index) => {
                // Back-reference: the plain link type
                self.out.write_all(&[nd.kind as u8])?;
                write_uint_be(self.out, index as u64, self.idx_size)?;
                Ok(TreeOp::SkipChildren)
            }
        }
    }
}

/// Write the bare record stream of a tree.
pub fn write_records<W: Write>(tree: &PatternTree, out: &mut W) -> Result<()> {
    let mut visitor = WritePattern {
        out,
        nlevels: tree.n_levels(),
        idx_size: index_size(tree.n_patterns()),
        bin_size: bin_size(tree.n_levels()),
        map: HashMap::new(),
    };
    tree.walk(&mut visitor)?;
    Ok(())
}

struct RecordReader<'a, R: Read> {
    input: &'a mut R,
    nplanes: usize,
    nlevels: u16,
    idx_size: usize,
    bin_size: usize,
    store: PatternStore,
}

impl<R: Read> RecordReader<'_, R> {
    fn read_node(&mut self, depth: u16) -> Result<Link> {
        let mut tag = [0u8; 1];
        self.input.read_exact(&mut tag)?;
        let tag = tag[0];

        if tag & 0x80 != 0 {
            let kind = LinkKind::from_u8(tag & 0x7f)
                .ok_or_else(|| RekhaError::Format(format!("unknown link type in tag {tag:#04x}")))?;
            let mut bits = vec![0u16; self.nplanes];
            for b in bits.iter_mut().skip(1) {
                *b = read_uint_be(self.input, self.bin_size)? as u16;
            }
            let n_children = read_uint_be(self.input, 2)? as usize;
            let id = self.store.insert(Pattern::from_bits(bits));

            if depth + 1 < self.nlevels {
                for _ in 0..n_children {
                    let child = self.read_node(depth + 1)?;
                    self.store.pattern_mut(id).add_child(child);
                }
            } else if n_children != 0 {
                return Err(RekhaError::Format(
                    "node at the deepest level claims inline children".into(),
                ));
            }
            Ok(Link::new(id, kind))
        } else {
            let kind = LinkKind::from_u8(tag)
                .ok_or_else(|| RekhaError::Format(format!("unknown link type in tag {tag:#04x}")))?;
            let index = read_uint_be(self.input, self.idx_size)? as usize;
            if index >= self.store.len() {
                return Err(RekhaError::Format(format!(
                    "back-reference {} out of range (have {} patterns)",
                    index,
                    self.store.len()
                )));
            }
            Ok(Link::new(index as PatternId, kind))
        }
    }
}

/// Read a bare record stream back into a store.
pub(crate) fn read_records<R: Read>(
    input: &mut R,
    nplanes: usize,
    nlevels: u16,
    idx_size: usize,
    bin_size: usize,
) -> Result<(PatternStore, Link)> {
    let mut reader = RecordReader {
        input,
        nplanes,
        nlevels,
        idx_size,
        bin_size,
        store: PatternStore::new(),
    };
    let root = reader.read_node(0)?;
    Ok((reader.store, root))
}

/// Write a tree to a binary file.
pub fn save<P: AsRef<Path>>(tree: &PatternTree, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    let param = tree.param();

    write_uint_be(&mut out, TREE_MAGIC as u64, 4)?;
    write_uint_be(&mut out, TREE_VERSION as u64, 4)?;
    write_uint_be(&mut out, param.max_depth as u64, 2)?;
    write_uint_be(&mut out, tree.n_planes() as u64, 2)?;
    write_uint_be(&mut out, tree.n_patterns() as u64, 4)?;
    write_uint_be(&mut out, index_size(tree.n_patterns()) as u64, 1)?;
    write_uint_be(&mut out, bin_size(tree.n_levels()) as u64, 1)?;
    write_f64_be(&mut out, param.width)?;
    write_f64_be(&mut out, param.max_slope)?;
    for &z in &param.zpos {
        write_f64_be(&mut out, z)?;
    }

    write_records(tree, &mut out)?;
    out.flush()?;

    log::debug!(
        "wrote pattern tree: {} patterns, {} planes",
        tree.n_patterns(),
        tree.n_planes()
    );
    Ok(())
}

/// Read a tree from a binary file. Any inconsistency discards the partial
/// tree and surfaces as a format error.
pub fn load<P: AsRef<Path>>(path: P) -> Result<PatternTree> {
    let file = File::open(path)?;
    let mut input = BufReader::new(file);

    let magic = read_uint_be(&mut input, 4)? as u32;
    if magic != TREE_MAGIC {
        return Err(RekhaError::Format(format!(
            "bad magic number {magic:#010x}"
        )));
    }
    let version = read_uint_be(&mut input, 4)? as u32;
    if version != TREE_VERSION {
        return Err(RekhaError::Format(format!(
            "unsupported tree file version {version}"
        )));
    }

    let max_depth = read_uint_be(&mut input, 2)? as u16;
    let nplanes = read_uint_be(&mut input, 2)? as usize;
    let n_patterns = read_uint_be(&mut input, 4)? as usize;
    let idx_size = read_uint_be(&mut input, 1)? as usize;
    let bsize = read_uint_be(&mut input, 1)? as usize;
    let width = read_f64_be(&mut input)?;
    let max_slope = read_f64_be(&mut input)?;

    if !(1..=16).contains(&max_depth) || nplanes < 2 {
        return Err(RekhaError::Format(format!(
            "implausible tree geometry: max_depth {max_depth}, {nplanes} planes"
        )));
    }
    let nlevels = max_depth + 1;
    if !matches!(idx_size, 1 | 2 | 4) || bsize != bin_size(nlevels) {
        return Err(RekhaError::Format(format!(
            "inconsistent field sizes: idx {idx_size}, bin {bsize}"
        )));
    }

    let mut zpos = Vec::with_capacity(nplanes);
    for _ in 0..nplanes {
        zpos.push(read_f64_be(&mut input)?);
    }

    let (store, root) = read_records(&mut input, nplanes, nlevels, idx_size, bsize)?;
    if store.len() != n_patterns {
        return Err(RekhaError::Format(format!(
            "pattern count mismatch: header says {}, stream has {}",
            n_patterns,
            store.len()
        )));
    }

    let param = TreeParam {
        max_depth,
        width,
        zpos,
        max_slope,
    };
    Ok(PatternTree::from_parts(param, store, root))
}
