use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::{Error, Result};

/// hard cap on code length; assignment fails rather than truncate
pub const MAX_CODE_BITS: usize = 256;

/// huffman tree node, owned by its parent
///
/// decoding always walks from the root, so no parent links are needed;
/// dropping the root frees the whole tree.
pub enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

/// per-symbol code: bit length plus msb-first pattern in a 256-bit field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Code {
    pub len: u16,
    pub bits: [u8; 32],
}

impl Code {
    fn empty() -> Self {
        Self {
            len: 0,
            bits: [0; 32],
        }
    }

    /// the code extended by one bit; callers keep len below MAX_CODE_BITS
    fn with_bit(&self, bit: bool) -> Code {
        let mut next = self.clone();
        if (next.len as usize) < MAX_CODE_BITS {
            if bit {
                next.bits[(next.len / 8) as usize] |= 1 << (7 - next.len % 8);
            }
            next.len += 1;
        }
        next
    }

    /// bit at position i, msb-first
    pub fn bit(&self, i: usize) -> bool {
        (self.bits[i / 8] >> (7 - i % 8)) & 1 == 1
    }
}

struct HeapEntry {
    freq: u64,
    /// tie-break rank: a leaf's symbol value, or 256 + merge counter for
    /// internal nodes, so equal frequencies resolve leaf-first then by
    /// merge order
    rank: u32,
    node: Node,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.freq == other.freq && self.rank == other.rank
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.freq, self.rank).cmp(&(other.freq, other.rank))
    }
}

/// build a huffman tree from a frequency table
///
/// classic min-queue construction: repeatedly merge the two lightest
/// trees until one remains. fully deterministic, so writer and reader
/// derive identical trees from the same table. returns None when every
/// frequency is zero.
pub fn build_tree(freqs: &[u64; 256]) -> Option<Node> {
    let mut heap = BinaryHeap::new();
    for (sym, &freq) in freqs.iter().enumerate() {
        if freq > 0 {
            heap.push(Reverse(HeapEntry {
                freq,
                rank: sym as u32,
                node: Node::Leaf(sym as u8),
            }));
        }
    }
    if heap.is_empty() {
        return None;
    }

    let mut next_rank = 256u32;
    while heap.len() > 1 {
        let Reverse(first) = heap.pop()?;
        let Reverse(second) = heap.pop()?;
        heap.push(Reverse(HeapEntry {
            freq: first.freq + second.freq,
            rank: next_rank,
            node: Node::Internal(Box::new(first.node), Box::new(second.node)),
        }));
        next_rank += 1;
    }

    heap.pop().map(|Reverse(entry)| entry.node)
}

/// assign prefix-free codes: left edge 0, right edge 1
///
/// a single-leaf tree gets the synthesized one-bit code 0.
pub fn assign_codes(root: &Node) -> Result<[Option<Code>; 256]> {
    let mut table: [Option<Code>; 256] = std::array::from_fn(|_| None);
    match root {
        Node::Leaf(sym) => {
            table[*sym as usize] = Some(Code::empty().with_bit(false));
        }
        Node::Internal(..) => walk(root, Code::empty(), &mut table)?,
    }
    Ok(table)
}

fn walk(node: &Node, code: Code, table: &mut [Option<Code>; 256]) -> Result<()> {
    match node {
        Node::Leaf(sym) => {
            table[*sym as usize] = Some(code);
            Ok(())
        }
        Node::Internal(left, right) => {
            if code.len as usize >= MAX_CODE_BITS {
                return Err(Error::CodeTooLong(code.len as usize + 1));
            }
            walk(left, code.with_bit(false), table)?;
            walk(right, code.with_bit(true), table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freq_table(pairs: &[(u8, u64)]) -> [u64; 256] {
        let mut freqs = [0u64; 256];
        for &(sym, f) in pairs {
            freqs[sym as usize] = f;
        }
        freqs
    }

    fn codes_for(pairs: &[(u8, u64)]) -> [Option<Code>; 256] {
        let tree = build_tree(&freq_table(pairs)).unwrap();
        assign_codes(&tree).unwrap()
    }

    #[test]
    fn test_single_symbol_gets_one_bit_code() {
        let codes = codes_for(&[(b'a', 3)]);
        let code = codes[b'a' as usize].as_ref().unwrap();
        assert_eq!(code.len, 1);
        assert!(!code.bit(0));
    }

    #[test]
    fn test_code_lengths_follow_frequencies() {
        let codes = codes_for(&[(b'a', 3), (b'b', 1), (b'c', 2), (b'd', 1)]);

        assert_eq!(codes[b'a' as usize].as_ref().unwrap().len, 1);
        assert_eq!(codes[b'c' as usize].as_ref().unwrap().len, 2);
        assert_eq!(codes[b'b' as usize].as_ref().unwrap().len, 3);
        assert_eq!(codes[b'd' as usize].as_ref().unwrap().len, 3);
    }

    #[test]
    fn test_only_present_symbols_get_codes() {
        let codes = codes_for(&[(b'x', 5), (b'y', 1)]);
        let assigned = codes.iter().filter(|c| c.is_some()).count();
        assert_eq!(assigned, 2);
        assert!(codes[b'z' as usize].is_none());
    }

    #[test]
    fn test_empty_table_has_no_tree() {
        assert!(build_tree(&[0u64; 256]).is_none());
    }

    #[test]
    fn test_deterministic_construction() {
        let pairs = [(b'a', 2), (b'b', 2), (b'c', 2), (b'd', 2), (b'\n', 1)];
        let first = codes_for(&pairs);
        let second = codes_for(&pairs);
        for sym in 0..256 {
            assert_eq!(first[sym], second[sym]);
        }
    }

    #[test]
    fn test_prefix_free() {
        // uneven distribution to force a deep tree
        let pairs: Vec<(u8, u64)> = (0..20u8).map(|s| (s, 1u64 << (s / 2))).collect();
        let codes = codes_for(&pairs);

        let assigned: Vec<&Code> = codes.iter().flatten().collect();
        for (i, a) in assigned.iter().enumerate() {
            for (j, b) in assigned.iter().enumerate() {
                if i == j {
                    continue;
                }
                let shorter = a.len.min(b.len) as usize;
                let is_prefix = (0..shorter).all(|k| a.bit(k) == b.bit(k));
                assert!(
                    !(is_prefix && a.len <= b.len),
                    "code {i} is a prefix of code {j}"
                );
            }
        }
    }
}
