//! Hierarchical softmax output layer: a Huffman tree over word counts.

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;

/// Longest code a word may have.
pub const MAX_CODE_LENGTH: usize = 40;

/// Count of an internal node not yet created.
const UNSET: u64 = 1_000_000_000_000_000;

// Create binary Huffman tree using the word counts.
// Frequent words will have short unique binary codes.
//
// Nodes live in one index space: leaves are `0..n` (the word ids, sorted by
// descending count) and internal nodes are `n..2n-1` in creation order. Because
// leaves are sorted and merged counts never decrease, the two smallest
// candidates are always at the heads of two scans: `pos1` walking the leaves
// backwards and `pos2` walking the internal nodes forwards.
#[allow(clippy::needless_range_loop)]
pub fn create_binary_tree(vocab: &mut Vocabulary) -> Result<()> {
    let vocab_size = vocab.len();
    let words = vocab.words_mut();
    if vocab_size == 0 {
        return Ok(());
    }
    if vocab_size == 1 {
        // No internal nodes; predict through the padding row.
        words[0].code = vec![0];
        words[0].path = vec![0];
        return Ok(());
    }

    let num_nodes = vocab_size * 2 - 1;
    let mut count = vec![UNSET; num_nodes];
    let mut binary = vec![0u8; num_nodes]; // which child a node is of its parent (0 or 1)
    let mut parent_node = vec![0usize; num_nodes];
    for a in 0..vocab_size {
        count[a] = words[a].count;
    }

    // `pos1` is one past the next leaf candidate.
    let mut pos1 = vocab_size;
    let mut pos2 = vocab_size;
    let mut take_smallest = |count: &[u64]| {
        if pos1 > 0 && count[pos1 - 1] < count[pos2] {
            pos1 -= 1;
            pos1
        } else {
            pos2 += 1;
            pos2 - 1
        }
    };
    for a in 0..(vocab_size - 1) {
        let min1i = take_smallest(&count);
        let min2i = take_smallest(&count);
        count[vocab_size + a] = count[min1i] + count[min2i];
        parent_node[min1i] = vocab_size + a;
        parent_node[min2i] = vocab_size + a;
        binary[min2i] = 1;
    }

    // Now assign binary code to each vocabulary word
    let root = num_nodes - 1;
    for a in 0..vocab_size {
        let mut code: Vec<u8> = Vec::with_capacity(MAX_CODE_LENGTH);
        let mut path: Vec<u32> = Vec::with_capacity(MAX_CODE_LENGTH);
        let mut b = a;
        loop {
            if !code.is_empty() {
                path.push((b - vocab_size) as u32);
            }
            code.push(binary[b]);
            b = parent_node[b];
            if b == root {
                break;
            }
        }
        path.push((root - vocab_size) as u32);
        if code.len() > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLong {
                word: words[a].word.clone(),
                length: code.len(),
                max: MAX_CODE_LENGTH,
            });
        }
        code.reverse();
        path.reverse();
        words[a].code = code;
        words[a].path = path;
    }
    Ok(())
}
