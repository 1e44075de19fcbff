//! Edge splitting shared by the batch trie and the persistent merge engine

use crate::error::{Result, TrieError};
use crate::index::storage::EdgeRecord;
use crate::index::types::{LabelRange, NIL};

/// An edge that can be cut in two at a label offset
pub trait SplitEdge: Sized {
    fn range(&self) -> LabelRange;

    /// Build the `(head, tail)` pair over the given ranges.
    ///
    /// The head carries no positions and no destination; the tail keeps the
    /// destination and positions of `self`.
    fn divide(self, head: LabelRange, tail: LabelRange) -> (Self, Self);
}

/// Cut `edge` after `prefix_len` labels.
///
/// The caller points the head at a new intermediate node and attaches the
/// tail to that node. Both parts must be non-empty.
pub fn split_edge<E: SplitEdge>(edge: E, prefix_len: u64) -> Result<(E, E)> {
    let range = edge.range();
    if prefix_len == 0 || prefix_len >= range.len() {
        return Err(TrieError::invariant(format!(
            "cannot split edge {}..{} after {} labels",
            range.start, range.end, prefix_len
        )));
    }
    let cut = range.start + prefix_len;
    Ok(edge.divide(
        LabelRange::new(range.start, cut),
        LabelRange::new(cut, range.end),
    ))
}

impl SplitEdge for EdgeRecord {
    fn range(&self) -> LabelRange {
        self.range
    }

    fn divide(self, head: LabelRange, tail: LabelRange) -> (Self, Self) {
        (
            EdgeRecord::new(head, NIL),
            EdgeRecord {
                range: tail,
                dest: self.dest,
                pos_block: self.pos_block,
            },
        )
    }
}
