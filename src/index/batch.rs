//! In-memory trie accumulating one batch of statements
//!
//! Nodes and edges live in two arenas and refer to each other by index.
//! Edge labels are ranges into a batch-local linearization buffer holding
//! batch-local label ids; [`PersistentTrie::add_trie`] translates them when
//! the batch is merged.
//!
//! [`PersistentTrie::add_trie`]: crate::index::trie::PersistentTrie::add_trie

use crate::error::{Result, TrieError};
use crate::index::dict::Interner;
use crate::index::split::{SplitEdge, split_edge};
use crate::index::types::{LabelId, LabelRange, Pos, TrieKind};

/// Index of a node in the batch arena; 0 is the root
pub type BatchNodeId = usize;

type BatchEdgeId = usize;

#[derive(Debug, Clone, Default)]
pub struct BatchEdge {
    pub range: LabelRange,
    pub dest: Option<BatchNodeId>,
    pub positions: Vec<Pos>,
}

impl SplitEdge for BatchEdge {
    fn range(&self) -> LabelRange {
        self.range
    }

    fn divide(self, head: LabelRange, tail: LabelRange) -> (Self, Self) {
        (
            BatchEdge {
                range: head,
                dest: None,
                positions: Vec::new(),
            },
            BatchEdge {
                range: tail,
                dest: self.dest,
                positions: self.positions,
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
struct BatchNode {
    edges: Vec<BatchEdgeId>,
}

pub struct BatchTrie {
    kind: TrieKind,
    labels: Interner,
    buffer: Vec<LabelId>,
    nodes: Vec<BatchNode>,
    edges: Vec<BatchEdge>,
    next_stmt: Vec<(Pos, Pos)>,
    position_count: usize,
}

impl BatchTrie {
    pub const ROOT: BatchNodeId = 0;

    pub fn new(kind: TrieKind) -> Self {
        Self {
            kind,
            labels: Interner::new(),
            buffer: Vec::new(),
            nodes: vec![BatchNode::default()],
            edges: Vec::new(),
            next_stmt: Vec::new(),
            position_count: 0,
        }
    }

    pub fn kind(&self) -> TrieKind {
        self.kind
    }

    /// Insert one statement's label sequence, attaching `pos` where it ends
    pub fn add<S: AsRef<str>>(&mut self, labels: &[S], pos: Option<Pos>) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let ids: Vec<LabelId> = labels
            .iter()
            .map(|label| self.labels.intern(label.as_ref()))
            .collect();

        match self.kind {
            TrieKind::Compressed => self.insert_compressed(&ids, pos),
            TrieKind::Plain => {
                self.insert_plain(&ids, pos);
                Ok(())
            }
        }
    }

    /// Record that `curr` directly follows `prev` in the same block
    pub fn next_stmt(&mut self, prev: Pos, curr: Pos) {
        self.next_stmt.push((prev, curr));
    }

    fn insert_compressed(&mut self, ids: &[LabelId], pos: Option<Pos>) -> Result<()> {
        let mut node = Self::ROOT;
        let mut i = 0;

        loop {
            let Some(edge_id) = self.child(node, ids[i]) else {
                let range = self.append(&ids[i..]);
                let edge_id = self.add_edge(node, range);
                self.attach(edge_id, pos);
                return Ok(());
            };

            let range = self.edges[edge_id].range;
            let mut matched = 0u64;
            while matched < range.len()
                && i < ids.len()
                && self.buffer[(range.start + matched) as usize] == ids[i]
            {
                matched += 1;
                i += 1;
            }

            if matched < range.len() {
                // Diverged or ran out inside the edge
                let middle = self.split(edge_id, matched)?;
                if i == ids.len() {
                    self.attach(edge_id, pos);
                } else {
                    let range = self.append(&ids[i..]);
                    let edge_id = self.add_edge(middle, range);
                    self.attach(edge_id, pos);
                }
                return Ok(());
            }

            if i == ids.len() {
                self.attach(edge_id, pos);
                return Ok(());
            }

            if self.is_extensible(edge_id) {
                let tail = self.append(&ids[i..]);
                self.edges[edge_id].range.end = tail.end;
                self.attach(edge_id, pos);
                return Ok(());
            }

            node = match self.edges[edge_id].dest {
                Some(dest) => dest,
                None => {
                    let dest = self.new_node();
                    self.edges[edge_id].dest = Some(dest);
                    dest
                }
            };
        }
    }

    fn insert_plain(&mut self, ids: &[LabelId], pos: Option<Pos>) {
        let mut node = Self::ROOT;
        let last = ids.len() - 1;

        for (i, &id) in ids.iter().enumerate() {
            let edge_id = match self.child(node, id) {
                Some(edge_id) => edge_id,
                None => {
                    let range = self.append(&[id]);
                    self.add_edge(node, range)
                }
            };
            if i == last {
                self.attach(edge_id, pos);
                return;
            }
            node = match self.edges[edge_id].dest {
                Some(dest) => dest,
                None => {
                    let dest = self.new_node();
                    self.edges[edge_id].dest = Some(dest);
                    dest
                }
            };
        }
    }

    /// An edge grows in place only while it is the open end of the buffer
    /// and nothing hangs off it yet.
    fn is_extensible(&self, edge_id: BatchEdgeId) -> bool {
        let edge = &self.edges[edge_id];
        edge.range.end == self.buffer.len() as u64 && edge.dest.is_none() && edge.positions.is_empty()
    }

    fn child(&self, node: BatchNodeId, first: LabelId) -> Option<BatchEdgeId> {
        self.nodes[node]
            .edges
            .iter()
            .copied()
            .find(|&e| self.buffer[self.edges[e].range.start as usize] == first)
    }

    fn append(&mut self, ids: &[LabelId]) -> LabelRange {
        let start = self.buffer.len() as u64;
        self.buffer.extend_from_slice(ids);
        LabelRange::new(start, self.buffer.len() as u64)
    }

    fn new_node(&mut self) -> BatchNodeId {
        self.nodes.push(BatchNode::default());
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, node: BatchNodeId, range: LabelRange) -> BatchEdgeId {
        self.edges.push(BatchEdge {
            range,
            dest: None,
            positions: Vec::new(),
        });
        let edge_id = self.edges.len() - 1;
        self.nodes[node].edges.push(edge_id);
        edge_id
    }

    fn attach(&mut self, edge_id: BatchEdgeId, pos: Option<Pos>) {
        if let Some(pos) = pos {
            self.edges[edge_id].positions.push(pos);
            self.position_count += 1;
        }
    }

    /// Split `edge_id` after `prefix_len` labels; returns the new middle node.
    /// The edge keeps its slot as the head.
    fn split(&mut self, edge_id: BatchEdgeId, prefix_len: u64) -> Result<BatchNodeId> {
        let edge = std::mem::take(&mut self.edges[edge_id]);
        let (mut head, tail) = split_edge(edge, prefix_len)?;

        let middle = self.new_node();
        self.edges.push(tail);
        let tail_id = self.edges.len() - 1;
        self.nodes[middle].edges.push(tail_id);

        head.dest = Some(middle);
        self.edges[edge_id] = head;
        Ok(middle)
    }

    /// Discard everything accumulated so far
    pub fn reset(&mut self) {
        self.labels.clear();
        self.buffer.clear();
        self.nodes.clear();
        self.nodes.push(BatchNode::default());
        self.edges.clear();
        self.next_stmt.clear();
        self.position_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.next_stmt.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Outgoing edges of `node`, in insertion order
    pub fn edges(&self, node: BatchNodeId) -> impl Iterator<Item = &BatchEdge> {
        self.nodes[node].edges.iter().map(move |&e| &self.edges[e])
    }

    pub fn buffer(&self) -> &[LabelId] {
        &self.buffer
    }

    pub fn labels(&self) -> &Interner {
        &self.labels
    }

    /// Resolve a batch-local label id
    pub fn label(&self, id: LabelId) -> Result<&str> {
        self.labels
            .resolve(id)
            .ok_or_else(|| TrieError::invariant(format!("batch label {} not interned", id)))
    }

    pub fn next_stmt_pairs(&self) -> &[(Pos, Pos)] {
        &self.next_stmt
    }

    /// Positions stored for an exact label sequence (used by tests and fuzzing)
    pub fn find<S: AsRef<str>>(&self, labels: &[S]) -> Vec<&Pos> {
        let mut ids = Vec::with_capacity(labels.len());
        for label in labels {
            match self.labels.get(label.as_ref()) {
                Some(id) => ids.push(id),
                None => return Vec::new(),
            }
        }
        if ids.is_empty() {
            return Vec::new();
        }

        let mut node = Self::ROOT;
        let mut i = 0;
        loop {
            let Some(edge_id) = self.child(node, ids[i]) else {
                return Vec::new();
            };
            let edge = &self.edges[edge_id];
            let slice = &self.buffer[edge.range.as_usize()];
            if ids.len() - i < slice.len() || slice != &ids[i..i + slice.len()] {
                return Vec::new();
            }
            i += slice.len();
            if i == ids.len() {
                return edge.positions.iter().collect();
            }
            match edge.dest {
                Some(dest) => node = dest,
                None => return Vec::new(),
            }
        }
    }

    /// Check that no node has two outgoing edges with the same first label
    pub fn check_siblings(&self) -> Result<()> {
        for (id, node) in self.nodes.iter().enumerate() {
            let mut firsts: Vec<LabelId> = node
                .edges
                .iter()
                .map(|&e| self.buffer[self.edges[e].range.start as usize])
                .collect();
            firsts.sort_unstable();
            if firsts.windows(2).any(|w| w[0] == w[1]) {
                return Err(TrieError::invariant(format!(
                    "batch node {} has sibling edges sharing a first label",
                    id
                )));
            }
        }
        Ok(())
    }
}
