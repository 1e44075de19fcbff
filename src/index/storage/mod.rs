//! Paged on-disk storage for the persistent trie
//!
//! Three memory-mapped record streams back the trie graph:
//!
//! - `nodes.bin`: one [`NodeRecord`] per node, keyed by node id (0 = root)
//! - `edges.bin`: fixed-capacity edge blocks, chained per node
//! - `positions.bin`: fixed-capacity position blocks, chained per edge
//!
//! Nodes and edges reference each other only through record indices, so the
//! structure survives remapping and process restarts. Overflow blocks are
//! linked at the head of a chain so appending never walks the chain; readers
//! restore insertion order.

mod mapped;
mod records;

pub use mapped::{HEADER_SIZE, MappedFile, OpenMode};
pub use records::*;

use crate::error::{Result, TrieError};
use crate::index::types::{FileLayout, NIL, NodeId, PageSizes};

const NODE_MAGIC: [u8; 4] = *b"STND";
const EDGE_MAGIC: [u8; 4] = *b"STED";
const POS_MAGIC: [u8; 4] = *b"STPS";

/// Location of an edge inside the edge-block stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSlot {
    pub block: u64,
    pub slot: usize,
}

/// Instance counts derived from the stream headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageCounters {
    pub nodes: u64,
    pub edges: u64,
    pub positions: u64,
    pub edge_blocks: u64,
    pub pos_blocks: u64,
}

pub struct Storage {
    nodes: MappedFile,
    edges: MappedFile,
    positions: MappedFile,
}

impl Storage {
    /// Create empty streams (truncating existing files) and write the root node
    pub fn initialize(layout: &FileLayout, pages: PageSizes) -> Result<Self> {
        let mut storage = Self {
            nodes: MappedFile::initialize(&layout.nodes, NODE_MAGIC, NODE_RECORD_SIZE, pages.nodes)?,
            edges: MappedFile::initialize(&layout.edges, EDGE_MAGIC, EDGE_BLOCK_SIZE, pages.edges)?,
            positions: MappedFile::initialize(
                &layout.positions,
                POS_MAGIC,
                POS_BLOCK_SIZE,
                pages.positions,
            )?,
        };
        let root = storage.create_node()?;
        debug_assert_eq!(root, crate::index::types::ROOT);
        Ok(storage)
    }

    /// Map existing streams
    pub fn open(layout: &FileLayout, pages: PageSizes, mode: OpenMode) -> Result<Self> {
        let storage = Self {
            nodes: MappedFile::open(&layout.nodes, NODE_MAGIC, NODE_RECORD_SIZE, pages.nodes, mode)?,
            edges: MappedFile::open(&layout.edges, EDGE_MAGIC, EDGE_BLOCK_SIZE, pages.edges, mode)?,
            positions: MappedFile::open(
                &layout.positions,
                POS_MAGIC,
                POS_BLOCK_SIZE,
                pages.positions,
                mode,
            )?,
        };
        if storage.nodes.record_count() == 0 {
            return Err(TrieError::format("node stream has no root node"));
        }
        Ok(storage)
    }

    pub fn mode(&self) -> OpenMode {
        self.nodes.mode()
    }

    pub fn create_node(&mut self) -> Result<NodeId> {
        let id = self.nodes.allocate()?;
        NodeRecord::EMPTY.encode(self.nodes.record_mut(id)?);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<NodeRecord> {
        Ok(NodeRecord::decode(self.nodes.record(id)?))
    }

    fn write_node(&mut self, id: NodeId, node: &NodeRecord) -> Result<()> {
        node.encode(self.nodes.record_mut(id)?);
        Ok(())
    }

    /// Block ids of a chain, oldest block first
    fn chain(file: &MappedFile, head: u64) -> Result<Vec<u64>> {
        let mut blocks = Vec::new();
        let mut current = head;
        while current != NIL {
            if blocks.len() as u64 >= file.record_count() {
                return Err(TrieError::format(format!(
                    "{}: cyclic block chain at {}",
                    file.path().display(),
                    head
                )));
            }
            blocks.push(current);
            current = BlockHeader::decode(file.record(current)?).next;
        }
        blocks.reverse();
        Ok(blocks)
    }

    /// All outgoing edges of `node`, in insertion order
    pub fn edges(&self, node: NodeId) -> Result<Vec<(EdgeSlot, EdgeRecord)>> {
        let record = self.node(node)?;
        let mut out = Vec::with_capacity(record.edge_count as usize);
        for block in Self::chain(&self.edges, record.first_block)? {
            let bytes = self.edges.record(block)?;
            let header = BlockHeader::decode(bytes);
            for slot in 0..header.count as usize {
                out.push((EdgeSlot { block, slot }, read_edge(bytes, slot)));
            }
        }
        Ok(out)
    }

    /// First outgoing edge of `node` accepted by `pred`
    pub fn find_edge<F>(&self, node: NodeId, mut pred: F) -> Result<Option<(EdgeSlot, EdgeRecord)>>
    where
        F: FnMut(&EdgeRecord) -> bool,
    {
        let mut block = self.node(node)?.first_block;
        let mut steps = 0u64;
        while block != NIL {
            steps += 1;
            if steps > self.edges.record_count() {
                return Err(TrieError::format("cyclic edge-block chain"));
            }
            let bytes = self.edges.record(block)?;
            let header = BlockHeader::decode(bytes);
            for slot in 0..header.count as usize {
                let edge = read_edge(bytes, slot);
                if pred(&edge) {
                    return Ok(Some((EdgeSlot { block, slot }, edge)));
                }
            }
            block = header.next;
        }
        Ok(None)
    }

    /// Append an outgoing edge to `node`, chaining a new block when the head is full
    pub fn add_edge(&mut self, node: NodeId, edge: &EdgeRecord) -> Result<EdgeSlot> {
        let mut record = self.node(node)?;

        let needs_block = record.first_block == NIL
            || BlockHeader::decode(self.edges.record(record.first_block)?).count as usize
                >= EDGE_BLOCK_CAPACITY;
        if needs_block {
            let block = self.edges.allocate()?;
            BlockHeader {
                next: record.first_block,
                count: 0,
            }
            .encode(self.edges.record_mut(block)?);
            record.first_block = block;
        }

        let block = record.first_block;
        let bytes = self.edges.record_mut(block)?;
        let mut header = BlockHeader::decode(bytes);
        let slot = header.count as usize;
        write_edge(bytes, slot, edge);
        header.count += 1;
        header.encode(bytes);

        record.edge_count += 1;
        self.write_node(node, &record)?;
        self.edges.add_items(1)?;
        Ok(EdgeSlot { block, slot })
    }

    pub fn edge(&self, at: EdgeSlot) -> Result<EdgeRecord> {
        let bytes = self.edges.record(at.block)?;
        if at.slot >= BlockHeader::decode(bytes).count as usize {
            return Err(TrieError::format(format!(
                "edge slot {} of block {} is empty",
                at.slot, at.block
            )));
        }
        Ok(read_edge(bytes, at.slot))
    }

    /// Rewrite an edge in place (range/destination/position chain)
    pub fn write_edge(&mut self, at: EdgeSlot, edge: &EdgeRecord) -> Result<()> {
        write_edge(self.edges.record_mut(at.block)?, at.slot, edge);
        Ok(())
    }

    /// Append a position to the edge at `at`
    pub fn append_position(&mut self, at: EdgeSlot, pos: &PosRecord) -> Result<()> {
        let mut edge = self.edge(at)?;

        let needs_block = edge.pos_block == NIL
            || BlockHeader::decode(self.positions.record(edge.pos_block)?).count as usize
                >= POS_BLOCK_CAPACITY;
        if needs_block {
            let block = self.positions.allocate()?;
            BlockHeader {
                next: edge.pos_block,
                count: 0,
            }
            .encode(self.positions.record_mut(block)?);
            edge.pos_block = block;
            self.write_edge(at, &edge)?;
        }

        let bytes = self.positions.record_mut(edge.pos_block)?;
        let mut header = BlockHeader::decode(bytes);
        write_pos(bytes, header.count as usize, pos);
        header.count += 1;
        header.encode(bytes);

        self.positions.add_items(1)?;
        Ok(())
    }

    /// Decode the position chain of an edge, in insertion order
    pub fn positions(&self, edge: &EdgeRecord) -> Result<Vec<PosRecord>> {
        let mut out = Vec::new();
        for block in Self::chain(&self.positions, edge.pos_block)? {
            let bytes = self.positions.record(block)?;
            let header = BlockHeader::decode(bytes);
            for slot in 0..header.count as usize {
                out.push(read_pos(bytes, slot));
            }
        }
        Ok(out)
    }

    pub fn counters(&self) -> StorageCounters {
        StorageCounters {
            nodes: self.nodes.record_count(),
            edges: self.edges.item_count(),
            positions: self.positions.item_count(),
            edge_blocks: self.edges.record_count(),
            pos_blocks: self.positions.record_count(),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.nodes.flush()?;
        self.edges.flush()?;
        self.positions.flush()?;
        Ok(())
    }
}
