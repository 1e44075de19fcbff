//! Fixed-width record codecs for the node, edge-block and position-block streams

use crate::index::types::{FileId, LabelRange, NodeId, Position, ProjectId, NIL};
use crate::utils::{get_i32, get_u32, get_u64, put_i32, put_u32, put_u64};

/// Edges per edge block before a new block is chained
pub const EDGE_BLOCK_CAPACITY: usize = 4;

/// Positions per position block before a new block is chained
pub const POS_BLOCK_CAPACITY: usize = 8;

pub const NODE_RECORD_SIZE: usize = 16;
pub const EDGE_SIZE: usize = 32;
pub const BLOCK_HEADER_SIZE: usize = 16;
pub const EDGE_BLOCK_SIZE: usize = BLOCK_HEADER_SIZE + EDGE_BLOCK_CAPACITY * EDGE_SIZE;
pub const POS_SIZE: usize = 40;
pub const POS_BLOCK_SIZE: usize = BLOCK_HEADER_SIZE + POS_BLOCK_CAPACITY * POS_SIZE;

/// Node record: head of the edge-block chain and number of outgoing edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub first_block: u64,
    pub edge_count: u32,
}

impl NodeRecord {
    pub const EMPTY: NodeRecord = NodeRecord {
        first_block: NIL,
        edge_count: 0,
    };

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            first_block: get_u64(buf, 0),
            edge_count: get_u32(buf, 8),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u64(buf, 0, self.first_block);
        put_u32(buf, 8, self.edge_count);
        put_u32(buf, 12, 0);
    }
}

/// Persistent edge: a buffer range, its destination node and its position chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub range: LabelRange,
    pub dest: NodeId,
    pub pos_block: u64,
}

impl EdgeRecord {
    pub fn new(range: LabelRange, dest: NodeId) -> Self {
        Self {
            range,
            dest,
            pos_block: NIL,
        }
    }

    pub fn has_positions(&self) -> bool {
        self.pos_block != NIL
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            range: LabelRange::new(get_u64(buf, 0), get_u64(buf, 8)),
            dest: get_u64(buf, 16),
            pos_block: get_u64(buf, 24),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        put_u64(buf, 0, self.range.start);
        put_u64(buf, 8, self.range.end);
        put_u64(buf, 16, self.dest);
        put_u64(buf, 24, self.pos_block);
    }
}

/// Shared header of edge and position blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub next: u64,
    pub count: u32,
}

impl BlockHeader {
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            next: get_u64(buf, 0),
            count: get_u32(buf, 8),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u64(buf, 0, self.next);
        put_u32(buf, 8, self.count);
        put_u32(buf, 12, 0);
    }
}

#[inline]
fn edge_slot_offset(slot: usize) -> usize {
    BLOCK_HEADER_SIZE + slot * EDGE_SIZE
}

#[inline]
fn pos_slot_offset(slot: usize) -> usize {
    BLOCK_HEADER_SIZE + slot * POS_SIZE
}

/// Read edge `slot` out of an edge-block record
pub fn read_edge(block: &[u8], slot: usize) -> EdgeRecord {
    debug_assert!(slot < EDGE_BLOCK_CAPACITY);
    let off = edge_slot_offset(slot);
    EdgeRecord::decode(&block[off..off + EDGE_SIZE])
}

pub fn write_edge(block: &mut [u8], slot: usize, edge: &EdgeRecord) {
    debug_assert!(slot < EDGE_BLOCK_CAPACITY);
    let off = edge_slot_offset(slot);
    edge.encode(&mut block[off..off + EDGE_SIZE]);
}

/// Stored occurrence with interned project and file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PosRecord {
    pub project: ProjectId,
    pub file: FileId,
    pub start: Position,
    pub end: Position,
    pub method_start: Position,
    pub method_end: Position,
}

impl PosRecord {
    pub fn decode(buf: &[u8]) -> Self {
        let position = |off: usize| Position::new(get_i32(buf, off), get_i32(buf, off + 4));
        Self {
            project: get_u32(buf, 0),
            file: get_u32(buf, 4),
            start: position(8),
            end: position(16),
            method_start: position(24),
            method_end: position(32),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.project);
        put_u32(buf, 4, self.file);
        for (off, p) in [
            (8, self.start),
            (16, self.end),
            (24, self.method_start),
            (32, self.method_end),
        ] {
            put_i32(buf, off, p.line);
            put_i32(buf, off + 4, p.column);
        }
    }

    /// Identity key: (project, file, start, end)
    pub fn key(&self) -> (ProjectId, FileId, Position, Position) {
        (self.project, self.file, self.start, self.end)
    }
}

pub fn read_pos(block: &[u8], slot: usize) -> PosRecord {
    debug_assert!(slot < POS_BLOCK_CAPACITY);
    let off = pos_slot_offset(slot);
    PosRecord::decode(&block[off..off + POS_SIZE])
}

pub fn write_pos(block: &mut [u8], slot: usize, pos: &PosRecord) {
    debug_assert!(slot < POS_BLOCK_CAPACITY);
    let off = pos_slot_offset(slot);
    pos.encode(&mut block[off..off + POS_SIZE]);
}
