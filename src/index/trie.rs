//! Persistent trie: merge engine and query traversal
//!
//! A [`PersistentTrie`] owns every file of one index: the three mapped
//! record streams, the label/path/project dictionaries, the linearization
//! buffer and the statement adjacency map.
//!
//! Batches are folded in with [`PersistentTrie::add_trie`], which walks the
//! batch trie and the persistent trie side by side, breadth first, splitting
//! persistent edges where the two diverge. Queries walk from the root
//! comparing query label ids against the buffer slices of the edges.

use crate::error::{Result, TrieError};
use crate::index::adjacency::NextStmtMap;
use crate::index::batch::{BatchNodeId, BatchTrie};
use crate::index::dict::Dictionary;
use crate::index::linear::LinearBuffer;
use crate::index::split::split_edge;
use crate::index::storage::{EdgeRecord, EdgeSlot, OpenMode, PosRecord, Storage, StorageCounters};
use crate::index::types::{
    FileLayout, IndexMeta, LabelId, LabelRange, NIL, NodeId, PageSizes, Pos, ROOT, TrieKind,
};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

const META_VERSION: u32 = 1;

/// A batch edge on its way into the persistent trie, range already shifted
struct MergeEdge<'a> {
    range: LabelRange,
    dest: Option<BatchNodeId>,
    positions: &'a [Pos],
}

type MergeQueue<'a> = VecDeque<(Vec<MergeEdge<'a>>, NodeId)>;

pub struct PersistentTrie {
    layout: FileLayout,
    mode: OpenMode,
    storage: Storage,
    labels: Dictionary,
    paths: Dictionary,
    projects: Dictionary,
    buffer: LinearBuffer,
    next_stmt: NextStmtMap,
    meta: IndexMeta,
    closed: bool,
}

impl PersistentTrie {
    /// Create a fresh index, truncating any files already in the layout
    pub fn initialize(layout: &FileLayout, pages: PageSizes, kind: TrieKind) -> Result<Self> {
        fs::create_dir_all(layout.dir())?;

        let now = unix_now();
        let mut trie = Self {
            layout: layout.clone(),
            mode: OpenMode::ReadWrite,
            storage: Storage::initialize(layout, pages)?,
            labels: Dictionary::create(&layout.labels)?,
            paths: Dictionary::create(&layout.paths)?,
            projects: Dictionary::create(&layout.projects)?,
            buffer: LinearBuffer::create(&layout.linearization)?,
            next_stmt: NextStmtMap::create(&layout.next_stmt)?,
            meta: IndexMeta {
                version: META_VERSION,
                kind,
                created_at: now,
                updated_at: now,
                ..Default::default()
            },
            closed: false,
        };
        trie.sync()?;

        tracing::debug!("initialized {:?} index in {}", kind, layout.dir().display());
        Ok(trie)
    }

    /// Open an existing index without resetting its content
    pub fn open(layout: &FileLayout, pages: PageSizes, mode: OpenMode) -> Result<Self> {
        let meta: IndexMeta = serde_json::from_slice(&fs::read(&layout.meta)?)?;
        if meta.version != META_VERSION {
            return Err(TrieError::format(format!(
                "{}: unsupported index version {}",
                layout.meta.display(),
                meta.version
            )));
        }

        let trie = Self {
            layout: layout.clone(),
            mode,
            storage: Storage::open(layout, pages, mode)?,
            labels: Dictionary::open(&layout.labels, mode)?,
            paths: Dictionary::open(&layout.paths, mode)?,
            projects: Dictionary::open(&layout.projects, mode)?,
            buffer: LinearBuffer::open(&layout.linearization, mode)?,
            next_stmt: NextStmtMap::open(&layout.next_stmt, mode)?,
            meta,
            closed: false,
        };

        if trie.buffer.len() < trie.meta.buffer_len {
            tracing::warn!(
                "{}: buffer holds {} labels, meta.json recorded {}",
                layout.linearization.display(),
                trie.buffer.len(),
                trie.meta.buffer_len
            );
        }
        Ok(trie)
    }

    /// Whether `layout` points at an initialized index
    pub fn exists(layout: &FileLayout) -> bool {
        layout.meta.is_file() && layout.nodes.is_file()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn kind(&self) -> TrieKind {
        self.meta.kind
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.mode {
            OpenMode::ReadWrite => Ok(()),
            OpenMode::ReadOnly => Err(TrieError::ReadOnly),
        }
    }

    /// Fold a batch trie into the index
    pub fn add_trie(&mut self, batch: &BatchTrie) -> Result<()> {
        self.ensure_writable()?;
        if batch.kind() != self.meta.kind {
            return Err(TrieError::invariant(format!(
                "cannot merge a {:?} batch into a {:?} index",
                batch.kind(),
                self.meta.kind
            )));
        }

        // Batch-local label ids -> persistent ids, then append the batch buffer
        let local_to_global = batch
            .labels()
            .iter()
            .map(|(_, label)| self.labels.intern(label))
            .collect::<Result<Vec<LabelId>>>()?;
        let translated = batch
            .buffer()
            .iter()
            .map(|&local| {
                local_to_global.get(local as usize).copied().ok_or_else(|| {
                    TrieError::invariant(format!("batch label {} not interned", local))
                })
            })
            .collect::<Result<Vec<LabelId>>>()?;
        let shift = self.buffer.extend(translated)?.start;

        let mut queue: MergeQueue<'_> = VecDeque::new();
        queue.push_back((batch_edges(batch, BatchTrie::ROOT, shift), ROOT));
        while let Some((edges, node)) = queue.pop_front() {
            for edge in edges {
                self.merge_edge(batch, edge, node, shift, &mut queue)?;
            }
        }

        for (prev, next) in batch.next_stmt_pairs() {
            let prev = self.pos_record(prev)?;
            let next = self.pos_record(next)?;
            self.next_stmt.insert(prev, next)?;
        }

        self.meta.merges += 1;
        self.flush_appends()?;

        tracing::debug!(
            "merged batch {}: {} edges, {} positions, buffer now {} labels",
            self.meta.merges,
            batch.edge_count(),
            batch.position_count(),
            self.buffer.len()
        );
        Ok(())
    }

    fn merge_edge<'a>(
        &mut self,
        batch: &'a BatchTrie,
        edge: MergeEdge<'a>,
        node: NodeId,
        shift: u64,
        queue: &mut MergeQueue<'a>,
    ) -> Result<()> {
        let first = self.label_at(edge.range.start)?;
        let buffer = &self.buffer;
        let found = self
            .storage
            .find_edge(node, |e| buffer.get(e.range.start) == Some(first))?;

        let Some((slot, existing)) = found else {
            let dest = self.storage.create_node()?;
            let slot = self.add_child(node, &EdgeRecord::new(edge.range, dest))?;
            self.store_positions(slot, edge.positions)?;
            if let Some(batch_dest) = edge.dest {
                queue.push_back((batch_edges(batch, batch_dest, shift), dest));
            }
            return Ok(());
        };

        let common = common_prefix(
            self.buffer.slice(existing.range)?,
            self.buffer.slice(edge.range)?,
        );
        if common == 0 {
            return Err(TrieError::invariant(format!(
                "edge {}..{} matched on first label but shares no prefix",
                existing.range.start, existing.range.end
            )));
        }

        let target = if common == existing.range.len() {
            existing.dest
        } else {
            let (mut head, tail) = split_edge(existing, common)?;
            let middle = self.storage.create_node()?;
            self.add_child(middle, &tail)?;
            head.dest = middle;
            self.storage.write_edge(slot, &head)?;
            middle
        };
        if target == NIL {
            return Err(TrieError::invariant(format!(
                "edge {}..{} has no destination node",
                existing.range.start, existing.range.end
            )));
        }

        if common == edge.range.len() {
            self.store_positions(slot, edge.positions)?;
            if let Some(batch_dest) = edge.dest {
                queue.push_back((batch_edges(batch, batch_dest, shift), target));
            }
        } else {
            // The rest of the batch edge continues below the matched prefix,
            // positions and children included
            let rest = MergeEdge {
                range: LabelRange::new(edge.range.start + common, edge.range.end),
                dest: edge.dest,
                positions: edge.positions,
            };
            queue.push_back((vec![rest], target));
        }
        Ok(())
    }

    /// Attach `edge` below `node`; siblings must start with distinct labels
    fn add_child(&mut self, node: NodeId, edge: &EdgeRecord) -> Result<EdgeSlot> {
        let first = self.label_at(edge.range.start)?;
        let buffer = &self.buffer;
        if let Some((_, sibling)) = self
            .storage
            .find_edge(node, |e| buffer.get(e.range.start) == Some(first))?
        {
            return Err(TrieError::invariant(format!(
                "node {} already has edge {}..{} starting with label {}",
                node, sibling.range.start, sibling.range.end, first
            )));
        }
        self.storage.add_edge(node, edge)
    }

    fn label_at(&self, index: u64) -> Result<LabelId> {
        self.buffer.get(index).ok_or_else(|| {
            TrieError::format(format!("buffer offset {} out of range", index))
        })
    }

    fn store_positions(&mut self, slot: EdgeSlot, positions: &[Pos]) -> Result<()> {
        for pos in positions {
            let record = self.pos_record(pos)?;
            self.storage.append_position(slot, &record)?;
        }
        Ok(())
    }

    fn pos_record(&mut self, pos: &Pos) -> Result<PosRecord> {
        Ok(PosRecord {
            project: self.projects.intern(&pos.project)?,
            file: self.paths.intern(&pos.file)?,
            start: pos.start,
            end: pos.end,
            method_start: pos.method_start,
            method_end: pos.method_end,
        })
    }

    fn decode_pos(&self, record: &PosRecord) -> Result<Pos> {
        let project = self.projects.resolve_stored(record.project)?;
        let file = self.paths.resolve_stored(record.file)?;
        Ok(Pos::new(project, file, record.start, record.end)
            .with_method(record.method_start, record.method_end))
    }

    /// All occurrences of an exact label sequence; empty when nothing matches
    pub fn find<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<Pos>> {
        let mut ids = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.labels.get(token.as_ref()) {
                Some(id) => ids.push(id),
                None => return Ok(Vec::new()),
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut node = ROOT;
        let mut i = 0;
        loop {
            let first = ids[i];
            let buffer = &self.buffer;
            let Some((_, edge)) = self
                .storage
                .find_edge(node, |e| buffer.get(e.range.start) == Some(first))?
            else {
                return Ok(Vec::new());
            };

            let labels = self.buffer.slice(edge.range)?;
            let rest = &ids[i..];
            if rest.len() < labels.len() || labels != &rest[..labels.len()] {
                return Ok(Vec::new());
            }
            i += labels.len();

            if i == ids.len() {
                return self
                    .storage
                    .positions(&edge)?
                    .iter()
                    .map(|record| self.decode_pos(record))
                    .collect();
            }
            if edge.dest == NIL {
                return Ok(Vec::new());
            }
            node = edge.dest;
        }
    }

    /// Statement recorded right after `pos` in the same block
    pub fn next_statement(&self, pos: &Pos) -> Result<Option<Pos>> {
        let (Some(project), Some(file)) = (self.projects.get(&pos.project), self.paths.get(&pos.file))
        else {
            return Ok(None);
        };
        let key = PosRecord {
            project,
            file,
            start: pos.start,
            end: pos.end,
            method_start: pos.method_start,
            method_end: pos.method_end,
        };
        self.next_stmt
            .get(&key)
            .map(|record| self.decode_pos(record))
            .transpose()
    }

    /// Occurrences of consecutive statements.
    ///
    /// Each result chain holds one position per query statement, following
    /// the adjacency map from an occurrence of the first statement.
    pub fn find_sequence<S: AsRef<str>>(&self, statements: &[Vec<S>]) -> Result<Vec<Vec<Pos>>> {
        let Some((head, rest)) = statements.split_first() else {
            return Ok(Vec::new());
        };

        let mut followers = Vec::with_capacity(rest.len());
        for statement in rest {
            let hits: FxHashSet<Pos> = self.find(statement)?.into_iter().collect();
            if hits.is_empty() {
                return Ok(Vec::new());
            }
            followers.push(hits);
        }

        let mut chains = Vec::new();
        'start: for first in self.find(head)? {
            let mut chain = vec![first];
            for hits in &followers {
                let Some(last) = chain.last() else {
                    continue 'start;
                };
                match self.next_statement(last)? {
                    Some(next) if hits.contains(&next) => chain.push(next),
                    _ => continue 'start,
                }
            }
            chains.push(chain);
        }
        Ok(chains)
    }

    /// Print the trie breadth first, then the file dictionary and adjacency map
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        let counters = self.storage.counters();
        writeln!(
            out,
            "{:?} trie: {} nodes, {} edges, {} positions",
            self.meta.kind, counters.nodes, counters.edges, counters.positions
        )?;

        let mut queue = VecDeque::from([ROOT]);
        while let Some(node) = queue.pop_front() {
            let edges = self.storage.edges(node)?;
            if edges.is_empty() {
                continue;
            }
            writeln!(out, "node {}", node)?;
            for (_, edge) in edges {
                let labels = self
                    .buffer
                    .slice(edge.range)?
                    .iter()
                    .map(|&id| self.labels.resolve_stored(id))
                    .collect::<Result<Vec<_>>>()?;
                writeln!(
                    out,
                    "  [{}..{}) -> {}: {}",
                    edge.range.start,
                    edge.range.end,
                    edge.dest,
                    labels.join(" ")
                )?;
                for record in self.storage.positions(&edge)? {
                    writeln!(out, "    @ {}", self.decode_pos(&record)?)?;
                }
                if edge.dest != NIL {
                    queue.push_back(edge.dest);
                }
            }
        }

        writeln!(out, "paths:")?;
        for (id, path) in self.paths.interner().iter() {
            writeln!(out, "  {}: {}", id, path)?;
        }

        writeln!(out, "next statements:")?;
        for (prev, next) in self.next_stmt.pairs() {
            writeln!(out, "  {} -> {}", self.decode_pos(prev)?, self.decode_pos(next)?)?;
        }
        Ok(())
    }

    /// Fail if any node has two outgoing edges starting with the same label
    pub fn check_siblings(&self) -> Result<()> {
        for node in 0..self.storage.counters().nodes {
            let mut firsts = FxHashSet::default();
            for (_, edge) in self.storage.edges(node)? {
                let first = self.label_at(edge.range.start)?;
                if !firsts.insert(first) {
                    return Err(TrieError::invariant(format!(
                        "node {} has two edges starting with label {}",
                        node, first
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn counters(&self) -> StorageCounters {
        self.storage.counters()
    }

    /// Metadata with counters reflecting the current state
    pub fn meta(&self) -> IndexMeta {
        let mut meta = self.meta.clone();
        self.fill_counts(&mut meta);
        meta
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn buffer_len(&self) -> u64 {
        self.buffer.len()
    }

    fn fill_counts(&self, meta: &mut IndexMeta) {
        let counters = self.storage.counters();
        meta.node_count = counters.nodes;
        meta.edge_count = counters.edges;
        meta.position_count = counters.positions;
        meta.edge_block_count = counters.edge_blocks;
        meta.pos_block_count = counters.pos_blocks;
        meta.buffer_len = self.buffer.len();
        meta.label_count = self.labels.len() as u64;
        meta.file_count = self.paths.len() as u64;
        meta.project_count = self.projects.len() as u64;
        meta.next_stmt_count = self.next_stmt.len() as u64;
    }

    /// Write the append-only files (buffer tail, dictionaries, adjacency)
    fn flush_appends(&mut self) -> Result<()> {
        self.buffer.flush()?;
        self.labels.flush()?;
        self.paths.flush()?;
        self.projects.flush()?;
        self.next_stmt.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Ok(());
        }
        self.flush_appends()?;
        self.storage.flush()?;

        let mut meta = self.meta.clone();
        self.fill_counts(&mut meta);
        meta.updated_at = unix_now();
        fs::write(&self.layout.meta, serde_json::to_string_pretty(&meta)?)?;
        self.meta = meta;
        Ok(())
    }

    /// Flush everything (write mode) and release the mappings
    pub fn close(mut self) -> Result<()> {
        let result = self.sync();
        self.closed = true;
        result
    }
}

impl Drop for PersistentTrie {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.sync() {
            tracing::warn!("failed to flush index in {}: {}", self.layout.dir().display(), e);
        }
    }
}

fn batch_edges(batch: &BatchTrie, node: BatchNodeId, shift: u64) -> Vec<MergeEdge<'_>> {
    batch
        .edges(node)
        .map(|edge| MergeEdge {
            range: edge.range.shifted(shift),
            dest: edge.dest,
            positions: &edge.positions,
        })
        .collect()
}

fn common_prefix(a: &[LabelId], b: &[LabelId]) -> u64 {
    a.iter().zip(b).take_while(|(x, y)| x == y).count() as u64
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::Position;

    fn labels(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    fn at(file: &str, line: i32) -> Pos {
        Pos::new("p", file, Position::new(line, 9), Position::new(line, 18))
    }

    fn pages() -> PageSizes {
        PageSizes {
            nodes: 128,
            edges: 512,
            positions: 1024,
        }
    }

    fn new_trie(dir: &std::path::Path, kind: TrieKind) -> PersistentTrie {
        PersistentTrie::initialize(&FileLayout::in_dir(dir), pages(), kind).unwrap()
    }

    /// Every node's outgoing edges start with distinct labels
    fn assert_siblings_unique(trie: &PersistentTrie) {
        trie.check_siblings().unwrap();
    }

    #[test]
    fn test_shared_shape_single_edge() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);

        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("ReturnStmt return $0 ;"), Some(at("A.java", 1))).unwrap();
        batch.add(&labels("ReturnStmt return $0 ;"), Some(at("A.java", 2))).unwrap();
        trie.add_trie(&batch).unwrap();

        let hits = trie.find(&labels("ReturnStmt return $0 ;")).unwrap();
        assert_eq!(hits, vec![at("A.java", 1), at("A.java", 2)]);
        assert_eq!(trie.storage.edges(ROOT).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_splits_persistent_edge() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);

        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("IfStmt if ( a ) b ;"), Some(at("A.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        batch.reset();
        batch.add(&labels("IfStmt if ( a ) c ;"), Some(at("B.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        let root = trie.storage.edges(ROOT).unwrap();
        assert_eq!(root.len(), 1);
        let (_, head) = root[0];
        assert_eq!(head.range.len(), 5);
        assert!(!head.has_positions());

        let children = trie.storage.edges(head.dest).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|(_, e)| e.range.len() == 2));

        assert_eq!(trie.find(&labels("IfStmt if ( a ) b ;")).unwrap(), vec![at("A.java", 1)]);
        assert_eq!(trie.find(&labels("IfStmt if ( a ) c ;")).unwrap(), vec![at("B.java", 1)]);
        assert!(trie.find(&labels("IfStmt if ( a )")).unwrap().is_empty());
        assert_siblings_unique(&trie);
    }

    #[test]
    fn test_partially_consumed_batch_edge_keeps_positions_below() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);

        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("A B"), Some(at("A.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        batch.reset();
        batch.add(&labels("A B C D"), Some(at("B.java", 2))).unwrap();
        trie.add_trie(&batch).unwrap();

        assert_eq!(trie.find(&labels("A B")).unwrap(), vec![at("A.java", 1)]);
        assert_eq!(trie.find(&labels("A B C D")).unwrap(), vec![at("B.java", 2)]);
        assert_eq!(trie.counters().positions, 2);
    }

    #[test]
    fn test_prefix_of_persistent_edge_gets_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);

        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("A B C D"), Some(at("A.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        batch.reset();
        batch.add(&labels("A B"), Some(at("B.java", 2))).unwrap();
        trie.add_trie(&batch).unwrap();

        assert_eq!(trie.find(&labels("A B")).unwrap(), vec![at("B.java", 2)]);
        assert_eq!(trie.find(&labels("A B C D")).unwrap(), vec![at("A.java", 1)]);
        assert!(trie.find(&labels("A B C")).unwrap().is_empty());
        assert_siblings_unique(&trie);
    }

    #[test]
    fn test_unknown_token_is_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);

        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("ReturnStmt return $0 ;"), Some(at("A.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        assert!(trie.find(&labels("ReturnStmt return null ;")).unwrap().is_empty());
        assert!(trie.find(&labels("ReturnStmt return $0 ; ;")).unwrap().is_empty());
        assert!(trie.find(&[] as &[&str]).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FileLayout::in_dir(dir.path());
        {
            let mut trie = new_trie(dir.path(), TrieKind::Compressed);
            let mut batch = BatchTrie::new(TrieKind::Compressed);
            let first = at("A.java", 1);
            let second = at("A.java", 2);
            batch.add(&labels("ExpressionStmt $0 = $1 ;"), Some(first.clone())).unwrap();
            batch.add(&labels("ReturnStmt return $0 ;"), Some(second.clone())).unwrap();
            batch.next_stmt(first, second);
            trie.add_trie(&batch).unwrap();
            trie.close().unwrap();
        }

        let mut trie = PersistentTrie::open(&layout, pages(), OpenMode::ReadOnly).unwrap();
        let first = trie.find(&labels("ExpressionStmt $0 = $1 ;")).unwrap();
        assert_eq!(first, vec![at("A.java", 1)]);
        assert_eq!(trie.next_statement(&first[0]).unwrap(), Some(at("A.java", 2)));

        let chains = trie
            .find_sequence(&[labels("ExpressionStmt $0 = $1 ;"), labels("ReturnStmt return $0 ;")])
            .unwrap();
        assert_eq!(chains, vec![vec![at("A.java", 1), at("A.java", 2)]]);

        let meta = trie.meta();
        assert_eq!(meta.merges, 1);
        assert_eq!(meta.position_count, 2);

        let batch = BatchTrie::new(TrieKind::Compressed);
        assert!(matches!(trie.add_trie(&batch), Err(TrieError::ReadOnly)));
    }

    #[test]
    fn test_drop_flushes_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FileLayout::in_dir(dir.path());
        {
            let mut trie = new_trie(dir.path(), TrieKind::Plain);
            let mut batch = BatchTrie::new(TrieKind::Plain);
            batch.add(&labels("BreakStmt break ;"), Some(at("A.java", 4))).unwrap();
            trie.add_trie(&batch).unwrap();
        }

        let trie = PersistentTrie::open(&layout, pages(), OpenMode::ReadOnly).unwrap();
        assert_eq!(trie.kind(), TrieKind::Plain);
        assert_eq!(trie.buffer_len(), 3);
        assert_eq!(trie.find(&labels("BreakStmt break ;")).unwrap().len(), 1);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);
        let batch = BatchTrie::new(TrieKind::Plain);
        assert!(matches!(trie.add_trie(&batch), Err(TrieError::Invariant(_))));
    }

    #[test]
    fn test_colliding_sibling_is_an_invariant_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);
        let a = trie.labels.intern("A").unwrap();
        let b = trie.labels.intern("B").unwrap();
        let range = trie.buffer.extend(vec![a, b, a, b]).unwrap();

        let dest = trie.storage.create_node().unwrap();
        let head = LabelRange::new(range.start, range.start + 2);
        trie.add_child(ROOT, &EdgeRecord::new(head, dest)).unwrap();

        // Starts with `A` again
        let clash = LabelRange::new(range.start + 2, range.end);
        let other = trie.storage.create_node().unwrap();
        assert!(matches!(
            trie.add_child(ROOT, &EdgeRecord::new(clash, other)),
            Err(TrieError::Invariant(_))
        ));
        assert_eq!(trie.storage.edges(ROOT).unwrap().len(), 1);

        // A distinct first label is accepted
        let distinct = LabelRange::new(range.start + 1, range.end);
        trie.add_child(ROOT, &EdgeRecord::new(distinct, other)).unwrap();
        assert_siblings_unique(&trie);

        // Written past the guard, the collision is still reported
        trie.storage.add_edge(ROOT, &EdgeRecord::new(clash, other)).unwrap();
        assert!(matches!(trie.check_siblings(), Err(TrieError::Invariant(_))));
    }

    #[test]
    fn test_dump_lists_edges_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = new_trie(dir.path(), TrieKind::Compressed);
        let mut batch = BatchTrie::new(TrieKind::Compressed);
        batch.add(&labels("ReturnStmt return $0 ;"), Some(at("A.java", 1))).unwrap();
        trie.add_trie(&batch).unwrap();

        let mut out = Vec::new();
        trie.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ReturnStmt return $0 ;"));
        assert!(text.contains("0: A.java"));
        assert!(text.contains("@ p, A.java, start: 1:9"));
    }
}
