use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Interned label (normalized token) identifier
pub type LabelId = u32;

/// Persistent node identifier; 0 is the root
pub type NodeId = u64;

/// Interned project name identifier
pub type ProjectId = u32;

/// Interned file path identifier
pub type FileId = u32;

/// Sentinel for "no block"/"no node" in on-disk records
pub const NIL: u64 = u64::MAX;

/// The root node id, created once at initialization
pub const ROOT: NodeId = 0;

/// Half-open range `[start, end)` into a linearization buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LabelRange {
    pub start: u64,
    pub end: u64,
}

impl LabelRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shift both bounds by `offset` (batch range -> persistent range)
    #[inline]
    pub fn shifted(&self, offset: u64) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }

    #[inline]
    pub fn as_usize(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// A (line, column) location in a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: i32,
    pub column: i32,
}

impl Position {
    /// Unknown location
    pub const NONE: Position = Position {
        line: -1,
        column: -1,
    };

    pub fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }

    pub fn is_none(&self) -> bool {
        self.line < 0 && self.column < 0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "?")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// An occurrence of a statement in the corpus.
///
/// Identity is `(project, file, start, end)`; the enclosing method bounds
/// are reporting context only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pos {
    pub project: String,
    pub file: String,
    pub start: Position,
    pub end: Position,
    pub method_start: Position,
    pub method_end: Position,
}

impl Pos {
    pub fn new(project: &str, file: &str, start: Position, end: Position) -> Self {
        Self {
            project: project.to_string(),
            file: file.to_string(),
            start,
            end,
            method_start: Position::NONE,
            method_end: Position::NONE,
        }
    }

    pub fn with_method(mut self, start: Position, end: Position) -> Self {
        self.method_start = start;
        self.method_end = end;
        self
    }

    /// Number of source lines covered, 0 when the bounds are unknown
    pub fn lines(&self) -> i32 {
        if self.start.is_none() || self.end.is_none() {
            return 0;
        }
        self.end.line - self.start.line + 1
    }
}

impl PartialEq for Pos {
    fn eq(&self, other: &Self) -> bool {
        self.project == other.project
            && self.file == other.file
            && self.start == other.start
            && self.end == other.end
    }
}

impl Eq for Pos {}

impl Hash for Pos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.project.hash(state);
        self.file.hash(state);
        self.start.hash(state);
        self.end.hash(state);
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, start: {}, end: {}, method start: {}, method end: {}",
            self.project, self.file, self.start, self.end, self.method_start, self.method_end
        )
    }
}

/// Shape of the tries built for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrieKind {
    /// Radix trie, edges carry label runs
    #[default]
    Compressed,
    /// One label per edge
    Plain,
}

/// Paths of every file making up one persistent index
#[derive(Debug, Clone)]
pub struct FileLayout {
    pub nodes: PathBuf,
    pub edges: PathBuf,
    pub positions: PathBuf,
    pub projects: PathBuf,
    pub paths: PathBuf,
    pub labels: PathBuf,
    pub linearization: PathBuf,
    pub next_stmt: PathBuf,
    pub meta: PathBuf,
}

impl FileLayout {
    /// Default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            nodes: dir.join("nodes.bin"),
            edges: dir.join("edges.bin"),
            positions: dir.join("positions.bin"),
            projects: dir.join("projects.dict"),
            paths: dir.join("paths.dict"),
            labels: dir.join("labels.dict"),
            linearization: dir.join("linear.bin"),
            next_stmt: dir.join("nextstmt.bin"),
            meta: dir.join("meta.json"),
        }
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        self.meta.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Growth page sizes (bytes) for the three mapped streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub nodes: u64,
    pub edges: u64,
    pub positions: u64,
}

impl Default for PageSizes {
    fn default() -> Self {
        use crate::index::storage::{EDGE_BLOCK_SIZE, NODE_RECORD_SIZE, POS_BLOCK_SIZE};
        Self {
            nodes: (NODE_RECORD_SIZE * 64 * 1024) as u64,
            edges: (EDGE_BLOCK_SIZE * 8 * 1024) as u64,
            positions: (POS_BLOCK_SIZE * 4 * 1024) as u64,
        }
    }
}

/// Index metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub kind: TrieKind,
    /// Number of batches merged so far
    pub merges: u64,
    pub node_count: u64,
    pub edge_count: u64,
    pub position_count: u64,
    pub edge_block_count: u64,
    pub pos_block_count: u64,
    pub buffer_len: u64,
    pub label_count: u64,
    pub file_count: u64,
    pub project_count: u64,
    pub next_stmt_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            version: 1,
            kind: TrieKind::Compressed,
            merges: 0,
            node_count: 0,
            edge_count: 0,
            position_count: 0,
            edge_block_count: 0,
            pos_block_count: 0,
            buffer_len: 0,
            label_count: 0,
            file_count: 0,
            project_count: 0,
            next_stmt_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Configuration for an indexing or query run.
///
/// Keys follow the camelCase names used in config files
/// (`sourceDir`, `batchFileSize`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    pub source_dir: PathBuf,
    pub project: String,
    /// Directory of the persisted files; derived from `source_dir` when unset
    pub data_path: Option<PathBuf>,
    pub node_file: String,
    pub edge_file: String,
    pub pos_file: String,
    pub project_file: String,
    pub path_file: String,
    pub label_file: String,
    pub linearization_file: String,
    pub next_stmt_map_file: String,
    pub node_file_page_size: Option<u64>,
    pub edge_file_page_size: Option<u64>,
    pub pos_file_page_size: Option<u64>,
    /// Source files per merge batch
    pub batch_file_size: usize,
    pub compressed: bool,
    /// Glob patterns selecting the source files to index
    pub include: Vec<String>,
    /// Rename local identifiers to canonical placeholders
    pub rename_identifiers: bool,
    pub verbose: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            project: "default".to_string(),
            data_path: None,
            node_file: "nodes.bin".to_string(),
            edge_file: "edges.bin".to_string(),
            pos_file: "positions.bin".to_string(),
            project_file: "projects.dict".to_string(),
            path_file: "paths.dict".to_string(),
            label_file: "labels.dict".to_string(),
            linearization_file: "linear.bin".to_string(),
            next_stmt_map_file: "nextstmt.bin".to_string(),
            node_file_page_size: None,
            edge_file_page_size: None,
            pos_file_page_size: None,
            batch_file_size: 1000,
            compressed: true,
            include: vec!["**/*.java".to_string()],
            rename_identifiers: true,
            verbose: false,
        }
    }
}

impl IndexConfig {
    pub fn kind(&self) -> TrieKind {
        if self.compressed {
            TrieKind::Compressed
        } else {
            TrieKind::Plain
        }
    }

    /// File layout rooted at `data_dir`, honoring the configured file names
    pub fn layout(&self, data_dir: &Path) -> FileLayout {
        FileLayout {
            nodes: data_dir.join(&self.node_file),
            edges: data_dir.join(&self.edge_file),
            positions: data_dir.join(&self.pos_file),
            projects: data_dir.join(&self.project_file),
            paths: data_dir.join(&self.path_file),
            labels: data_dir.join(&self.label_file),
            linearization: data_dir.join(&self.linearization_file),
            next_stmt: data_dir.join(&self.next_stmt_map_file),
            meta: data_dir.join("meta.json"),
        }
    }

    pub fn page_sizes(&self) -> PageSizes {
        let defaults = PageSizes::default();
        PageSizes {
            nodes: self.node_file_page_size.unwrap_or(defaults.nodes),
            edges: self.edge_file_page_size.unwrap_or(defaults.edges),
            positions: self.pos_file_page_size.unwrap_or(defaults.positions),
        }
    }
}
