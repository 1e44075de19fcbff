//! Statement adjacency map (`nextstmt.bin`)
//!
//! Records which statement follows another in the same block. The file is a
//! flat run of `(prev, next)` position-record pairs; lookups go through an
//! in-memory map keyed by the identity part of the previous record.

use crate::error::Result;
use crate::index::storage::{OpenMode, POS_SIZE, PosRecord};
use crate::index::types::{FileId, Position, ProjectId};
use rustc_hash::FxHashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const PAIR_SIZE: usize = POS_SIZE * 2;

type PosKey = (ProjectId, FileId, Position, Position);

pub struct NextStmtMap {
    path: PathBuf,
    mode: OpenMode,
    next: FxHashMap<PosKey, PosRecord>,
    /// Pairs in insertion order, including those already on disk
    pairs: Vec<(PosRecord, PosRecord)>,
    persisted: usize,
}

impl NextStmtMap {
    pub fn create(path: &Path) -> Result<Self> {
        File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            mode: OpenMode::ReadWrite,
            next: FxHashMap::default(),
            pairs: Vec::new(),
            persisted: 0,
        })
    }

    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let bytes = fs::read(path)?;
        let whole = bytes.len() / PAIR_SIZE * PAIR_SIZE;
        if whole != bytes.len() {
            tracing::warn!(
                "{}: ignoring {} trailing bytes",
                path.display(),
                bytes.len() - whole
            );
            if mode == OpenMode::ReadWrite {
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(whole as u64)?;
            }
        }

        let mut map = Self {
            path: path.to_path_buf(),
            mode,
            next: FxHashMap::default(),
            pairs: Vec::with_capacity(whole / PAIR_SIZE),
            persisted: 0,
        };
        for chunk in bytes[..whole].chunks_exact(PAIR_SIZE) {
            let prev = PosRecord::decode(&chunk[..POS_SIZE]);
            let next = PosRecord::decode(&chunk[POS_SIZE..]);
            map.record(prev, next);
        }
        map.persisted = map.pairs.len();
        Ok(map)
    }

    fn record(&mut self, prev: PosRecord, next: PosRecord) {
        self.next.insert(prev.key(), next);
        self.pairs.push((prev, next));
    }

    pub fn insert(&mut self, prev: PosRecord, next: PosRecord) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(crate::error::TrieError::ReadOnly);
        }
        self.record(prev, next);
        Ok(())
    }

    /// Statement recorded after `prev`, if any
    pub fn get(&self, prev: &PosRecord) -> Option<&PosRecord> {
        self.next.get(&prev.key())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(PosRecord, PosRecord)] {
        &self.pairs
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly || self.persisted == self.pairs.len() {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let mut chunk = [0u8; PAIR_SIZE];
        for (prev, next) in &self.pairs[self.persisted..] {
            prev.encode(&mut chunk[..POS_SIZE]);
            next.encode(&mut chunk[POS_SIZE..]);
            writer.write_all(&chunk)?;
        }
        writer.flush()?;
        self.persisted = self.pairs.len();
        Ok(())
    }
}
