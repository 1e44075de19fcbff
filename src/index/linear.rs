//! Append-only linearization buffer
//!
//! Every edge of the persistent trie references a `[start, end)` slice of
//! this buffer. Values are never rewritten, so edge ranges stay valid across
//! merges and reopen. The file is a flat run of little-endian `u32` label ids;
//! only the tail appended since the last flush is written.

use crate::error::{Result, TrieError};
use crate::index::storage::OpenMode;
use crate::index::types::{LabelId, LabelRange};
use crate::utils::{get_u32, write_u32_le};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct LinearBuffer {
    path: PathBuf,
    mode: OpenMode,
    labels: Vec<LabelId>,
    persisted: usize,
}

impl LinearBuffer {
    pub fn create(path: &Path) -> Result<Self> {
        File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            mode: OpenMode::ReadWrite,
            labels: Vec::new(),
            persisted: 0,
        })
    }

    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let bytes = fs::read(path)?;
        let whole = bytes.len() / 4 * 4;
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

        let labels: Vec<LabelId> = (0..whole).step_by(4).map(|off| get_u32(&bytes, off)).collect();
        let persisted = labels.len();
        Ok(Self {
            path: path.to_path_buf(),
            mode,
            labels,
            persisted,
        })
    }

    pub fn len(&self) -> u64 {
        self.labels.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<LabelId> {
        self.labels.get(index as usize).copied()
    }

    /// Labels of an edge range; a range past the end means corruption
    pub fn slice(&self, range: LabelRange) -> Result<&[LabelId]> {
        self.labels.get(range.as_usize()).ok_or_else(|| {
            TrieError::format(format!(
                "range {}..{} outside linearization buffer of {}",
                range.start,
                range.end,
                self.labels.len()
            ))
        })
    }

    /// Append labels and return the range they occupy
    pub fn extend<I: IntoIterator<Item = LabelId>>(&mut self, labels: I) -> Result<LabelRange> {
        if self.mode == OpenMode::ReadOnly {
            return Err(TrieError::ReadOnly);
        }
        let start = self.len();
        self.labels.extend(labels);
        Ok(LabelRange::new(start, self.len()))
    }

    /// Number of labels not yet written to the file
    pub fn pending(&self) -> usize {
        self.labels.len() - self.persisted
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly || self.pending() == 0 {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for &label in &self.labels[self.persisted..] {
            write_u32_le(&mut writer, label)?;
        }
        writer.flush()?;
        self.persisted = self.labels.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linear.bin");

        let mut buffer = LinearBuffer::create(&path).unwrap();
        let first = buffer.extend([3, 1, 4]).unwrap();
        buffer.flush().unwrap();
        let second = buffer.extend([1, 5]).unwrap();
        assert_eq!(buffer.pending(), 2);
        buffer.flush().unwrap();

        assert_eq!(first, LabelRange::new(0, 3));
        assert_eq!(second, LabelRange::new(3, 5));

        let reopened = LinearBuffer::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(reopened.len(), 5);
        assert_eq!(reopened.slice(first).unwrap(), &[3, 1, 4]);
        assert_eq!(reopened.slice(second).unwrap(), &[1, 5]);
        assert!(reopened.slice(LabelRange::new(4, 9)).is_err());
    }

    #[test]
    fn test_partial_label_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linear.bin");
        fs::write(&path, [7, 0, 0, 0, 9, 0]).unwrap();

        let mut buffer = LinearBuffer::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(buffer.len(), 1);
        buffer.extend([8]).unwrap();
        buffer.flush().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![7, 0, 0, 0, 8, 0, 0, 0]);
    }

    #[test]
    fn test_read_only_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linear.bin");
        LinearBuffer::create(&path).unwrap();

        let mut buffer = LinearBuffer::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(buffer.extend([1]), Err(TrieError::ReadOnly)));
    }
}
