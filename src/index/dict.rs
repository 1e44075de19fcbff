//! String interning for labels, file paths and project names
//!
//! Ids are assigned in first-seen order starting at 0 and are never reused.
//! A [`Dictionary`] persists an [`Interner`] as an append-only file of
//! length-prefixed UTF-8 records; id = record index. Reopening replays the
//! file to rebuild the forward map.

use crate::error::{Result, TrieError};
use crate::index::storage::OpenMode;
use crate::utils::{read_u32_le, write_str};
use rustc_hash::FxHashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// In-memory bidirectional string <-> id map
#[derive(Debug, Default, Clone)]
pub struct Interner {
    ids: FxHashMap<String, u32>,
    strings: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `value`, assigning the next id on first sight
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.ids.get(value) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.ids.insert(value.to_string(), id);
        id
    }

    pub fn get(&self, value: &str) -> Option<u32> {
        self.ids.get(value).copied()
    }

    pub fn resolve(&self, id: u32) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Strings in id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(id, s)| (id as u32, s.as_str()))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.strings.clear();
    }
}

/// File-backed interner
pub struct Dictionary {
    path: PathBuf,
    interner: Interner,
    writer: Option<BufWriter<File>>,
}

impl Dictionary {
    /// Create an empty dictionary, truncating any existing file
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            interner: Interner::new(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Replay an existing dictionary file.
    ///
    /// A partial trailing record (interrupted write) is ignored; in write
    /// mode the file is truncated back to the last complete record.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut interner = Interner::new();
        let mut valid_len = 0u64;

        loop {
            let len = match read_u32_le(&mut reader) {
                Ok(Some(len)) => len as usize,
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn_truncated(path, valid_len);
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let mut bytes = vec![0u8; len];
            match reader.read_exact(&mut bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn_truncated(path, valid_len);
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let value = String::from_utf8(bytes).map_err(|_| {
                TrieError::format(format!(
                    "{}: invalid UTF-8 in record {}",
                    path.display(),
                    interner.len()
                ))
            })?;
            let expected = interner.len() as u32;
            if interner.intern(&value) != expected {
                return Err(TrieError::format(format!(
                    "{}: duplicate entry {:?}",
                    path.display(),
                    value
                )));
            }
            valid_len += 4 + len as u64;
        }

        let writer = match mode {
            OpenMode::ReadOnly => None,
            OpenMode::ReadWrite => {
                let file = OpenOptions::new().write(true).open(path)?;
                if file.metadata()?.len() != valid_len {
                    file.set_len(valid_len)?;
                }
                let file = OpenOptions::new().append(true).open(path)?;
                Some(BufWriter::new(file))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            interner,
            writer,
        })
    }

    /// Id of `value`, appending it to the file on first sight
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if let Some(id) = self.interner.get(value) {
            return Ok(id);
        }
        let writer = self.writer.as_mut().ok_or(TrieError::ReadOnly)?;
        write_str(writer, value)?;
        Ok(self.interner.intern(value))
    }

    pub fn get(&self, value: &str) -> Option<u32> {
        self.interner.get(value)
    }

    pub fn resolve(&self, id: u32) -> Option<&str> {
        self.interner.resolve(id)
    }

    /// Resolve an id read from storage; a dangling id means corruption
    pub fn resolve_stored(&self, id: u32) -> Result<&str> {
        self.resolve(id).ok_or_else(|| {
            TrieError::format(format!("{}: unknown id {}", self.path.display(), id))
        })
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn warn_truncated(path: &Path, valid_len: u64) {
    tracing::warn!(
        "{}: ignoring truncated record after byte {}",
        path.display(),
        valid_len
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("ReturnStmt");
        let b = interner.intern("$0");
        assert_eq!(interner.intern("ReturnStmt"), a);
        assert_eq!((a, b), (0, 1));
        assert_eq!(interner.resolve(b), Some("$0"));
        assert_eq!(interner.get("missing"), None);
        assert_eq!(interner.resolve(7), None);
    }

    #[test]
    fn test_dictionary_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.dict");
        {
            let mut dict = Dictionary::create(&path).unwrap();
            for label in ["return", "$0", ";", "return"] {
                dict.intern(label).unwrap();
            }
            dict.flush().unwrap();
        }

        let mut dict = Dictionary::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get(";"), Some(2));
        assert_eq!(dict.intern("if").unwrap(), 3);
        dict.flush().unwrap();

        let dict = Dictionary::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(dict.resolve(3), Some("if"));
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paths.dict");
        {
            let mut dict = Dictionary::create(&path).unwrap();
            dict.intern("src/A.java").unwrap();
            dict.flush().unwrap();
        }
        // Half-written second record
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[20, 0, 0, 0, b's', b'r']).unwrap();
        }

        let mut dict = Dictionary::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.intern("src/B.java").unwrap(), 1);
        dict.flush().unwrap();

        let dict = Dictionary::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.resolve(1), Some("src/B.java"));
    }

    #[test]
    fn test_read_only_rejects_new_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.dict");
        Dictionary::create(&path).unwrap().flush().unwrap();

        let mut dict = Dictionary::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(dict.intern("p"), Err(TrieError::ReadOnly)));
    }
}
