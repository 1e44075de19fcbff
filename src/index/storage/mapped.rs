//! Growable memory-mapped file of fixed-size records.
//!
//! Layout:
//! ```text
//! [magic: [u8; 4]][version: u16][record_size: u16][record_count: u64][item_count: u64]
//! [record 0][record 1]...
//! ```
//!
//! The file is always a whole number of pages long. When an allocation
//! would cross the mapped extent the file is extended by `set_len` and
//! remapped; records are addressed by index, so nothing is ever relocated.

use crate::error::{Result, TrieError};
use crate::utils::{get_u16, get_u64, put_u16, put_u64};
use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const HEADER_SIZE: usize = 24;
const FORMAT_VERSION: u16 = 1;

const COUNT_OFFSET: usize = 8;
const ITEMS_OFFSET: usize = 16;

/// How an existing index is mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(m) => m,
            Mapping::ReadWrite(m) => m,
        }
    }
}

/// One mapped record stream (nodes, edge blocks or position blocks)
pub struct MappedFile {
    path: PathBuf,
    file: File,
    map: Mapping,
    page_size: u64,
    record_size: usize,
}

impl MappedFile {
    /// Create (or truncate) the file and write an empty header
    pub fn initialize(path: &Path, magic: [u8; 4], record_size: usize, page_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let page_size = effective_page_size(page_size, record_size);
        file.set_len(round_up(HEADER_SIZE as u64, page_size))?;

        let mut map = unsafe { MmapMut::map_mut(&file)? };
        map[0..4].copy_from_slice(&magic);
        put_u16(&mut map, 4, FORMAT_VERSION);
        put_u16(&mut map, 6, record_size as u16);
        put_u64(&mut map, COUNT_OFFSET, 0);
        put_u64(&mut map, ITEMS_OFFSET, 0);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map: Mapping::ReadWrite(map),
            page_size,
            record_size,
        })
    }

    /// Map an existing file without touching its content
    pub fn open(
        path: &Path,
        magic: [u8; 4],
        record_size: usize,
        page_size: u64,
        mode: OpenMode,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(TrieError::format(format!(
                "{}: file too small ({} bytes)",
                path.display(),
                len
            )));
        }

        let map = match mode {
            OpenMode::ReadOnly => Mapping::ReadOnly(unsafe { Mmap::map(&file)? }),
            OpenMode::ReadWrite => Mapping::ReadWrite(unsafe { MmapMut::map_mut(&file)? }),
        };

        let bytes = map.bytes();
        if bytes[0..4] != magic {
            return Err(TrieError::format(format!("{}: bad magic", path.display())));
        }
        let version = get_u16(bytes, 4);
        if version != FORMAT_VERSION {
            return Err(TrieError::format(format!(
                "{}: unsupported version {}",
                path.display(),
                version
            )));
        }
        let stored_size = get_u16(bytes, 6) as usize;
        if stored_size != record_size {
            return Err(TrieError::format(format!(
                "{}: record size {} does not match expected {}",
                path.display(),
                stored_size,
                record_size
            )));
        }

        let mapped = Self {
            path: path.to_path_buf(),
            file,
            map,
            page_size: effective_page_size(page_size, record_size),
            record_size,
        };

        let needed = mapped.record_offset(mapped.record_count()) as u64;
        if needed > len {
            return Err(TrieError::format(format!(
                "{}: header claims {} records but file holds {} bytes",
                path.display(),
                mapped.record_count(),
                len
            )));
        }

        Ok(mapped)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        match self.map {
            Mapping::ReadOnly(_) => OpenMode::ReadOnly,
            Mapping::ReadWrite(_) => OpenMode::ReadWrite,
        }
    }

    /// Number of allocated records
    pub fn record_count(&self) -> u64 {
        get_u64(self.map.bytes(), COUNT_OFFSET)
    }

    /// Auxiliary counter kept in the header (edges or positions stored)
    pub fn item_count(&self) -> u64 {
        get_u64(self.map.bytes(), ITEMS_OFFSET)
    }

    pub fn add_items(&mut self, n: u64) -> Result<()> {
        let items = self.item_count() + n;
        let map = self.map_mut()?;
        put_u64(map, ITEMS_OFFSET, items);
        Ok(())
    }

    /// Bytes currently mapped (always a multiple of the page size)
    pub fn mapped_len(&self) -> usize {
        self.map.bytes().len()
    }

    /// Allocate a zeroed record and return its index
    pub fn allocate(&mut self) -> Result<u64> {
        let id = self.record_count();
        let end = self.record_offset(id + 1) as u64;
        self.ensure_len(end)?;

        let start = self.record_offset(id);
        let size = self.record_size;
        let map = self.map_mut()?;
        map[start..start + size].fill(0);
        put_u64(map, COUNT_OFFSET, id + 1);
        Ok(id)
    }

    pub fn record(&self, id: u64) -> Result<&[u8]> {
        self.check_id(id)?;
        let start = self.record_offset(id);
        Ok(&self.map.bytes()[start..start + self.record_size])
    }

    pub fn record_mut(&mut self, id: u64) -> Result<&mut [u8]> {
        self.check_id(id)?;
        let start = self.record_offset(id);
        let size = self.record_size;
        let map = self.map_mut()?;
        Ok(&mut map[start..start + size])
    }

    /// Write dirty pages back to the file
    pub fn flush(&self) -> Result<()> {
        if let Mapping::ReadWrite(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }

    fn check_id(&self, id: u64) -> Result<()> {
        let count = self.record_count();
        if id >= count {
            return Err(TrieError::format(format!(
                "{}: record {} out of range (count {})",
                self.path.display(),
                id,
                count
            )));
        }
        Ok(())
    }

    #[inline]
    fn record_offset(&self, id: u64) -> usize {
        HEADER_SIZE + id as usize * self.record_size
    }

    fn map_mut(&mut self) -> Result<&mut MmapMut> {
        match &mut self.map {
            Mapping::ReadWrite(map) => Ok(map),
            Mapping::ReadOnly(_) => Err(TrieError::ReadOnly),
        }
    }

    /// Grow the file (page-aligned) and remap when `len` exceeds the extent
    fn ensure_len(&mut self, len: u64) -> Result<()> {
        if len <= self.mapped_len() as u64 {
            return Ok(());
        }
        if self.mode() == OpenMode::ReadOnly {
            return Err(TrieError::ReadOnly);
        }

        let new_len = round_up(len, self.page_size);
        self.map_mut()?.flush()?;
        self.file.set_len(new_len)?;
        self.map = Mapping::ReadWrite(unsafe { MmapMut::map_mut(&self.file)? });
        tracing::debug!(
            "grew {} to {} bytes",
            self.path.display(),
            new_len
        );
        Ok(())
    }
}

fn effective_page_size(page_size: u64, record_size: usize) -> u64 {
    page_size.max((HEADER_SIZE + record_size) as u64)
}

fn round_up(len: u64, page: u64) -> u64 {
    len.div_ceil(page) * page
}
