//! Memory-mapped offset index.
//!
//! The backing file is grown to `max_index_bytes` and mapped read-write while
//! the index is open. Only the prefix up to the logical size holds entries;
//! closing syncs the mapping and shrinks the file back to that prefix, so a
//! re-opened index resumes after its last entry.

use super::entry::{EntryView, EntryViewMut, ENTRY_WIDTH};
use crate::config::Config;
use crate::error::{LogError, Result};
use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, warn};

/// Fixed-width index from logical record numbers to store positions.
pub struct Index {
    /// File, mapping and size counter; `None` once closed.
    inner: Mutex<Option<IndexInner>>,

    /// Configured maximum size, equal to the mapped length.
    capacity: u64,
}

struct IndexInner {
    file: File,
    mmap: MmapMut,

    /// Bytes of entries written.
    size: u64,
}

impl Index {
    /// Open or create an index file at `path`.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        Self::new(file, config)
    }

    /// Wrap an already opened file, pre-allocating and mapping it.
    ///
    /// The logical size is taken from the file length before it is grown.
    pub fn new(file: File, config: &Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.segment.max_index_bytes;
        let size = file.metadata()?.len();

        if size % ENTRY_WIDTH != 0 {
            warn!(size, "index size is not a whole number of entries");
            return Err(LogError::Corruption(format!(
                "index holds {} bytes, not a multiple of {}",
                size, ENTRY_WIDTH
            )));
        }
        if size > capacity {
            warn!(size, capacity, "index larger than configured maximum");
            return Err(LogError::Corruption(format!(
                "index holds {} bytes, more than max_index_bytes {}",
                size, capacity
            )));
        }

        file.set_len(capacity)?;
        let mmap = match Self::map(&file, capacity) {
            Ok(mmap) => mmap,
            Err(e) => {
                // Leave the caller's file at its original length.
                if let Err(restore) = file.set_len(size) {
                    warn!(error = %restore, size, "could not restore index length");
                }
                return Err(e);
            }
        };

        debug!(size, capacity, "opened index");

        Ok(Self {
            inner: Mutex::new(Some(IndexInner { file, mmap, size })),
            capacity,
        })
    }

    fn map(file: &File, capacity: u64) -> Result<MmapMut> {
        // SAFETY: the index owns the file exclusively and never resizes it
        // while mapped; the map is dropped before the file is truncated in
        // `close`. Cross-process writers are unsupported.
        let mmap = unsafe { MmapOptions::new().map_mut(file)? };

        if mmap.len() as u64 != capacity {
            return Err(LogError::Corruption(format!(
                "mapped {} bytes, expected {}",
                mmap.len(),
                capacity
            )));
        }
        Ok(mmap)
    }

    /// Append an entry for the next record.
    ///
    /// Fails with [`LogError::IndexFull`] when the entry would not fit; the
    /// caller should roll to a new segment.
    pub fn write(&self, offset: u32, position: u64) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(LogError::Closed)?;
        debug_assert_eq!(inner.mmap.len() as u64, self.capacity);

        inner.size = EntryViewMut::new(&mut inner.mmap[..], inner.size).push(offset, position)?;
        Ok(())
    }

    /// Look up entry `n`, or the last entry when `n` is -1.
    ///
    /// Returns the stored relative offset and store position.
    pub fn read(&self, n: i64) -> Result<(u32, u64)> {
        let guard = self.inner.lock();
        let inner = guard.as_ref().ok_or(LogError::Closed)?;
        if inner.size == 0 {
            return Err(LogError::EmptyIndex);
        }

        let view = EntryView::new(&inner.mmap[..], inner.size);
        let entry = match n {
            -1 => view.len() - 1,
            n if n >= 0 => n as u64,
            n => return Err(LogError::OutOfRange(format!("invalid entry number {}", n))),
        };
        view.get(entry)
    }

    /// Bytes of entries written.
    pub fn size(&self) -> Result<u64> {
        self.inner
            .lock()
            .as_ref()
            .map(|inner| inner.size)
            .ok_or(LogError::Closed)
    }

    /// Number of entries written.
    pub fn entries(&self) -> Result<u64> {
        Ok(self.size()? / ENTRY_WIDTH)
    }

    /// Mapped length in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether the next write would fail.
    pub fn is_full(&self) -> Result<bool> {
        Ok(self.size()? + ENTRY_WIDTH > self.capacity)
    }

    /// Sync the mapping and the file, truncate to the logical size, and
    /// release the file.
    ///
    /// Closing twice is a no-op; any other call after close fails with
    /// [`LogError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = match guard.as_mut() {
            Some(inner) => inner,
            None => return Ok(()),
        };

        // Dirty pages must reach the file before it is synced and shrunk.
        inner.mmap.flush()?;
        inner.file.sync_all()?;

        if let Some(IndexInner { file, mmap, size }) = guard.take() {
            drop(mmap);
            file.set_len(size)?;
            debug!(size, "closed index");
        }
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close index on drop");
        }
    }
}
