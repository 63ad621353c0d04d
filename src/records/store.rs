//! Append-only record store.
//!
//! Each record is written as an 8-byte big-endian length followed by the raw
//! payload. There is no header, checksum or footer; the logical size is the
//! file length.

use crate::config::Config;
use crate::error::{LogError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::Path;
use tracing::{debug, warn};

/// Width of the length prefix in front of every payload.
pub const LEN_WIDTH: u64 = 8;

/// Append-only store of length-prefixed payloads, addressed by byte position.
pub struct Store {
    /// Buffered writer and size counter.
    state: Mutex<StoreState>,

    /// Maximum logical size, if bounded.
    capacity: Option<u64>,
}

enum StoreState {
    Open(StoreInner),

    /// A failed append could not be undone; the file is released.
    Failed,

    Closed,
}

struct StoreInner {
    writer: BufWriter<File>,

    /// Bytes logically written, including anything still buffered.
    size: u64,
}

impl Store {
    /// Open or create a store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        Self::new(file)
    }

    /// Wrap an already opened file. The file must be readable and writable.
    pub fn new(file: File) -> Result<Self> {
        Self::with_capacity(file, None)
    }

    /// Wrap a file, bounding it by `max_store_bytes` when configured.
    pub fn with_config(file: File, config: &Config) -> Result<Self> {
        Self::with_capacity(file, config.store_capacity())
    }

    fn with_capacity(mut file: File, capacity: Option<u64>) -> Result<Self> {
        let size = file.metadata()?.len();

        if size > 0 && size < LEN_WIDTH {
            warn!(size, "store file shorter than a length prefix");
            return Err(LogError::Corruption(format!(
                "store holds {} bytes, less than one {}-byte length prefix",
                size, LEN_WIDTH
            )));
        }

        file.seek(SeekFrom::Start(size))?;
        debug!(size, ?capacity, "opened store");

        Ok(Self {
            state: Mutex::new(StoreState::Open(StoreInner {
                writer: BufWriter::new(file),
                size,
            })),
            capacity,
        })
    }

    /// Append a payload.
    ///
    /// Returns the number of bytes written (prefix included) and the position
    /// the record starts at. The bytes may stay buffered until the next read
    /// or close. A failed append leaves the store as it was before the call.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut guard = self.state.lock();
        let inner = guard.open_mut()?;

        let width = LEN_WIDTH + payload.len() as u64;
        if let Some(capacity) = self.capacity {
            if inner.size + width > capacity {
                return Err(LogError::StoreFull {
                    size: inner.size,
                    capacity,
                });
            }
        }

        let position = inner.size;
        match inner.write_record(payload) {
            Ok(()) => {
                inner.size += width;
                Ok((width, position))
            }
            Err(e) => {
                guard.roll_back();
                Err(e.into())
            }
        }
    }

    /// Read the record starting at `position`.
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut guard = self.state.lock();
        let inner = guard.open_mut()?;
        inner.writer.flush()?;

        let body = match position.checked_add(LEN_WIDTH) {
            Some(body) if body <= inner.size => body,
            _ => {
                return Err(LogError::OutOfRange(format!(
                    "position {} past store size {}",
                    position, inner.size
                )))
            }
        };

        let mut len = [0u8; LEN_WIDTH as usize];
        inner.read_exact_at(&mut len, position)?;
        let len = u64::from_be_bytes(len);

        match body.checked_add(len) {
            Some(end) if end <= inner.size => {}
            _ => {
                return Err(LogError::Corruption(format!(
                    "record at {} claims {} bytes, store size is {}",
                    position, len, inner.size
                )))
            }
        }

        let len = usize::try_from(len).map_err(|_| {
            LogError::OutOfRange(format!("record of {} bytes is not addressable", len))
        })?;
        let mut payload = vec![0u8; len];
        inner.read_exact_at(&mut payload, body)?;
        Ok(payload)
    }

    /// Raw positional read into `buf`, without interpreting the framing.
    ///
    /// Returns the number of bytes read, which is short only at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut guard = self.state.lock();
        let inner = guard.open_mut()?;
        inner.writer.flush()?;
        Ok(inner.read_at(buf, offset)?)
    }

    /// Logical size in bytes, buffered appends included.
    pub fn size(&self) -> Result<u64> {
        Ok(self.state.lock().open_mut()?.size)
    }

    /// Walk every length prefix from the start and return the record count.
    ///
    /// Fails if a frame runs past the logical size.
    pub fn verify(&self) -> Result<u64> {
        let mut guard = self.state.lock();
        let inner = guard.open_mut()?;
        inner.writer.flush()?;

        let mut position = 0u64;
        let mut count = 0u64;
        while position < inner.size {
            if position + LEN_WIDTH > inner.size {
                return Err(LogError::Corruption(format!(
                    "truncated length prefix at {}",
                    position
                )));
            }
            let mut len = [0u8; LEN_WIDTH as usize];
            inner.read_exact_at(&mut len, position)?;

            position = match (position + LEN_WIDTH).checked_add(u64::from_be_bytes(len)) {
                Some(next) if next <= inner.size => next,
                _ => {
                    return Err(LogError::Corruption(format!(
                        "record {} at {} overruns store size {}",
                        count, position, inner.size
                    )))
                }
            };
            count += 1;
        }

        Ok(count)
    }

    /// Flush and sync buffered writes, then release the file.
    ///
    /// Closing twice, or closing a failed store, is a no-op; any other call
    /// after close fails with [`LogError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.state.lock();
        if let StoreState::Failed = *guard {
            *guard = StoreState::Closed;
            return Ok(());
        }
        let inner = match &mut *guard {
            StoreState::Open(inner) => inner,
            _ => return Ok(()),
        };
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;

        if let StoreState::Open(inner) = mem::replace(&mut *guard, StoreState::Closed) {
            debug!(size = inner.size, "closed store");
        }
        Ok(())
    }
}

impl StoreState {
    fn open_mut(&mut self) -> Result<&mut StoreInner> {
        match self {
            StoreState::Open(inner) => Ok(inner),
            StoreState::Failed => Err(LogError::Failed),
            StoreState::Closed => Err(LogError::Closed),
        }
    }

    /// Undo a partial append, or give up on the store if that fails.
    fn roll_back(&mut self) {
        if let StoreState::Open(inner) = mem::replace(self, StoreState::Failed) {
            match inner.roll_back() {
                Ok(inner) => *self = StoreState::Open(inner),
                Err(e) => warn!(error = %e, "could not roll back partial append"),
            }
        }
    }
}

impl StoreInner {
    fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer
            .write_all(&(payload.len() as u64).to_be_bytes())?;
        self.writer.write_all(payload)
    }

    /// Discard everything past `size`, on disk and in the buffer.
    ///
    /// The buffer front sits at the physical end of the file, so earlier
    /// records that were still buffered are written out before truncating.
    fn roll_back(self) -> io::Result<Self> {
        let size = self.size;
        let (mut file, buffered) = self.writer.into_parts();
        let buffered = buffered.unwrap_or_else(|panicked| panicked.into_inner());

        let on_disk = file.metadata()?.len();
        if on_disk < size {
            let missing = (size - on_disk) as usize;
            if buffered.len() < missing {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} buffered bytes lost before {}", missing, size),
                ));
            }
            file.seek(SeekFrom::Start(on_disk))?;
            file.write_all(&buffered[..missing])?;
        }

        file.set_len(size)?;
        file.seek(SeekFrom::Start(size))?;
        debug!(size, discarded = on_disk.max(size) - size, "rolled back partial append");

        Ok(Self {
            writer: BufWriter::new(file),
            size,
        })
    }

    /// Positional read that leaves the cursor at the append point.
    ///
    /// Callers flush first so the buffer is empty.
    fn read_exact_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let size = self.size;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        let result = file.read_exact(buf);
        file.seek(SeekFrom::Start(size))?;
        result
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let size = self.size;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        let result = loop {
            if filled == buf.len() {
                break Ok(filled);
            }
            match file.read(&mut buf[filled..]) {
                Ok(0) => break Ok(filled),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };

        file.seek(SeekFrom::Start(size))?;
        result
    }
}
