//! Bounds-checked access to fixed-width index entries.
//!
//! Entry `k` occupies bytes `k * ENTRY_WIDTH .. (k + 1) * ENTRY_WIDTH` of the
//! mapped region:
//!
//! ```text
//! | relative offset: u32 BE | position: u64 BE |
//! | 4 bytes                 | 8 bytes          |
//! ```

use crate::error::{LogError, Result};
use std::ops::Range;

/// Width of the relative offset field.
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;

/// Width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// Read-only view over the written prefix of an index region.
pub(crate) struct EntryView<'a> {
    region: &'a [u8],
    size: u64,
}

impl<'a> EntryView<'a> {
    pub(crate) fn new(region: &'a [u8], size: u64) -> Self {
        Self { region, size }
    }

    /// Number of entries written.
    pub(crate) fn len(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// Decode entry `entry`, rejecting anything outside the written prefix.
    pub(crate) fn get(&self, entry: u64) -> Result<(u32, u64)> {
        if entry >= self.len() {
            return Err(LogError::OutOfRange(format!(
                "entry {} requested, index holds {}",
                entry,
                self.len()
            )));
        }
        let bytes = &self.region[span(entry * ENTRY_WIDTH)?];

        let mut offset = [0u8; OFFSET_WIDTH as usize];
        offset.copy_from_slice(&bytes[..OFFSET_WIDTH as usize]);
        let mut position = [0u8; POSITION_WIDTH as usize];
        position.copy_from_slice(&bytes[OFFSET_WIDTH as usize..]);

        Ok((u32::from_be_bytes(offset), u64::from_be_bytes(position)))
    }
}

/// Writable view that appends entries after the written prefix.
pub(crate) struct EntryViewMut<'a> {
    region: &'a mut [u8],
    size: u64,
}

impl<'a> EntryViewMut<'a> {
    pub(crate) fn new(region: &'a mut [u8], size: u64) -> Self {
        Self { region, size }
    }

    /// Encode an entry at the current logical size and return the new size.
    ///
    /// Fails without touching the region when the entry would not fit.
    pub(crate) fn push(&mut self, offset: u32, position: u64) -> Result<u64> {
        let capacity = self.region.len() as u64;
        if self.size + ENTRY_WIDTH > capacity {
            return Err(LogError::IndexFull {
                size: self.size,
                capacity,
            });
        }
        let bytes = &mut self.region[span(self.size)?];
        bytes[..OFFSET_WIDTH as usize].copy_from_slice(&offset.to_be_bytes());
        bytes[OFFSET_WIDTH as usize..].copy_from_slice(&position.to_be_bytes());

        self.size += ENTRY_WIDTH;
        Ok(self.size)
    }
}

fn span(start: u64) -> Result<Range<usize>> {
    let start = usize::try_from(start)
        .map_err(|_| LogError::OutOfRange(format!("byte {} is not addressable", start)))?;
    Ok(start..start + ENTRY_WIDTH as usize)
}
