//! # Commit Log
//!
//! The storage core of a write-ahead log: an append-only record store paired
//! with a fixed-width, memory-mapped index.
//!
//! ## Core Concepts
//!
//! - **Store**: length-prefixed payloads addressed by byte position
//! - **Index**: logical record number to store position, 12 bytes per entry
//! - **MemoryLog**: an in-process log with the same append/read contract
//!
//! The store never numbers records and the index never sees payloads; a
//! caller pairs them.
//!
//! ## Example
//!
//! ```no_run
//! use commitlog::{Config, Index, Store};
//!
//! # fn main() -> commitlog::Result<()> {
//! let config = Config::default();
//! let store = Store::open("segment.store")?;
//! let index = Index::open("segment.index", &config)?;
//!
//! let (_, position) = store.append(b"hello")?;
//! index.write(0, position)?;
//!
//! let (_, position) = index.read(-1)?;
//! assert_eq!(store.read(position)?, b"hello");
//!
//! index.close()?;
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod records;

// Re-exports
pub use config::{Config, SegmentConfig};
pub use error::{LogError, Result};
pub use memory::{MemoryLog, Record};
pub use records::{Index, Store, ENTRY_WIDTH, LEN_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
