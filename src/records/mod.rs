//! Record storage.
//!
//! Payloads live in an append-only store addressed by byte position; a
//! memory-mapped index translates logical record numbers into those
//! positions for O(1) access.

mod entry;
mod index;
mod store;

pub use entry::{ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use index::Index;
pub use store::{Store, LEN_WIDTH};
