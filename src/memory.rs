//! In-process record log.
//!
//! Holds records in a vector behind a mutex with the same append/read
//! contract as the file-backed log. Useful as a stand-in for the store in
//! tests and for callers that do not need persistence.

use crate::error::{LogError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A record and the offset it was assigned.
///
/// Serializes as `{"value": "<base64>", "offset": n}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub offset: u64,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(de::Error::custom)
    }
}

/// Mutex-guarded in-memory log.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<Record>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its offset.
    pub fn append(&self, value: Vec<u8>) -> u64 {
        let mut records = self.records.lock();
        let offset = records.len() as u64;
        records.push(Record { value, offset });
        offset
    }

    /// Read the record at `offset`.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let records = self.records.lock();
        usize::try_from(offset)
            .ok()
            .and_then(|i| records.get(i))
            .cloned()
            .ok_or_else(|| {
                LogError::OutOfRange(format!(
                    "offset {} requested, log holds {}",
                    offset,
                    records.len()
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
