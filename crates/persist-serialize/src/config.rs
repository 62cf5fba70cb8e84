use serde::{Deserialize, Serialize};

use persist_record::MAX_NESTING_DEPTH;

/// Configuration for [`ObjectWriter`](crate::ObjectWriter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum nesting of lists, maps, and inline objects within one record.
    /// Values above the record format's own limit are clamped to it.
    pub max_depth: usize,
    /// Maximum size of a single encoded record in bytes. Checked while
    /// encoding, so an oversized record is abandoned early.
    pub max_record_size: usize,
    /// Maximum number of inline instances written into one record.
    pub max_inline_objects: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_record_size: 16 * 1024 * 1024,
            max_inline_objects: 65_536,
        }
    }
}

impl WriterConfig {
    /// The depth limit actually enforced.
    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.min(MAX_NESTING_DEPTH)
    }
}
