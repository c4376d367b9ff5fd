use std::default::Default;

use crate::constants::{FREE_LIST_MAX_ENTRIES, METADATA_MIN_STORE_SIZE};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Configuration options handed to the packet layer and the store pools at simulation setup.
pub struct Config {
    /// Record header/trailer metadata for every packet (default: false).
    pub metadata_enabled: bool,
    /// Recycle released stores through the free lists instead of deallocating them.
    pub free_list_enabled: bool,
    /// Max number of stores each free list keeps.
    pub free_list_capacity: usize,
    /// Smallest backing store allocated for a metadata log, in bytes.
    pub metadata_min_store_size: usize,
}

impl Config {
    /// Returns the default configuration with metadata recording turned on.
    pub fn with_metadata() -> Self {
        Self { metadata_enabled: true, ..Self::default() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_enabled: false,
            free_list_enabled: true,
            free_list_capacity: FREE_LIST_MAX_ENTRIES,
            metadata_min_store_size: METADATA_MIN_STORE_SIZE,
        }
    }
}
