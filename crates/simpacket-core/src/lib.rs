#![warn(missing_docs)]

//! simpacket-core: foundational types shared by the buffer, metadata and packet layers.
//!
//! This crate provides the minimal set of core utilities shared across all layers:
//! - Configuration types
//! - Error handling for transfer-form decoding
//! - Layout constants
//! - Bounded free lists used to recycle backing stores
//!
//! Byte-level logic lives in specialized crates:
//! - `simpacket-buffer`: copy-on-write byte buffer and its iterator
//! - `simpacket-metadata`: header/trailer metadata log and printer
//! - `simpacket-packet`: the packet type tying both together

/// Layout constants shared across layers.
pub mod constants {
    /// Maximum number of entries a free list keeps before it starts deallocating.
    pub const FREE_LIST_MAX_ENTRIES: usize = 1000;
    /// Smallest backing store allocated for a metadata log.
    pub const METADATA_MIN_STORE_SIZE: usize = 10;
    /// Largest backing store a metadata log may address with its 16-bit links.
    pub const METADATA_MAX_STORE_SIZE: usize = 0xfffe;
    /// Link value marking the end of the metadata item list.
    pub const LIST_END: u16 = 0xffff;
    /// Size of the zero block used to synthesize virtual zero bytes on copy-out.
    pub const ZERO_BLOCK_SIZE: usize = 1000;
    /// Alignment used by the transfer forms.
    pub const TRANSFER_ALIGNMENT: usize = 4;
}

/// Configuration options for buffers, metadata and pools.
pub mod config;
/// Error types and results.
pub mod error;
/// Bounded free lists for recycling backing stores.
pub mod pool;

pub use config::Config;
pub use error::{DecodingErrorKind, ErrorKind, Result};
pub use pool::{FreeList, PoolStats, Recyclable};
