#![warn(missing_docs)]

//! simpacket-metadata: a compact record of how each packet's bytes were built up.
//!
//! - [`MetadataLog`]: copy-on-write list of header, trailer and payload items with their
//!   fragment ranges, kept in sync with a packet's byte buffer
//! - [`Items`]: walks the items against the packet bytes
//! - [`PacketPrinter`]: policy deciding how each item is printed on replay
//!
//! Structural mismatches, such as removing a header that is not at the front, are
//! programming errors and panic.

/// Items of a log positioned against packet bytes.
pub mod item;
/// The metadata log.
pub mod log;
/// Printing policy for replaying a log.
pub mod printer;
/// Compact record encoding.
pub mod record;
/// Shared record storage and its free list.
pub mod store;
/// Transfer form of a log.
pub mod transfer;
mod varint;

pub use item::{Item, Items};
pub use log::MetadataLog;
pub use printer::{ChunkPrinter, FragmentInformation, FragmentPrinter, PacketPrinter, PayloadPrinter};
pub use record::{ItemKind, MAX_TYPE_UID};
pub use store::{configure_pool, log_pool_stats, pool_stats, MetadataStore};

pub(crate) use simpacket_core::constants::LIST_END as END;
