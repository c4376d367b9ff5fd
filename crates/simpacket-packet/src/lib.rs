#![warn(missing_docs)]

//! simpacket-packet: the packet type tying a byte buffer to its metadata log.
//!
//! - [`PacketContext`]: per-simulation settings and packet uid allocation
//! - [`Packet`]: header, trailer, fragment and merge operations kept in sync across bytes
//!   and metadata
//! - [`Chunk`], [`Header`], [`Trailer`]: what protocol code implements to live in a packet

/// Chunk capability traits.
pub mod chunk;
/// Packet creation context.
pub mod context;
/// The packet type.
pub mod packet;
/// Typed printer registration.
pub mod printer;
/// Whole-packet transfer form.
pub mod transfer;

pub use chunk::{Chunk, Header, Trailer};
pub use context::PacketContext;
pub use packet::Packet;
pub use printer::PrinterExt;
