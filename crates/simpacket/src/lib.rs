#![warn(missing_docs)]

//! Simpacket: a small public API facade for the workspace.
//!
//! This crate re-exports the types protocol models need to build and inspect simulated
//! packets:
//!
//! - Packets and their creation context (`Packet`, `PacketContext`)
//! - Chunk traits for headers and trailers (`Chunk`, `Header`, `Trailer`)
//! - Metadata replay (`PacketPrinter`, `Item`, `ItemKind`)
//! - Core configuration (`Config`)
//!
//! Example
//! ```ignore
//! use simpacket::prelude::*;
//!
//! let ctx = PacketContext::new(Config::with_metadata());
//! let mut packet = Packet::new(&ctx, 100);
//! packet.add_header(&udp_header);
//!
//! let mut printer = PacketPrinter::new();
//! printer.register_header::<UdpHeader>();
//! let mut out = String::new();
//! packet.print(&mut out, &printer).unwrap();
//! ```

// Core config and decoding errors
pub use simpacket_core::{Config, DecodingErrorKind, ErrorKind, Result};
// Bytes
pub use simpacket_buffer::{BufferIterator, BufferWriter, ByteBuffer};
// Metadata
pub use simpacket_metadata::{FragmentInformation, Item, ItemKind, MetadataLog, PacketPrinter};
// Packets
pub use simpacket_packet::{Chunk, Header, Packet, PacketContext, PrinterExt, Trailer};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        BufferIterator, BufferWriter, Chunk, Config, FragmentInformation, Header, ItemKind, Packet,
        PacketContext, PacketPrinter, PrinterExt, Trailer,
    };
}
