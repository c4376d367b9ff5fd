use std::fmt;

use simpacket_buffer::ByteBuffer;
use simpacket_metadata::{Items, MetadataLog, PacketPrinter};

use crate::{Header, PacketContext, Trailer};

/// A simulated packet: bytes plus the record of how they were built.
///
/// Cloning is O(1); clones share storage until one of them is modified.
#[derive(Clone, Debug)]
pub struct Packet {
    pub(crate) buffer: ByteBuffer,
    pub(crate) metadata: MetadataLog,
}

impl Packet {
    /// Creates a packet of `size` zero bytes of payload.
    ///
    /// The payload is virtual: it takes no storage until something reads it as a slice.
    pub fn new(ctx: &PacketContext, size: u32) -> Self {
        let uid = ctx.allocate_uid();
        Self {
            buffer: ByteBuffer::with_zero_size(size),
            metadata: MetadataLog::new(uid, size, ctx.metadata_enabled()),
        }
    }

    /// Creates a packet whose payload is a copy of `bytes`.
    pub fn from_bytes(ctx: &PacketContext, bytes: &[u8]) -> Self {
        let size = bytes.len() as u32;
        let mut buffer = ByteBuffer::new();
        buffer.prepend(size).write(bytes);
        let uid = ctx.allocate_uid();
        Self { buffer, metadata: MetadataLog::new(uid, size, ctx.metadata_enabled()) }
    }

    /// Returns the uid of the packet this one was created as or fragmented from.
    pub fn uid(&self) -> u64 {
        self.metadata.uid()
    }

    /// Returns the number of bytes in the packet.
    pub fn size(&self) -> u32 {
        self.buffer.size()
    }

    /// Returns true when the packet holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the packet bytes.
    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    /// Returns the packet metadata.
    pub fn metadata(&self) -> &MetadataLog {
        &self.metadata
    }

    /// Serializes `header` in front of the packet.
    pub fn add_header<H: Header>(&mut self, header: &H) {
        let size = header.serialized_size();
        header.serialize(&mut self.buffer.prepend(size));
        self.metadata.add_header(header.type_uid(), size);
    }

    /// Deserializes the front header into `header` and removes its bytes.
    ///
    /// Returns the number of bytes removed.
    ///
    /// # Panics
    ///
    /// Panics when metadata is recorded and the front item is not a complete `H`.
    pub fn remove_header<H: Header>(&mut self, header: &mut H) -> u32 {
        let size = header.deserialize(&mut self.buffer.begin());
        self.buffer.remove_at_start(size);
        self.metadata.remove_header(header.type_uid(), size);
        size
    }

    /// Deserializes the front header into `header` without removing it.
    pub fn peek_header<H: Header>(&self, header: &mut H) -> u32 {
        header.deserialize(&mut self.buffer.begin())
    }

    /// Serializes `trailer` at the back of the packet.
    pub fn add_trailer<T: Trailer>(&mut self, trailer: &T) {
        let size = trailer.serialized_size();
        trailer.serialize(&mut self.buffer.append(size));
        self.metadata.add_trailer(trailer.type_uid(), size);
    }

    /// Deserializes the back trailer into `trailer` and removes its bytes.
    ///
    /// # Panics
    ///
    /// Panics when metadata is recorded and the back item is not a complete `T`.
    pub fn remove_trailer<T: Trailer>(&mut self, trailer: &mut T) -> u32 {
        let size = trailer.deserialize(&mut self.buffer.end());
        self.buffer.remove_at_end(size);
        self.metadata.remove_trailer(trailer.type_uid(), size);
        size
    }

    /// Deserializes the back trailer into `trailer` without removing it.
    pub fn peek_trailer<T: Trailer>(&self, trailer: &mut T) -> u32 {
        trailer.deserialize(&mut self.buffer.end())
    }

    /// Appends the bytes and metadata of `other`.
    pub fn add_at_end(&mut self, other: &Packet) {
        self.buffer.add_buffer_at_end(&other.buffer);
        self.metadata.add_at_end(&other.metadata);
    }

    /// Appends `size` zero bytes of padding.
    pub fn add_padding_at_end(&mut self, size: u32) {
        if size == 0 {
            return;
        }
        let mut i = self.buffer.append(size);
        i.prev_by(size);
        i.write_u8_repeat(0, size);
        self.metadata.add_padding_at_end(size);
    }

    /// Removes `size` bytes from the front, or everything when the packet is shorter.
    pub fn remove_at_start(&mut self, size: u32) {
        let size = self.clamp_removal(size, "start");
        self.buffer.remove_at_start(size);
        self.metadata.remove_at_start(size);
    }

    /// Removes `size` bytes from the back, or everything when the packet is shorter.
    pub fn remove_at_end(&mut self, size: u32) {
        let size = self.clamp_removal(size, "end");
        self.buffer.remove_at_end(size);
        self.metadata.remove_at_end(size);
    }

    fn clamp_removal(&self, size: u32, side: &str) -> u32 {
        if size > self.size() {
            tracing::warn!(
                "packet {}: removing {} bytes at {} of a {} byte packet, clamped",
                self.uid(),
                size,
                side,
                self.size()
            );
            return self.size();
        }
        size
    }

    /// Returns a packet holding `length` bytes starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics when the range does not lie within the packet.
    pub fn create_fragment(&self, start: u32, length: u32) -> Packet {
        let buffer = self.buffer.create_fragment(start, length);
        let metadata = self.metadata.create_fragment(start, self.size() - start - length);
        Packet { buffer, metadata }
    }

    /// Copies the first bytes of the packet into `out`, returning how many were copied.
    pub fn copy_data(&self, out: &mut [u8]) -> usize {
        self.buffer.copy_data(out)
    }

    /// Returns a copy of the packet bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Walks the recorded items against the packet bytes.
    pub fn items(&self) -> Items<'_> {
        self.metadata.items(&self.buffer)
    }

    /// Replays the recorded items through `printer`.
    pub fn print(&self, out: &mut dyn fmt::Write, printer: &PacketPrinter) -> fmt::Result {
        self.metadata.print(out, &self.buffer, printer)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f, &PacketPrinter::default())
    }
}
