use std::fmt;

use simpacket_buffer::{BufferIterator, BufferWriter};

/// A protocol chunk that can be written into and read back from packet bytes.
///
/// Headers are handed a cursor at their first byte. Trailers are handed a cursor just past
/// their last byte and step back over their own size before reading or writing.
pub trait Chunk {
    /// Returns the uid identifying this chunk type in packet metadata.
    ///
    /// Must be non-zero and at most [`MAX_TYPE_UID`](simpacket_metadata::MAX_TYPE_UID).
    fn type_uid(&self) -> u32;

    /// Returns the display name of this chunk type.
    fn name(&self) -> &str;

    /// Returns the number of bytes [`serialize`](Self::serialize) writes.
    fn serialized_size(&self) -> u32;

    /// Writes the chunk at `cursor`.
    ///
    /// The cursor only accepts writes inside the bytes reserved for this chunk.
    fn serialize(&self, cursor: &mut BufferWriter<'_>);

    /// Reads the chunk at `cursor` and returns the number of bytes it spans.
    fn deserialize(&mut self, cursor: &mut BufferIterator<'_>) -> u32;

    /// Writes a human-readable description of the chunk fields.
    fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// A chunk pushed at the front of a packet.
pub trait Header: Chunk {}

/// A chunk pushed at the back of a packet.
pub trait Trailer: Chunk {}
