//! Transfer form of a whole packet: a `u32` little-endian length followed by the buffer
//! transfer form, then the metadata transfer form.

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use simpacket_buffer::ByteBuffer;
use simpacket_core::{DecodingErrorKind, ErrorKind, Result};
use simpacket_metadata::MetadataLog;

use crate::Packet;

impl Packet {
    /// Returns the number of bytes [`serialize`](Self::serialize) appends.
    pub fn serialized_size(&self) -> usize {
        4 + self.buffer.serialized_size() + self.metadata.serialized_size()
    }

    /// Appends the transfer form of this packet to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.reserve(self.serialized_size());
        out.write_u32::<LittleEndian>(self.buffer.serialized_size() as u32)?;
        self.buffer.serialize(out)?;
        self.metadata.serialize(out)
    }

    /// Rebuilds a packet from its transfer form.
    pub fn deserialize(bytes: &[u8]) -> Result<Packet> {
        let mut cursor = Cursor::new(bytes);
        let buffer_len = cursor.read_u32::<LittleEndian>()? as usize;
        let rest = &bytes[4..];
        if buffer_len > rest.len() {
            return Err(ErrorKind::Truncated { needed: buffer_len, available: rest.len() });
        }
        let buffer = ByteBuffer::deserialize(&rest[..buffer_len])?;
        let metadata = MetadataLog::deserialize(&rest[buffer_len..])?;
        if metadata.is_enabled() && metadata.total_size() != buffer.size() {
            return Err(DecodingErrorKind::LengthMismatch {
                expected: buffer.size() as usize,
                actual: metadata.total_size() as usize,
            }
            .into());
        }
        Ok(Packet { buffer, metadata })
    }
}

#[cfg(test)]
mod tests {
    use simpacket_core::Config;

    use super::*;
    use crate::PacketContext;

    #[test]
    fn test_round_trip() {
        let ctx = PacketContext::new(Config::with_metadata());
        let mut packet = Packet::from_bytes(&ctx, &[1, 2, 3]);
        packet.add_at_end(&Packet::new(&ctx, 500));
        let mut out = Vec::new();
        packet.serialize(&mut out).unwrap();
        assert_eq!(out.len(), packet.serialized_size());

        let decoded = Packet::deserialize(&out).unwrap();
        assert_eq!(decoded.uid(), packet.uid());
        assert_eq!(decoded.to_vec(), packet.to_vec());
        assert_eq!(decoded.to_string(), packet.to_string());
    }

    #[test]
    fn test_mismatched_parts_rejected() {
        let ctx = PacketContext::new(Config::with_metadata());
        let long = Packet::new(&ctx, 20);
        let short = Packet::new(&ctx, 10);
        let mut out = Vec::new();
        out.extend_from_slice(&(short.buffer.serialized_size() as u32).to_le_bytes());
        short.buffer.serialize(&mut out).unwrap();
        long.metadata.serialize(&mut out).unwrap();
        let err = Packet::deserialize(&out).unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::DecodingError(DecodingErrorKind::LengthMismatch { expected: 10, actual: 20 })
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let err = Packet::deserialize(&[40, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, ErrorKind::Truncated { needed: 40, available: 1 }));
    }
}
