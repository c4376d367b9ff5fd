//! Whole-buffer transfer form.
//!
//! Used to move a buffer between simulation partitions. The layout is little-endian:
//!
//! ```text
//! u32 zero area length
//! u32 leading length, leading bytes padded to 4
//! u32 trailing length, trailing bytes padded to 4
//! ```

use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use simpacket_core::{constants::TRANSFER_ALIGNMENT, DecodingErrorKind, ErrorKind, Result};

use crate::ByteBuffer;

/// Rounds `len` up to the transfer alignment.
pub(crate) fn padded(len: usize) -> usize {
    (len + TRANSFER_ALIGNMENT - 1) & !(TRANSFER_ALIGNMENT - 1)
}

fn write_padded(out: &mut Vec<u8>, bytes: &[u8]) -> io::Result<()> {
    out.write_u32::<LittleEndian>(bytes.len() as u32)?;
    out.write_all(bytes)?;
    out.resize(out.len() + padded(bytes.len()) - bytes.len(), 0);
    Ok(())
}

fn read_padded<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8]> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let position = cursor.position() as usize;
    let input: &'a [u8] = *cursor.get_ref();
    let available = input.len() - position;
    if padded(len) > available {
        return Err(ErrorKind::Truncated { needed: padded(len), available });
    }
    cursor.set_position((position + padded(len)) as u64);
    Ok(&input[position..position + len])
}

impl ByteBuffer {
    /// Returns the number of bytes [`serialize`](Self::serialize) appends.
    pub fn serialized_size(&self) -> usize {
        let lead = self.lead_bytes().len();
        let tail = self.tail_bytes().len();
        4 + 4 + padded(lead) + 4 + padded(tail)
    }

    /// Appends the transfer form of this buffer to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.reserve(self.serialized_size());
        out.write_u32::<LittleEndian>(self.zero_area_size())?;
        write_padded(out, &self.lead_bytes())?;
        write_padded(out, &self.tail_bytes())
    }

    /// Rebuilds a buffer from its transfer form.
    ///
    /// The input must contain exactly one serialized buffer.
    pub fn deserialize(bytes: &[u8]) -> Result<ByteBuffer> {
        let mut cursor = Cursor::new(bytes);
        let zero_size = cursor.read_u32::<LittleEndian>()?;
        let lead = read_padded(&mut cursor)?;
        let tail = read_padded(&mut cursor)?;
        let left = bytes.len() - cursor.position() as usize;
        if left != 0 {
            return Err(DecodingErrorKind::TrailingBytes(left).into());
        }
        let total = u64::from(zero_size) + lead.len() as u64 + tail.len() as u64;
        if total > u64::from(u32::MAX / 2) {
            return Err(DecodingErrorKind::SizeOverflow(total).into());
        }

        let mut buffer = ByteBuffer::with_zero_size(zero_size);
        buffer.prepend(lead.len() as u32).write(lead);
        {
            let mut i = buffer.append(tail.len() as u32);
            i.prev_by(tail.len() as u32);
            i.write(tail);
        }
        tracing::trace!("decoded buffer of {} bytes ({} zero)", buffer.size(), zero_size);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ByteBuffer {
        let mut buffer = ByteBuffer::with_zero_size(100);
        buffer.prepend(3).write(&[1, 2, 3]);
        let mut i = buffer.append(5);
        i.prev_by(5);
        i.write(&[4, 5, 6, 7, 8]);
        buffer
    }

    #[test]
    fn test_transfer_layout() {
        let buffer = sample();
        let mut out = Vec::new();
        buffer.serialize(&mut out).unwrap();
        assert_eq!(out.len(), buffer.serialized_size());
        assert_eq!(out.len(), 4 + 4 + 4 + 4 + 8);
        assert_eq!(&out[..4], &100u32.to_le_bytes());
        assert_eq!(&out[4..8], &3u32.to_le_bytes());
        assert_eq!(&out[8..12], &[1, 2, 3, 0]);
        assert_eq!(&out[12..16], &5u32.to_le_bytes());
        assert_eq!(&out[16..24], &[4, 5, 6, 7, 8, 0, 0, 0]);
    }

    #[test]
    fn test_transfer_keeps_zero_area_virtual() {
        let buffer = sample();
        let mut out = Vec::new();
        buffer.serialize(&mut out).unwrap();
        let decoded = ByteBuffer::deserialize(&out).unwrap();
        assert_eq!(decoded.size(), buffer.size());
        assert_eq!(decoded.zero_area_size(), 100);
        assert_eq!(decoded.to_vec(), buffer.to_vec());
    }

    #[test]
    fn test_truncated_input() {
        let mut out = Vec::new();
        sample().serialize(&mut out).unwrap();
        out.truncate(out.len() - 2);
        let err = ByteBuffer::deserialize(&out).unwrap_err();
        assert!(matches!(err, ErrorKind::Truncated { needed: 8, available: 6 }));

        let err = ByteBuffer::deserialize(&[1, 0]).unwrap_err();
        assert!(matches!(err, ErrorKind::Io(_)));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut out = Vec::new();
        sample().serialize(&mut out).unwrap();
        out.push(0);
        let err = ByteBuffer::deserialize(&out).unwrap_err();
        assert!(matches!(err, ErrorKind::DecodingError(DecodingErrorKind::TrailingBytes(1))));
    }

    #[test]
    fn test_oversized_zero_area_rejected() {
        let mut out = Vec::new();
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        let err = ByteBuffer::deserialize(&out).unwrap_err();
        assert!(matches!(err, ErrorKind::DecodingError(DecodingErrorKind::SizeOverflow(_))));
    }
}
