//! Fixed-width transfer form of a metadata log.
//!
//! ```text
//! u32 total length (including this field) | u64 packet uid | u8 recording flag
//! per item: u32 type uid | u8 kind | u8 extended | u32 size | u16 chunk uid
//!           [extended: u32 fragment start | u32 fragment end | u64 packet uid]
//! ```
//!
//! All integers are little-endian.

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use simpacket_core::{constants::METADATA_MAX_STORE_SIZE, DecodingErrorKind, ErrorKind, Result};

use crate::{
    record::{ItemKind, Record, MAX_TYPE_UID},
    MetadataLog,
};

const PREFIX_LEN: usize = 4 + 8 + 1;
const ITEM_LEN: usize = 4 + 1 + 1 + 4 + 2;
const EXTENSION_LEN: usize = 4 + 4 + 8;

impl MetadataLog {
    /// Returns the number of bytes [`serialize`](Self::serialize) appends.
    pub fn serialized_size(&self) -> usize {
        PREFIX_LEN
            + self
                .records()
                .map(|(_, record)| ITEM_LEN + if record.is_extended(self.uid()) { EXTENSION_LEN } else { 0 })
                .sum::<usize>()
    }

    /// Appends the transfer form of this log to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let total = self.serialized_size();
        out.reserve(total);
        out.write_u32::<LittleEndian>(total as u32)?;
        out.write_u64::<LittleEndian>(self.uid())?;
        out.write_u8(u8::from(self.is_enabled()))?;
        for (_, record) in self.records() {
            let extended = record.is_extended(self.uid());
            out.write_u32::<LittleEndian>(record.type_uid)?;
            out.write_u8(record.kind.to_bits())?;
            out.write_u8(u8::from(extended))?;
            out.write_u32::<LittleEndian>(record.size)?;
            out.write_u16::<LittleEndian>(record.chunk_uid)?;
            if extended {
                out.write_u32::<LittleEndian>(record.fragment_start)?;
                out.write_u32::<LittleEndian>(record.fragment_end)?;
                out.write_u64::<LittleEndian>(record.packet_uid)?;
            }
        }
        Ok(())
    }

    /// Rebuilds a log from its transfer form.
    ///
    /// The input must contain exactly one serialized log.
    pub fn deserialize(bytes: &[u8]) -> Result<MetadataLog> {
        let mut cursor = Cursor::new(bytes);
        let total = cursor.read_u32::<LittleEndian>()? as usize;
        if total > bytes.len() {
            return Err(ErrorKind::Truncated { needed: total, available: bytes.len() });
        }
        if total < bytes.len() {
            return Err(DecodingErrorKind::TrailingBytes(bytes.len() - total).into());
        }
        let packet_uid = cursor.read_u64::<LittleEndian>()?;
        let enabled = cursor.read_u8()? != 0;
        if !enabled && total != PREFIX_LEN {
            return Err(DecodingErrorKind::LengthMismatch { expected: PREFIX_LEN, actual: total }.into());
        }

        let mut log = MetadataLog::empty(packet_uid, enabled);
        while (cursor.position() as usize) < total {
            let type_uid = cursor.read_u32::<LittleEndian>()?;
            let kind_bits = cursor.read_u8()?;
            let kind = ItemKind::from_bits(kind_bits).ok_or(DecodingErrorKind::ItemKind(kind_bits))?;
            let extended = cursor.read_u8()? != 0;
            let size = cursor.read_u32::<LittleEndian>()?;
            let chunk_uid = cursor.read_u16::<LittleEndian>()?;
            if type_uid > MAX_TYPE_UID {
                return Err(DecodingErrorKind::TypeUid(type_uid).into());
            }

            let mut record = Record::complete(kind, type_uid, size, chunk_uid, packet_uid);
            if extended {
                let start = cursor.read_u32::<LittleEndian>()?;
                let end = cursor.read_u32::<LittleEndian>()?;
                if start > end || end > size {
                    return Err(DecodingErrorKind::FragmentRange { start, end, size }.into());
                }
                record.fragment_start = start;
                record.fragment_end = end;
                record.packet_uid = cursor.read_u64::<LittleEndian>()?;
            }

            let needed = log.used() + log.encoded_len(&record);
            if needed > METADATA_MAX_STORE_SIZE {
                return Err(DecodingErrorKind::SizeOverflow(needed as u64).into());
            }
            log.push_back(record);
        }
        tracing::trace!("decoded metadata log of packet {} ({} bytes)", packet_uid, log.total_size());
        Ok(log)
    }
}
