//! Two-tier compact encoding of metadata records.
//!
//! ```text
//! small:    next u16 | prev u16 | uleb tag | uleb size | chunk uid u16
//! extended: small    | uleb fragment start | uleb fragment end | packet uid u64
//! ```
//!
//! Integers are little-endian. The tag packs `type_uid << 3 | kind << 1 | extended`. A
//! record is written small when it is complete and belongs to the log's own packet.

use byteorder::{ByteOrder, LittleEndian};

use crate::varint;

/// What a recorded byte range holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Payload bytes with no header structure.
    Payload,
    /// A header pushed at the front of the packet.
    Header,
    /// A trailer pushed at the back of the packet.
    Trailer,
}

impl ItemKind {
    pub(crate) fn to_bits(self) -> u8 {
        match self {
            ItemKind::Payload => 0,
            ItemKind::Header => 1,
            ItemKind::Trailer => 2,
        }
    }

    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(ItemKind::Payload),
            1 => Some(ItemKind::Header),
            2 => Some(ItemKind::Trailer),
            _ => None,
        }
    }
}

/// Largest chunk type uid the tag can carry.
pub const MAX_TYPE_UID: u32 = (1 << 29) - 1;

const LINKS_LEN: usize = 4;
const CHUNK_UID_LEN: usize = 2;
const PACKET_UID_LEN: usize = 8;

/// One decoded record with its list links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Record {
    pub next: u16,
    pub prev: u16,
    pub kind: ItemKind,
    pub type_uid: u32,
    pub size: u32,
    pub chunk_uid: u16,
    pub fragment_start: u32,
    pub fragment_end: u32,
    pub packet_uid: u64,
}

impl Record {
    /// Creates a complete record with no links.
    pub fn complete(kind: ItemKind, type_uid: u32, size: u32, chunk_uid: u16, packet_uid: u64) -> Self {
        assert!(type_uid <= MAX_TYPE_UID, "chunk type uid {} does not fit a metadata tag", type_uid);
        Self {
            next: crate::END,
            prev: crate::END,
            kind,
            type_uid,
            size,
            chunk_uid,
            fragment_start: 0,
            fragment_end: size,
            packet_uid,
        }
    }

    /// Returns the number of bytes of the chunk still present.
    pub fn length(&self) -> u32 {
        self.fragment_end - self.fragment_start
    }

    pub fn is_complete(&self) -> bool {
        self.fragment_start == 0 && self.fragment_end == self.size
    }

    /// Returns true when `next` continues this record's byte range.
    pub fn continued_by(&self, next: &Record) -> bool {
        self.packet_uid == next.packet_uid
            && self.kind == next.kind
            && self.type_uid == next.type_uid
            && self.chunk_uid == next.chunk_uid
            && self.size == next.size
            && next.fragment_start == self.fragment_end
    }

    /// Returns true when the record needs the extended encoding in a log owned by `log_uid`.
    pub fn is_extended(&self, log_uid: u64) -> bool {
        !self.is_complete() || self.packet_uid != log_uid
    }

    fn tag(&self, extended: bool) -> u32 {
        (self.type_uid << 3) | (u32::from(self.kind.to_bits()) << 1) | u32::from(extended)
    }

    /// Returns the encoded length of this record inside a log owned by `log_uid`.
    pub fn encoded_len(&self, log_uid: u64) -> usize {
        let extended = self.is_extended(log_uid);
        let mut len = LINKS_LEN
            + varint::encoded_len(self.tag(extended))
            + varint::encoded_len(self.size)
            + CHUNK_UID_LEN;
        if extended {
            len += varint::encoded_len(self.fragment_start)
                + varint::encoded_len(self.fragment_end)
                + PACKET_UID_LEN;
        }
        len
    }

    /// Encodes the record at the front of `out` and returns the number of bytes written.
    pub fn encode(&self, out: &mut [u8], log_uid: u64) -> usize {
        let extended = self.is_extended(log_uid);
        LittleEndian::write_u16(&mut out[0..], self.next);
        LittleEndian::write_u16(&mut out[2..], self.prev);
        let mut at = LINKS_LEN;
        at += varint::write(&mut out[at..], self.tag(extended));
        at += varint::write(&mut out[at..], self.size);
        LittleEndian::write_u16(&mut out[at..], self.chunk_uid);
        at += CHUNK_UID_LEN;
        if extended {
            at += varint::write(&mut out[at..], self.fragment_start);
            at += varint::write(&mut out[at..], self.fragment_end);
            LittleEndian::write_u64(&mut out[at..], self.packet_uid);
            at += PACKET_UID_LEN;
        }
        at
    }

    /// Decodes a record from the front of `bytes` written by a log owned by `log_uid`.
    pub fn decode(bytes: &[u8], log_uid: u64) -> (Self, usize) {
        let next = LittleEndian::read_u16(&bytes[0..]);
        let prev = LittleEndian::read_u16(&bytes[2..]);
        let mut at = LINKS_LEN;
        let (tag, read) = varint::read(&bytes[at..]);
        at += read;
        let (size, read) = varint::read(&bytes[at..]);
        at += read;
        let chunk_uid = LittleEndian::read_u16(&bytes[at..]);
        at += CHUNK_UID_LEN;

        let kind = ItemKind::from_bits(((tag >> 1) & 0x3) as u8)
            .unwrap_or_else(|| panic!("corrupt metadata record tag {:#x}", tag));
        let mut record = Self {
            next,
            prev,
            kind,
            type_uid: tag >> 3,
            size,
            chunk_uid,
            fragment_start: 0,
            fragment_end: size,
            packet_uid: log_uid,
        };
        if tag & 1 == 1 {
            let (start, read) = varint::read(&bytes[at..]);
            at += read;
            let (end, read) = varint::read(&bytes[at..]);
            at += read;
            record.fragment_start = start;
            record.fragment_end = end;
            record.packet_uid = LittleEndian::read_u64(&bytes[at..]);
            at += PACKET_UID_LEN;
        }
        debug_assert!(record.fragment_start <= record.fragment_end && record.fragment_end <= record.size);
        (record, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_record_layout() {
        let mut record = Record::complete(ItemKind::Header, 5, 20, 0x0102, 9);
        record.next = 0x0010;
        record.prev = crate::END;
        let mut out = [0u8; 32];
        let written = record.encode(&mut out, 9);
        assert_eq!(written, record.encoded_len(9));
        assert_eq!(written, 8);
        assert_eq!(&out[..8], &[0x10, 0x00, 0xff, 0xff, (5 << 3) | (1 << 1), 20, 0x02, 0x01]);
        assert_eq!(Record::decode(&out, 9), (record, 8));
    }

    #[test]
    fn test_foreign_packet_forces_extended() {
        let record = Record::complete(ItemKind::Trailer, 7, 4, 3, 100);
        assert_eq!(record.encoded_len(100), 8);
        assert_eq!(record.encoded_len(101), 8 + 2 + 8);

        let mut out = [0u8; 32];
        let written = record.encode(&mut out, 101);
        assert_eq!(out[4] & 1, 1);
        let (decoded, read) = Record::decode(&out, 101);
        assert_eq!(read, written);
        assert_eq!(decoded.packet_uid, 100);
        assert!(decoded.is_complete());
    }

    #[test]
    fn test_fragment_record_round_trip() {
        let mut record = Record::complete(ItemKind::Payload, 0, 1000, 1, 2);
        record.fragment_start = 200;
        record.fragment_end = 900;
        let mut out = [0u8; 32];
        let written = record.encode(&mut out, 2);
        let (decoded, read) = Record::decode(&out, 2);
        assert_eq!(read, written);
        assert_eq!(decoded, record);
        assert_eq!(decoded.length(), 700);
        assert!(!decoded.is_complete());
    }

    #[test]
    fn test_continued_by() {
        let mut first = Record::complete(ItemKind::Header, 3, 10, 4, 1);
        first.fragment_end = 6;
        let mut second = first;
        second.fragment_start = 6;
        second.fragment_end = 10;
        assert!(first.continued_by(&second));

        second.chunk_uid = 5;
        assert!(!first.continued_by(&second));
        second.chunk_uid = 4;
        second.fragment_start = 7;
        assert!(!first.continued_by(&second));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_type_uid_panics() {
        Record::complete(ItemKind::Header, MAX_TYPE_UID + 1, 1, 0, 0);
    }
}
