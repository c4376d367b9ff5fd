use simpacket_buffer::{BufferIterator, ByteBuffer};

use crate::{log::Records, record::ItemKind};

/// One item of a metadata log, positioned against the packet bytes.
#[derive(Clone, Debug)]
pub struct Item<'a> {
    /// What the bytes hold.
    pub kind: ItemKind,
    /// Chunk type uid; 0 for payload.
    pub type_uid: u32,
    /// True when only part of the original chunk is present.
    pub is_fragment: bool,
    /// Number of bytes of the chunk present in the packet.
    pub current_size: u32,
    /// Bytes of the original chunk missing before the present range.
    pub trimmed_from_start: u32,
    /// Bytes of the original chunk missing after the present range.
    pub trimmed_from_end: u32,
    /// For a complete header, a cursor at its first byte. For a complete trailer, a cursor
    /// just past its last byte. `None` for payload and fragments.
    pub current: Option<BufferIterator<'a>>,
}

impl Item<'_> {
    /// Returns the size of the original chunk.
    pub fn original_size(&self) -> u32 {
        self.trimmed_from_start + self.current_size + self.trimmed_from_end
    }
}

/// Iterator over the items of a log, front to back.
pub struct Items<'a> {
    records: Records<'a>,
    buffer: &'a ByteBuffer,
    offset: u32,
}

impl<'a> Items<'a> {
    pub(crate) fn new(records: Records<'a>, buffer: &'a ByteBuffer) -> Self {
        Self { records, buffer, offset: 0 }
    }
}

impl<'a> Iterator for Items<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, record) = self.records.next()?;
        let is_fragment = !record.is_complete();
        let fits = self.offset + record.size <= self.buffer.size();
        let current = match record.kind {
            ItemKind::Header if !is_fragment && fits => {
                let mut i = self.buffer.begin();
                i.next_by(self.offset);
                Some(i)
            }
            ItemKind::Trailer if !is_fragment && fits => {
                let mut i = self.buffer.end();
                i.prev_by(self.buffer.size() - (self.offset + record.size));
                Some(i)
            }
            _ => None,
        };
        let item = Item {
            kind: record.kind,
            type_uid: record.type_uid,
            is_fragment,
            current_size: record.length(),
            trimmed_from_start: record.fragment_start,
            trimmed_from_end: record.size - record.fragment_end,
            current,
        };
        self.offset += record.length();
        Some(item)
    }
}
