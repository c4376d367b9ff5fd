use std::{cell::Cell, fmt, rc::Rc};

use byteorder::{ByteOrder, LittleEndian};
use simpacket_buffer::ByteBuffer;
use simpacket_core::constants::METADATA_MAX_STORE_SIZE;

use crate::{
    item::Items,
    record::{ItemKind, Record},
    store::MetadataStore,
    PacketPrinter, END,
};

thread_local! {
    static NEXT_CHUNK_UID: Cell<u16> = const { Cell::new(0) };
}

fn next_chunk_uid() -> u16 {
    NEXT_CHUNK_UID
        .try_with(|uid| {
            let value = uid.get();
            uid.set(value.wrapping_add(1));
            value
        })
        .unwrap_or(0)
}

/// Record of how a packet's bytes were built up.
///
/// Items are kept in a flat byte store as a doubly-linked list of compact records, linked by
/// 16-bit offsets. Cloning is O(1): clones share the store and copy it only when one of them
/// has to write where another still reads.
///
/// A log created with recording disabled ignores every mutation; all of its operations are
/// no-ops and it describes no items.
#[derive(Clone, Debug)]
pub struct MetadataLog {
    store: Rc<MetadataStore>,
    head: u16,
    tail: u16,
    /// End of the region this log has written into the store.
    used: u16,
    packet_uid: u64,
    enabled: bool,
}

impl MetadataLog {
    /// Creates a log for packet `packet_uid` holding `size` bytes of payload.
    pub fn new(packet_uid: u64, size: u32, enabled: bool) -> Self {
        let mut log = Self::empty(packet_uid, enabled);
        if enabled && size > 0 {
            log.push_front(Record::complete(ItemKind::Payload, 0, size, next_chunk_uid(), packet_uid));
        }
        log
    }

    pub(crate) fn empty(packet_uid: u64, enabled: bool) -> Self {
        let store = if enabled { MetadataStore::acquire(0) } else { MetadataStore::empty() };
        Self { store, head: END, tail: END, used: 0, packet_uid, enabled }
    }

    /// Returns the uid of the packet this log was created for.
    pub fn uid(&self) -> u64 {
        self.packet_uid
    }

    /// Returns true when this log records operations.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the number of packet bytes the items describe.
    pub fn total_size(&self) -> u32 {
        self.records().map(|(_, record)| record.length()).sum()
    }

    /// Records a complete header of `size` bytes pushed at the front.
    pub fn add_header(&mut self, type_uid: u32, size: u32) {
        if !self.enabled {
            return;
        }
        self.push_front(Record::complete(ItemKind::Header, type_uid, size, next_chunk_uid(), self.packet_uid));
    }

    /// Records a complete trailer of `size` bytes pushed at the back.
    pub fn add_trailer(&mut self, type_uid: u32, size: u32) {
        if !self.enabled {
            return;
        }
        self.push_back(Record::complete(ItemKind::Trailer, type_uid, size, next_chunk_uid(), self.packet_uid));
    }

    /// Drops the front item, which must be the complete header `type_uid` of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics when the front item is anything else, or only a fragment of that header.
    pub fn remove_header(&mut self, type_uid: u32, size: u32) {
        if !self.enabled {
            return;
        }
        assert!(self.head != END, "removing header {} from an empty metadata log", type_uid);
        let (record, len) = self.read_record(self.head);
        assert!(
            record.kind == ItemKind::Header && record.type_uid == type_uid && record.size == size,
            "removing unexpected header: expected type {} of {} bytes, found {:?} type {} of {} bytes",
            type_uid,
            size,
            record.kind,
            record.type_uid,
            record.size
        );
        assert!(
            record.is_complete(),
            "removing incomplete header: type {} holds {}..{} of {} bytes",
            type_uid,
            record.fragment_start,
            record.fragment_end,
            size
        );
        if self.head as usize + len == self.used as usize {
            self.used = self.head;
        }
        if self.head == self.tail {
            self.head = END;
            self.tail = END;
        } else {
            self.head = record.next;
        }
    }

    /// Drops the back item, which must be the complete trailer `type_uid` of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics when the back item is anything else, or only a fragment of that trailer.
    pub fn remove_trailer(&mut self, type_uid: u32, size: u32) {
        if !self.enabled {
            return;
        }
        assert!(self.tail != END, "removing trailer {} from an empty metadata log", type_uid);
        let (record, len) = self.read_record(self.tail);
        assert!(
            record.kind == ItemKind::Trailer && record.type_uid == type_uid && record.size == size,
            "removing unexpected trailer: expected type {} of {} bytes, found {:?} type {} of {} bytes",
            type_uid,
            size,
            record.kind,
            record.type_uid,
            record.size
        );
        assert!(
            record.is_complete(),
            "removing incomplete trailer: type {} holds {}..{} of {} bytes",
            type_uid,
            record.fragment_start,
            record.fragment_end,
            size
        );
        if self.tail as usize + len == self.used as usize {
            self.used = self.tail;
        }
        if self.head == self.tail {
            self.head = END;
            self.tail = END;
        } else {
            self.tail = record.prev;
        }
    }

    /// Appends the items of `other`.
    ///
    /// An appended item that continues the current tail (same chunk, next byte range) is
    /// merged into it, so reassembling in-order fragments restores the original items.
    pub fn add_at_end(&mut self, other: &MetadataLog) {
        if !self.enabled {
            return;
        }
        if self.tail == END && other.packet_uid == self.packet_uid {
            self.store = Rc::clone(&other.store);
            self.head = other.head;
            self.tail = other.tail;
            self.used = other.used;
            return;
        }
        let appended: Vec<Record> = other.records().map(|(_, record)| record).collect();
        for record in appended {
            match self.tail_record() {
                Some(last) if last.continued_by(&record) => {
                    let mut merged = last;
                    merged.fragment_end = record.fragment_end;
                    self.replace_tail(merged);
                }
                _ => self.push_back(record),
            }
        }
    }

    /// Records `size` bytes of padding appended at the back as payload.
    pub fn add_padding_at_end(&mut self, size: u32) {
        if !self.enabled || size == 0 {
            return;
        }
        self.push_back(Record::complete(ItemKind::Payload, 0, size, next_chunk_uid(), self.packet_uid));
    }

    /// Forgets the first `size` bytes of the packet.
    ///
    /// Whole items are unlinked; an item straddling the cut is narrowed, which rebuilds the
    /// log into fresh storage.
    ///
    /// # Panics
    ///
    /// Panics when the items describe fewer than `size` bytes.
    pub fn remove_at_start(&mut self, size: u32) {
        if !self.enabled || size == 0 {
            return;
        }
        let records: Vec<(u16, Record)> = self.records().collect();
        let mut left = size;
        let mut index = 0;
        while left > 0 && index < records.len() && records[index].1.length() <= left {
            left -= records[index].1.length();
            index += 1;
        }

        if left == 0 {
            match records.get(index) {
                Some(&(offset, _)) => self.head = offset,
                None => {
                    self.head = END;
                    self.tail = END;
                }
            }
            return;
        }
        assert!(
            index < records.len(),
            "removing {} bytes at start of metadata describing {} bytes",
            size,
            size - left
        );
        let mut fragment = Self::empty(self.packet_uid, true);
        let mut first = records[index].1;
        first.fragment_start += left;
        fragment.push_back(first);
        for &(_, record) in &records[index + 1..] {
            fragment.push_back(record);
        }
        tracing::trace!("narrowed metadata item at start, rebuilt {} items", records.len() - index);
        *self = fragment;
    }

    /// Forgets the last `size` bytes of the packet.
    ///
    /// # Panics
    ///
    /// Panics when the items describe fewer than `size` bytes.
    pub fn remove_at_end(&mut self, size: u32) {
        if !self.enabled || size == 0 {
            return;
        }
        let records: Vec<(u16, Record)> = self.records_back().collect();
        let mut left = size;
        let mut index = 0;
        while left > 0 && index < records.len() && records[index].1.length() <= left {
            left -= records[index].1.length();
            index += 1;
        }

        if left == 0 {
            match records.get(index) {
                Some(&(offset, _)) => self.tail = offset,
                None => {
                    self.head = END;
                    self.tail = END;
                }
            }
            return;
        }
        assert!(
            index < records.len(),
            "removing {} bytes at end of metadata describing {} bytes",
            size,
            size - left
        );
        let mut fragment = Self::empty(self.packet_uid, true);
        let mut last = records[index].1;
        last.fragment_end -= left;
        fragment.push_front(last);
        for &(_, record) in &records[index + 1..] {
            fragment.push_front(record);
        }
        tracing::trace!("narrowed metadata item at end, rebuilt {} items", records.len() - index);
        *self = fragment;
    }

    /// Returns the log of the bytes left after dropping `start` bytes at the front and
    /// `end` bytes at the back.
    pub fn create_fragment(&self, start: u32, end: u32) -> MetadataLog {
        let mut fragment = self.clone();
        fragment.remove_at_start(start);
        fragment.remove_at_end(end);
        fragment
    }

    /// Walks the items front to back against the bytes of `buffer`.
    pub fn items<'a>(&'a self, buffer: &'a ByteBuffer) -> Items<'a> {
        Items::new(self.records(), buffer)
    }

    /// Replays the items through `printer`.
    ///
    /// A log that does not record prints the whole buffer as one payload item.
    ///
    /// # Panics
    ///
    /// Panics when the items do not describe exactly the bytes of `buffer`.
    pub fn print(&self, out: &mut dyn fmt::Write, buffer: &ByteBuffer, printer: &PacketPrinter) -> fmt::Result {
        if !self.enabled {
            if buffer.is_empty() {
                return Ok(());
            }
            return printer.print_payload(out, self.packet_uid, buffer.size());
        }
        let total = self.total_size();
        assert_eq!(
            total,
            buffer.size(),
            "metadata describes {} bytes but the buffer holds {}",
            total,
            buffer.size()
        );
        let mut items: Vec<_> = self.items(buffer).collect();
        if !printer.is_forward() {
            items.reverse();
        }
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                out.write_str(printer.separator())?;
            }
            printer.print_item(out, self.packet_uid, item)?;
        }
        Ok(())
    }

    pub(crate) fn records(&self) -> Records<'_> {
        Records { log: self, current: self.head, forward: true }
    }

    pub(crate) fn records_back(&self) -> Records<'_> {
        Records { log: self, current: self.tail, forward: false }
    }

    pub(crate) fn read_record(&self, at: u16) -> (Record, usize) {
        Record::decode(&self.store.bytes()[at as usize..], self.packet_uid)
    }

    fn tail_record(&self) -> Option<Record> {
        (self.tail != END).then(|| self.read_record(self.tail).0)
    }

    /// Returns the bytes `record` takes in this log's store.
    pub(crate) fn encoded_len(&self, record: &Record) -> usize {
        record.encoded_len(self.packet_uid)
    }

    /// Returns the number of store bytes this log has written.
    pub(crate) fn used(&self) -> usize {
        self.used as usize
    }

    fn read_link(&self, at: usize) -> u16 {
        LittleEndian::read_u16(&self.store.bytes()[at..])
    }

    fn write_link(&self, at: usize, value: u16) {
        LittleEndian::write_u16(&mut self.store.bytes_mut()[at..], value);
    }

    /// Makes room for `len` bytes at `used`.
    ///
    /// `link` is the link slot the caller rewrites after writing the record. A shared store
    /// is only written in place when no other log has written past `used` and that slot
    /// still ends the list, so no sharing log can reach the new record.
    fn reserve(&mut self, len: usize, link: Option<usize>) {
        let needed = self.used as usize + len;
        assert!(
            needed <= METADATA_MAX_STORE_SIZE,
            "metadata log needs {} bytes, more than the {} its links can address",
            needed,
            METADATA_MAX_STORE_SIZE
        );
        if needed <= self.store.capacity() {
            if Rc::strong_count(&self.store) == 1 {
                return;
            }
            if self.used == self.store.dirty_end() && link.map_or(true, |at| self.read_link(at) == END) {
                return;
            }
        }
        self.reserve_copy(needed);
    }

    fn reserve_copy(&mut self, needed: usize) {
        let used = self.used as usize;
        let size = needed.max(self.store.capacity() * 2).min(METADATA_MAX_STORE_SIZE);
        let fresh = MetadataStore::acquire(size);
        fresh.bytes_mut()[..used].copy_from_slice(&self.store.bytes()[..used]);
        fresh.set_dirty_end(self.used);
        tracing::trace!(
            "metadata store copy: {} bytes into {} (shared by {})",
            used,
            fresh.capacity(),
            Rc::strong_count(&self.store)
        );
        self.store = fresh;
        if self.head != END {
            self.write_link(self.tail as usize, END);
            self.write_link(self.head as usize + 2, END);
        }
    }

    pub(crate) fn push_back(&mut self, mut record: Record) {
        record.next = END;
        record.prev = self.tail;
        let len = record.encoded_len(self.packet_uid);
        self.reserve(len, (self.tail != END).then_some(self.tail as usize));
        let at = self.used;
        let written = record.encode(&mut self.store.bytes_mut()[at as usize..], self.packet_uid);
        if self.tail == END {
            self.head = at;
        } else {
            self.write_link(self.tail as usize, at);
        }
        self.tail = at;
        self.used = at + written as u16;
        self.store.set_dirty_end(self.used);
    }

    fn push_front(&mut self, mut record: Record) {
        record.next = self.head;
        record.prev = END;
        let len = record.encoded_len(self.packet_uid);
        self.reserve(len, (self.head != END).then_some(self.head as usize + 2));
        let at = self.used;
        let written = record.encode(&mut self.store.bytes_mut()[at as usize..], self.packet_uid);
        if self.head == END {
            self.tail = at;
        } else {
            self.write_link(self.head as usize + 2, at);
        }
        self.head = at;
        self.used = at + written as u16;
        self.store.set_dirty_end(self.used);
    }

    /// Overwrites the tail item with `merged`, in place when the store is exclusive and
    /// the new encoding fits, otherwise by rebuilding the log.
    fn replace_tail(&mut self, mut merged: Record) {
        let tail = self.tail as usize;
        let (_, tail_len) = self.read_record(self.tail);
        let needed = merged.encoded_len(self.packet_uid);
        merged.next = END;

        if Rc::strong_count(&self.store) == 1 {
            let at_end = tail + tail_len == self.used as usize;
            let room = if at_end { self.store.capacity() - tail } else { tail_len };
            if needed <= room {
                let written = merged.encode(&mut self.store.bytes_mut()[tail..], self.packet_uid);
                if at_end {
                    self.used = (tail + written) as u16;
                    self.store.set_dirty_end(self.used);
                }
                return;
            }
        }

        let mut rebuilt = Self::empty(self.packet_uid, true);
        for (offset, record) in self.records() {
            if offset == self.tail {
                break;
            }
            rebuilt.push_back(record);
        }
        rebuilt.push_back(merged);
        *self = rebuilt;
    }
}

/// Walks the linked records of a log, yielding each record with its store offset.
pub(crate) struct Records<'a> {
    log: &'a MetadataLog,
    current: u16,
    forward: bool,
}

impl Iterator for Records<'_> {
    type Item = (u16, Record);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == END {
            return None;
        }
        let at = self.current;
        let (record, _) = self.log.read_record(at);
        let (last, link) = if self.forward {
            (self.log.tail, record.next)
        } else {
            (self.log.head, record.prev)
        };
        debug_assert!(at != link, "metadata record at {} links to itself", at);
        self.current = if at == last { END } else { link };
        Some((at, record))
    }
}
