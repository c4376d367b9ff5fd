use std::{
    fmt,
    ops::{Deref, DerefMut},
    ptr,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};

use crate::{iterator::BufferIterator, store::ByteStore};

/// Writing cursor over a window of a [`ByteBuffer`](crate::ByteBuffer).
///
/// Obtained only through a mutable borrow of the buffer, from
/// [`prepend`](crate::ByteBuffer::prepend), [`append`](crate::ByteBuffer::append),
/// [`begin_mut`](crate::ByteBuffer::begin_mut) or [`end_mut`](crate::ByteBuffer::end_mut).
/// Writes are confined to the window the buffer owns: the freshly added bytes, or the
/// whole buffer once it holds its store alone. The cursor may move and read anywhere in
/// the buffer through its [`BufferIterator`] half.
pub struct BufferWriter<'a> {
    cursor: BufferIterator<'a>,
    window_start: u32,
    window_end: u32,
}

impl<'a> BufferWriter<'a> {
    pub(crate) fn new(cursor: BufferIterator<'a>, window_start: u32, window_end: u32) -> Self {
        Self { cursor, window_start, window_end }
    }

    /// Returns a read-only copy of the cursor.
    pub fn reader(&self) -> BufferIterator<'a> {
        self.cursor.clone()
    }

    /// Panics unless `[current, current + len)` lies in the window and outside the zero area.
    fn check_writable(&self, len: u32) {
        let current = self.cursor.current;
        assert!(
            current >= self.window_start,
            "attempted to write before the start of the writable window; \
             a trailer serialized more bytes than its serialized size"
        );
        let end = current.checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.window_end),
            "attempted to write after the end of the writable window; \
             a header serialized more bytes than its serialized size"
        );
        let (zero_start, zero_end) = (self.cursor.zero_start, self.cursor.zero_end);
        let clear_of_zeros = zero_start == zero_end
            || end.is_some_and(|end| end <= zero_start)
            || current >= zero_end;
        assert!(
            clear_of_zeros,
            "attempted to write inside the zero area of the buffer; \
             a chunk serialized more bytes than its serialized size"
        );
    }

    fn store(&self) -> &'a ByteStore {
        self.cursor.store
    }

    /// Writes one byte and advances.
    pub fn write_u8(&mut self, data: u8) {
        self.check_writable(1);
        let index = self.cursor.physical(self.cursor.current);
        self.store().bytes_mut()[index] = data;
        self.cursor.current += 1;
    }

    /// Writes `data` `len` times and advances.
    pub fn write_u8_repeat(&mut self, data: u8, len: u32) {
        if len == 0 {
            return;
        }
        self.check_writable(len);
        let index = self.cursor.physical(self.cursor.current);
        self.store().bytes_mut()[index..index + len as usize].fill(data);
        self.cursor.current += len;
    }

    /// Writes `data` and advances.
    pub fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let len = data.len() as u32;
        self.check_writable(len);
        let index = self.cursor.physical(self.cursor.current);
        self.store().bytes_mut()[index..index + data.len()].copy_from_slice(data);
        self.cursor.current += len;
    }

    /// Writes a 16-bit value in host byte order.
    pub fn write_u16(&mut self, data: u16) {
        let mut buf = [0u8; 2];
        NativeEndian::write_u16(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 32-bit value in host byte order.
    pub fn write_u32(&mut self, data: u32) {
        let mut buf = [0u8; 4];
        NativeEndian::write_u32(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 64-bit value in host byte order.
    pub fn write_u64(&mut self, data: u64) {
        let mut buf = [0u8; 8];
        NativeEndian::write_u64(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 16-bit value in network byte order.
    pub fn write_hton_u16(&mut self, data: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 32-bit value in network byte order.
    pub fn write_hton_u32(&mut self, data: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 64-bit value in network byte order.
    pub fn write_hton_u64(&mut self, data: u64) {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 16-bit value least significant byte first.
    pub fn write_htolsb_u16(&mut self, data: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 32-bit value least significant byte first.
    pub fn write_htolsb_u32(&mut self, data: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, data);
        self.write(&buf);
    }

    /// Writes a 64-bit value least significant byte first.
    pub fn write_htolsb_u64(&mut self, data: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, data);
        self.write(&buf);
    }

    /// Copies the bytes between `start` and `end` to the cursor and advances.
    ///
    /// Both range iterators must come from the same buffer. Zero-area bytes of the source
    /// are written as real zeros. The source may live in the same store as this writer.
    pub fn write_from(&mut self, start: &BufferIterator<'_>, end: &BufferIterator<'_>) {
        assert!(ptr::eq(start.store, end.store), "range iterators do not share a store");
        assert!(start.current <= end.current, "range end precedes its start");
        assert!(
            start.zero_start == end.zero_start && start.zero_end == end.zero_end,
            "range iterators come from different buffers"
        );
        let mut size = end.current - start.current;
        if size == 0 {
            return;
        }
        self.check_writable(size);

        let mut from = start.current;
        if from < start.zero_start {
            let n = size.min(start.zero_start - from);
            self.copy_in(start.store, from as usize, n);
            from += n;
            size -= n;
        }
        if size > 0 && from < start.zero_end {
            let n = size.min(start.zero_end - from);
            self.write_u8_repeat(0, n);
            from += n;
            size -= n;
        }
        if size > 0 {
            let n = size.min(start.data_end - from);
            self.copy_in(start.store, (from - start.zero_size()) as usize, n);
        }
    }

    fn copy_in(&mut self, source: &ByteStore, from: usize, len: u32) {
        if len == 0 {
            return;
        }
        let to = self.cursor.physical(self.cursor.current);
        let n = len as usize;
        let store = self.store();
        if ptr::eq(source, store) {
            store.bytes_mut().copy_within(from..from + n, to);
        } else {
            let src = source.bytes();
            store.bytes_mut()[to..to + n].copy_from_slice(&src[from..from + n]);
        }
        self.cursor.current += len;
    }
}

impl<'a> Deref for BufferWriter<'a> {
    type Target = BufferIterator<'a>;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl DerefMut for BufferWriter<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}

impl fmt::Debug for BufferWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferWriter")
            .field("cursor", &self.cursor)
            .field("window_start", &self.window_start)
            .field("window_end", &self.window_end)
            .finish()
    }
}
