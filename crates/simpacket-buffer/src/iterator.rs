use std::{fmt, ptr};

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};

use crate::store::ByteStore;

const READ_ERROR: &str = "attempted to read beyond the bounds of the buffer; \
     a chunk deserializer is probably reading bytes its serializer never wrote";

/// Read-only cursor over the bytes of a [`ByteBuffer`](crate::ByteBuffer).
///
/// The iterator snapshots the buffer layout when it is taken. It borrows the buffer, so the
/// buffer cannot be resized while the iterator is alive. Reads inside the zero area yield
/// zero. Writing goes through a [`BufferWriter`](crate::BufferWriter), which only a
/// mutable borrow of the buffer hands out.
#[derive(Clone)]
pub struct BufferIterator<'a> {
    pub(crate) store: &'a ByteStore,
    pub(crate) zero_start: u32,
    pub(crate) zero_end: u32,
    pub(crate) data_start: u32,
    pub(crate) data_end: u32,
    pub(crate) current: u32,
}

impl<'a> BufferIterator<'a> {
    pub(crate) fn new(
        store: &'a ByteStore,
        zero_start: u32,
        zero_end: u32,
        data_start: u32,
        data_end: u32,
        current: u32,
    ) -> Self {
        Self { store, zero_start, zero_end, data_start, data_end, current }
    }

    pub(crate) fn zero_size(&self) -> u32 {
        self.zero_end - self.zero_start
    }

    /// Maps a virtual position outside the zero area to its store index.
    ///
    /// The zero area start and end both map to the first trailing byte.
    pub(crate) fn physical(&self, position: u32) -> usize {
        if position <= self.zero_start {
            position as usize
        } else {
            (position - self.zero_size()) as usize
        }
    }

    /// Moves forward by one byte.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        self.next_by(1);
    }

    /// Moves back by one byte.
    pub fn prev(&mut self) {
        self.prev_by(1);
    }

    /// Moves forward by `delta` bytes.
    pub fn next_by(&mut self, delta: u32) {
        assert!(
            self.current.checked_add(delta).is_some_and(|target| target <= self.data_end),
            "iterator moved past the end of the buffer"
        );
        self.current += delta;
    }

    /// Moves back by `delta` bytes.
    pub fn prev_by(&mut self, delta: u32) {
        assert!(
            self.current >= delta && self.current - delta >= self.data_start,
            "iterator moved before the start of the buffer"
        );
        self.current -= delta;
    }

    /// Returns the absolute distance in bytes between two iterators over one store.
    pub fn distance_from(&self, other: &BufferIterator<'_>) -> u32 {
        assert!(ptr::eq(self.store, other.store), "iterators do not share a store");
        self.current.abs_diff(other.current)
    }

    /// Returns true if the cursor is on the first byte.
    pub fn is_start(&self) -> bool {
        self.current == self.data_start
    }

    /// Returns true if the cursor is past the last byte.
    pub fn is_end(&self) -> bool {
        self.current == self.data_end
    }

    /// Returns the size of the underlying buffer.
    pub fn size(&self) -> u32 {
        self.data_end - self.data_start
    }

    /// Returns the cursor position relative to the buffer start.
    pub fn offset(&self) -> u32 {
        self.current - self.data_start
    }

    /// Returns the byte under the cursor without advancing.
    pub fn peek_u8(&self) -> u8 {
        assert!(self.current >= self.data_start && self.current < self.data_end, "{}", READ_ERROR);
        if self.current >= self.zero_start && self.current < self.zero_end {
            0
        } else {
            self.store.bytes()[self.physical(self.current)]
        }
    }

    /// Reads one byte and advances.
    pub fn read_u8(&mut self) -> u8 {
        let data = self.peek_u8();
        self.current += 1;
        data
    }

    /// Fills `out` with the next bytes and advances past them.
    pub fn read(&mut self, out: &mut [u8]) {
        for byte in out.iter_mut() {
            *byte = self.read_u8();
        }
    }

    fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        self.read(&mut buf);
        buf
    }

    /// Reads a 16-bit value written by
    /// [`BufferWriter::write_u16`](crate::BufferWriter::write_u16).
    pub fn read_u16(&mut self) -> u16 {
        NativeEndian::read_u16(&self.read_array::<2>())
    }

    /// Reads a 32-bit value in host byte order.
    pub fn read_u32(&mut self) -> u32 {
        NativeEndian::read_u32(&self.read_array::<4>())
    }

    /// Reads a 64-bit value in host byte order.
    pub fn read_u64(&mut self) -> u64 {
        NativeEndian::read_u64(&self.read_array::<8>())
    }

    /// Reads a 16-bit value in network byte order.
    pub fn read_ntoh_u16(&mut self) -> u16 {
        BigEndian::read_u16(&self.read_array::<2>())
    }

    /// Reads a 32-bit value in network byte order.
    pub fn read_ntoh_u32(&mut self) -> u32 {
        BigEndian::read_u32(&self.read_array::<4>())
    }

    /// Reads a 64-bit value in network byte order.
    pub fn read_ntoh_u64(&mut self) -> u64 {
        BigEndian::read_u64(&self.read_array::<8>())
    }

    /// Reads a 16-bit value stored least significant byte first.
    pub fn read_lsbtoh_u16(&mut self) -> u16 {
        LittleEndian::read_u16(&self.read_array::<2>())
    }

    /// Reads a 32-bit value stored least significant byte first.
    pub fn read_lsbtoh_u32(&mut self) -> u32 {
        LittleEndian::read_u32(&self.read_array::<4>())
    }

    /// Reads a 64-bit value stored least significant byte first.
    pub fn read_lsbtoh_u64(&mut self) -> u64 {
        LittleEndian::read_u64(&self.read_array::<8>())
    }

    /// Computes the Internet checksum (RFC 1071) of the next `size` bytes and advances.
    ///
    /// `initial` seeds the sum, e.g. with a pseudo-header sum. Words are read in host order,
    /// so the result is meant to be stored back with
    /// [`BufferWriter::write_u16`](crate::BufferWriter::write_u16).
    pub fn calculate_ip_checksum(&mut self, size: u16, initial: u32) -> u16 {
        let mut sum = u64::from(initial);
        for _ in 0..size / 2 {
            sum += u64::from(self.read_u16());
        }
        if size & 1 == 1 {
            sum += u64::from(self.read_u8());
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }
}

impl fmt::Debug for BufferIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferIterator")
            .field("current", &self.current)
            .field("data_start", &self.data_start)
            .field("data_end", &self.data_end)
            .field("zero_start", &self.zero_start)
            .field("zero_end", &self.zero_end)
            .finish()
    }
}
