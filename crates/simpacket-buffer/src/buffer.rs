use std::{cell::Ref, fmt, io, rc::Rc};

use simpacket_core::constants::ZERO_BLOCK_SIZE;

use crate::{
    iterator::BufferIterator,
    store::{self, ByteStore},
    writer::BufferWriter,
};

static ZEROES: [u8; ZERO_BLOCK_SIZE] = [0; ZERO_BLOCK_SIZE];

/// A copy-on-write view over a shared [`ByteStore`].
///
/// The view covers the virtual range `[start, end)`. Inside it, `[zero_area_start,
/// zero_area_end)` is a run of implicit zero bytes with no backing storage: the store only
/// holds the leading bytes at `[start, zero_area_start)` followed directly by the trailing
/// bytes. Cloning is O(1) and shares the store; the first structural change that would
/// disturb another view's bytes moves this view onto a private copy.
pub struct ByteBuffer {
    store: Rc<ByteStore>,
    /// Largest zero-area start this view reached, fed into the recommended start on drop
    max_zero_area_start: u32,
    zero_area_start: u32,
    zero_area_end: u32,
    start: u32,
    end: u32,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::with_zero_size(0)
    }

    /// Creates a buffer holding `zero_size` virtual zero bytes.
    pub fn with_zero_size(zero_size: u32) -> Self {
        let store = ByteStore::acquire(0);
        let start = store.capacity().min(store::recommended_start());
        let end = start.checked_add(zero_size).expect("buffer size overflows the offset range");
        store.set_dirty_start(start);
        store.set_dirty_end(start);
        let buffer = Self {
            store,
            max_zero_area_start: start,
            zero_area_start: start,
            zero_area_end: end,
            start,
            end,
        };
        debug_assert!(buffer.check_internal_state());
        buffer
    }

    /// Returns the number of bytes in the buffer, virtual zeros included.
    pub fn size(&self) -> u32 {
        self.end - self.start
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    fn zero_size(&self) -> u32 {
        self.zero_area_end - self.zero_area_start
    }

    fn internal_size(&self) -> u32 {
        self.zero_area_start - self.start + self.end - self.zero_area_end
    }

    fn internal_end(&self) -> u32 {
        self.end - self.zero_size()
    }

    fn is_shared(&self) -> bool {
        Rc::strong_count(&self.store) > 1
    }

    fn check_internal_state(&self) -> bool {
        let offsets_ok = self.start <= self.zero_area_start
            && self.zero_area_start <= self.zero_area_end
            && self.zero_area_end <= self.end;
        if !offsets_ok {
            return false;
        }
        let dirty_ok = self.start >= self.store.dirty_start()
            && self.internal_end() <= self.store.dirty_end();
        let capacity = self.store.capacity();
        let internal_ok = self.internal_end() <= capacity
            && self.start <= capacity
            && self.zero_area_start <= capacity;
        dirty_ok && internal_ok
    }

    fn switch_store(&mut self, store: Rc<ByteStore>) {
        tracing::trace!(
            "switching store: {} bytes -> {} bytes (shared: {})",
            self.store.capacity(),
            store.capacity(),
            self.is_shared()
        );
        self.store = store;
    }

    /// Makes room for `n` bytes at the front of the buffer.
    ///
    /// The new bytes hold unspecified content; [`prepend`](Self::prepend) adds and hands
    /// out a writer over them in one step.
    pub fn add_at_start(&mut self, n: u32) {
        debug_assert!(self.check_internal_state());
        if n == 0 {
            return;
        }
        let is_dirty = self.is_shared() && self.start > self.store.dirty_start();
        if self.start >= n && !is_dirty {
            self.start -= n;
            self.store.set_dirty_start(self.start);
        } else {
            let internal = self.internal_size();
            let store = ByteStore::acquire(internal + n);
            {
                let from = self.start as usize;
                let to = n as usize;
                let len = internal as usize;
                store.bytes_mut()[to..to + len].copy_from_slice(&self.store.bytes()[from..from + len]);
            }
            let old_start = self.start;
            self.zero_area_start = self.zero_area_start - old_start + n;
            self.zero_area_end = self.zero_area_end - old_start + n;
            self.end = self.end - old_start + n;
            self.start = 0;
            self.switch_store(store);
            self.store.set_dirty_start(self.start);
            self.store.set_dirty_end(self.internal_end());
        }
        self.max_zero_area_start = self.max_zero_area_start.max(self.zero_area_start);
        debug_assert!(self.check_internal_state());
    }

    /// Makes room for `n` bytes at the end of the buffer.
    ///
    /// The new bytes hold unspecified content; [`append`](Self::append) adds and hands
    /// out a writer over them in one step.
    pub fn add_at_end(&mut self, n: u32) {
        debug_assert!(self.check_internal_state());
        if n == 0 {
            return;
        }
        let internal_end = self.internal_end();
        let is_dirty = self.is_shared() && internal_end < self.store.dirty_end();
        if internal_end + n <= self.store.capacity() && !is_dirty {
            self.end += n;
            self.store.set_dirty_end(internal_end + n);
        } else {
            let internal = self.internal_size();
            let store = ByteStore::acquire(internal + n);
            {
                let from = self.start as usize;
                let len = internal as usize;
                store.bytes_mut()[..len].copy_from_slice(&self.store.bytes()[from..from + len]);
            }
            let shift = self.start;
            self.zero_area_start -= shift;
            self.zero_area_end -= shift;
            self.end = self.end - shift + n;
            self.start = 0;
            self.switch_store(store);
            self.store.set_dirty_start(self.start);
            self.store.set_dirty_end(self.internal_end());
        }
        self.max_zero_area_start = self.max_zero_area_start.max(self.zero_area_start);
        debug_assert!(self.check_internal_state());
    }

    /// Appends the content of `other` to this buffer.
    ///
    /// When this buffer ends on its zero area and `other` starts with one, the two zero
    /// areas are joined without copying and only the real tail of `other` is written.
    pub fn add_buffer_at_end(&mut self, other: &ByteBuffer) {
        debug_assert!(self.check_internal_state());
        if !self.is_shared()
            && self.end == self.zero_area_end
            && self.internal_end() == self.store.dirty_end()
            && other.start == other.zero_area_start
            && other.zero_size() > 0
        {
            self.zero_area_end += other.zero_size();
            self.end = self.zero_area_end;
            let tail = other.end - other.zero_area_end;
            let mut dst = self.append(tail);
            dst.prev_by(tail);
            let mut src = other.end();
            src.prev_by(tail);
            dst.write_from(&src, &other.end());
            debug_assert!(self.check_internal_state());
            return;
        }

        let mut dst = self.create_full_copy();
        let src = other.create_full_copy();
        {
            let mut writer = dst.append(src.size());
            writer.prev_by(src.size());
            writer.write_from(&src.begin(), &src.end());
        }
        *self = dst;
        debug_assert!(self.check_internal_state());
    }

    /// Removes `n` bytes from the front of the buffer, emptying it if `n` exceeds its size.
    pub fn remove_at_start(&mut self, n: u32) {
        debug_assert!(self.check_internal_state());
        let new_start = self.start.saturating_add(n);
        if new_start <= self.zero_area_start {
            self.start = new_start;
        } else if new_start <= self.zero_area_end {
            let delta = new_start - self.zero_area_start;
            self.start = self.zero_area_start;
            self.zero_area_end -= delta;
            self.end -= delta;
        } else if new_start <= self.end {
            let zero_size = self.zero_size();
            self.start = new_start - zero_size;
            self.end -= zero_size;
            self.zero_area_start = self.start;
            self.zero_area_end = self.start;
        } else {
            self.end -= self.zero_size();
            self.start = self.end;
            self.zero_area_start = self.end;
            self.zero_area_end = self.end;
        }
        self.max_zero_area_start = self.max_zero_area_start.max(self.zero_area_start);
        debug_assert!(self.check_internal_state());
    }

    /// Removes `n` bytes from the end of the buffer, emptying it if `n` exceeds its size.
    pub fn remove_at_end(&mut self, n: u32) {
        debug_assert!(self.check_internal_state());
        let new_end = self.end - n.min(self.size());
        if new_end > self.zero_area_end {
            self.end = new_end;
        } else if new_end > self.zero_area_start {
            self.end = new_end;
            self.zero_area_end = new_end;
        } else if new_end > self.start {
            self.end = new_end;
            self.zero_area_end = new_end;
            self.zero_area_start = new_end;
        } else {
            self.end = self.start;
            self.zero_area_end = self.start;
            self.zero_area_start = self.start;
        }
        self.max_zero_area_start = self.max_zero_area_start.max(self.zero_area_start);
        debug_assert!(self.check_internal_state());
    }

    /// Returns a buffer covering `length` bytes starting at `start`, sharing this store.
    pub fn create_fragment(&self, start: u32, length: u32) -> ByteBuffer {
        let size = self.size();
        assert!(
            start.checked_add(length).is_some_and(|end| end <= size),
            "fragment {}+{} out of range for buffer of {} bytes",
            start,
            length,
            size
        );
        let mut fragment = self.clone();
        fragment.remove_at_start(start);
        fragment.remove_at_end(size - (start + length));
        fragment
    }

    /// Returns a copy of this buffer with the zero area turned into real zero bytes.
    pub fn create_full_copy(&self) -> ByteBuffer {
        debug_assert!(self.check_internal_state());
        let zero_size = self.zero_size();
        if zero_size == 0 {
            return self.clone();
        }
        let lead = self.zero_area_start - self.start;
        let tail = self.end - self.zero_area_end;
        let bytes = self.store.bytes();

        let mut copy = ByteBuffer::new();
        copy.prepend(zero_size).write_u8_repeat(0, zero_size);
        copy.prepend(lead).write(&bytes[self.start as usize..self.zero_area_start as usize]);
        let mut i = copy.append(tail);
        i.prev_by(tail);
        let from = self.zero_area_start as usize;
        i.write(&bytes[from..from + tail as usize]);
        drop(bytes);
        debug_assert!(copy.check_internal_state());
        copy
    }

    fn transform_into_real_buffer(&mut self) {
        if self.zero_size() != 0 {
            tracing::trace!("materializing {} zero bytes", self.zero_size());
            *self = self.create_full_copy();
        }
    }

    /// Materializes the zero area and returns the buffer content.
    ///
    /// The view must not be held across a mutation of this buffer.
    pub fn peek_data(&mut self) -> Ref<'_, [u8]> {
        self.transform_into_real_buffer();
        let (start, end) = (self.start as usize, self.end as usize);
        Ref::map(self.store.bytes(), |bytes| &bytes[start..end])
    }

    /// Copies up to `out.len()` bytes from the front of the buffer into `out`.
    ///
    /// Returns the number of bytes copied. The zero area is synthesized, never materialized.
    pub fn copy_data(&self, out: &mut [u8]) -> usize {
        let total = out.len().min(self.size() as usize);
        let bytes = self.store.bytes();
        let lead = (self.zero_area_start - self.start) as usize;
        let zero = self.zero_size() as usize;
        let start = self.start as usize;
        let tail_start = self.zero_area_start as usize;

        let n = total.min(lead);
        out[..n].copy_from_slice(&bytes[start..start + n]);
        let mut copied = n;
        if copied < total {
            let n = (total - copied).min(zero);
            out[copied..copied + n].fill(0);
            copied += n;
        }
        if copied < total {
            let n = total - copied;
            out[copied..total].copy_from_slice(&bytes[tail_start..tail_start + n]);
            copied += n;
        }
        copied
    }

    /// Writes the first `size` bytes of the buffer (at most all of them) to `out`.
    pub fn write_to<W: io::Write>(&self, out: &mut W, size: u32) -> io::Result<()> {
        let mut left = size.min(self.size());
        let bytes = self.store.bytes();

        let n = left.min(self.zero_area_start - self.start);
        out.write_all(&bytes[self.start as usize..(self.start + n) as usize])?;
        left -= n;

        let mut zeros = left.min(self.zero_size()) as usize;
        left -= zeros as u32;
        while zeros > 0 {
            let chunk = zeros.min(ZEROES.len());
            out.write_all(&ZEROES[..chunk])?;
            zeros -= chunk;
        }

        let from = self.zero_area_start as usize;
        out.write_all(&bytes[from..from + left as usize])?;
        Ok(())
    }

    /// Returns the buffer content as a vector, zero area included.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size() as usize];
        self.copy_data(&mut out);
        out
    }

    /// Returns a read-only iterator positioned on the first byte.
    pub fn begin(&self) -> BufferIterator<'_> {
        debug_assert!(self.check_internal_state());
        BufferIterator::new(
            &self.store,
            self.zero_area_start,
            self.zero_area_end,
            self.start,
            self.end,
            self.start,
        )
    }

    /// Returns a read-only iterator positioned past the last byte.
    pub fn end(&self) -> BufferIterator<'_> {
        debug_assert!(self.check_internal_state());
        BufferIterator::new(
            &self.store,
            self.zero_area_start,
            self.zero_area_end,
            self.start,
            self.end,
            self.end,
        )
    }

    fn writer(&mut self, current: u32, window_start: u32, window_end: u32) -> BufferWriter<'_> {
        debug_assert!(self.check_internal_state());
        let cursor = BufferIterator::new(
            &self.store,
            self.zero_area_start,
            self.zero_area_end,
            self.start,
            self.end,
            current,
        );
        BufferWriter::new(cursor, window_start, window_end)
    }

    /// Adds `n` bytes at the front and returns a writer on the first of them.
    ///
    /// The writer may only touch the new bytes, which no other view can see, so this never
    /// copies a shared store beyond what [`add_at_start`](Self::add_at_start) does.
    pub fn prepend(&mut self, n: u32) -> BufferWriter<'_> {
        self.add_at_start(n);
        let start = self.start;
        self.writer(start, start, start + n)
    }

    /// Adds `n` bytes at the end and returns a writer positioned past the last of them.
    ///
    /// Trailers step back over their own size before writing. The writer may only touch
    /// the new bytes.
    pub fn append(&mut self, n: u32) -> BufferWriter<'_> {
        self.add_at_end(n);
        let end = self.end;
        self.writer(end, end - n, end)
    }

    /// Returns a writer over the whole buffer, positioned on the first byte.
    ///
    /// A view sharing its store is first moved onto a private copy.
    pub fn begin_mut(&mut self) -> BufferWriter<'_> {
        self.make_exclusive();
        let (start, end) = (self.start, self.end);
        self.writer(start, start, end)
    }

    /// Returns a writer over the whole buffer, positioned past the last byte.
    ///
    /// A view sharing its store is first moved onto a private copy.
    pub fn end_mut(&mut self) -> BufferWriter<'_> {
        self.make_exclusive();
        let (start, end) = (self.start, self.end);
        self.writer(end, start, end)
    }

    fn make_exclusive(&mut self) {
        if !self.is_shared() {
            return;
        }
        let store = ByteStore::acquire(self.store.capacity());
        let (from, to) = (self.start as usize, self.internal_end() as usize);
        store.bytes_mut()[from..to].copy_from_slice(&self.store.bytes()[from..to]);
        self.switch_store(store);
        self.store.set_dirty_start(self.start);
        self.store.set_dirty_end(self.internal_end());
        debug_assert!(self.check_internal_state());
    }

    pub(crate) fn lead_bytes(&self) -> Ref<'_, [u8]> {
        let (start, end) = (self.start as usize, self.zero_area_start as usize);
        Ref::map(self.store.bytes(), |bytes| &bytes[start..end])
    }

    pub(crate) fn tail_bytes(&self) -> Ref<'_, [u8]> {
        let start = self.zero_area_start as usize;
        let end = start + (self.end - self.zero_area_end) as usize;
        Ref::map(self.store.bytes(), |bytes| &bytes[start..end])
    }

    pub(crate) fn zero_area_size(&self) -> u32 {
        self.zero_size()
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ByteBuffer {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
            max_zero_area_start: self.max_zero_area_start,
            zero_area_start: self.zero_area_start,
            zero_area_end: self.zero_area_end,
            start: self.start,
            end: self.end,
        }
    }
}

impl Drop for ByteBuffer {
    fn drop(&mut self) {
        store::raise_recommended_start(self.max_zero_area_start);
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("start", &self.start)
            .field("zero_area_start", &self.zero_area_start)
            .field("zero_area_end", &self.zero_area_end)
            .field("end", &self.end)
            .field("shared", &self.is_shared())
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that the buffer starts with `expected`.
    fn expect_bytes(buffer: &ByteBuffer, expected: &[u8]) {
        let bytes = buffer.to_vec();
        assert!(bytes.len() >= expected.len(), "buffer has {} bytes", bytes.len());
        assert_eq!(&bytes[..expected.len()], expected);
    }

    #[test]
    fn test_write_and_grow_sequence() {
        let mut buffer = ByteBuffer::new();
        buffer.prepend(6).write_u8(0x66);
        expect_bytes(&buffer, &[0x66]);

        buffer.begin_mut().write_u8(0x67);
        expect_bytes(&buffer, &[0x67]);
        {
            let mut i = buffer.begin_mut();
            i.next();
            i.write_hton_u16(0x6568);
        }
        expect_bytes(&buffer, &[0x67, 0x65, 0x68]);
        buffer.begin_mut().write_hton_u16(0x6369);
        expect_bytes(&buffer, &[0x63, 0x69, 0x68]);
        {
            let mut i = buffer.begin_mut();
            i.next_by(2);
            i.write_hton_u32(0xdeadbeaf);
        }
        assert_eq!(buffer.to_vec(), [0x63, 0x69, 0xde, 0xad, 0xbe, 0xaf]);

        buffer.prepend(2).write_u16(0);
        assert_eq!(buffer.to_vec(), [0, 0, 0x63, 0x69, 0xde, 0xad, 0xbe, 0xaf]);

        {
            let mut i = buffer.append(2);
            i.prev_by(2);
            i.write_u16(0);
        }
        assert_eq!(buffer.to_vec(), [0, 0, 0x63, 0x69, 0xde, 0xad, 0xbe, 0xaf, 0, 0]);

        buffer.remove_at_start(3);
        assert_eq!(buffer.to_vec(), [0x69, 0xde, 0xad, 0xbe, 0xaf, 0, 0]);
        buffer.remove_at_end(4);
        assert_eq!(buffer.to_vec(), [0x69, 0xde, 0xad]);

        buffer.prepend(1).write_u8(0xff);
        assert_eq!(buffer.to_vec(), [0xff, 0x69, 0xde, 0xad]);

        {
            let mut i = buffer.append(1);
            i.prev();
            i.write_u8(0xff);
        }
        {
            let mut i = buffer.begin_mut();
            i.next_by(2);
            let saved = i.read_u16();
            i.prev_by(2);
            i.write_hton_u16(0xff00);
            i.prev_by(2);
            assert_eq!(i.read_ntoh_u16(), 0xff00);
            i.prev_by(2);
            i.write_u16(saved);
        }
        assert_eq!(buffer.to_vec(), [0xff, 0x69, 0xde, 0xad, 0xff]);

        let mut o = buffer.clone();
        assert_eq!(o.to_vec(), [0xff, 0x69, 0xde, 0xad, 0xff]);
        o.prepend(1).write_u8(0xfe);
        assert_eq!(o.to_vec(), [0xfe, 0xff, 0x69, 0xde, 0xad, 0xff]);

        {
            let mut i = buffer.prepend(2);
            i.write_u8(0xfd);
            i.write_u8(0xfd);
        }
        assert_eq!(o.to_vec(), [0xfe, 0xff, 0x69, 0xde, 0xad, 0xff]);
        assert_eq!(buffer.to_vec(), [0xfd, 0xfd, 0xff, 0x69, 0xde, 0xad, 0xff]);
    }

    #[test]
    fn test_remove_at_start_across_zero_area() {
        let mut buffer = ByteBuffer::with_zero_size(5);
        assert_eq!(buffer.to_vec(), [0, 0, 0, 0, 0]);
        buffer.remove_at_start(1);
        assert_eq!(buffer.to_vec(), [0, 0, 0, 0]);
        buffer.prepend(1).write_u8(0xff);
        assert_eq!(buffer.to_vec(), [0xff, 0, 0, 0, 0]);
        buffer.remove_at_start(3);
        assert_eq!(buffer.to_vec(), [0, 0]);
        buffer.prepend(4).write_hton_u32(0xdeadbeaf);
        assert_eq!(buffer.to_vec(), [0xde, 0xad, 0xbe, 0xaf, 0, 0]);
        buffer.remove_at_start(2);
        assert_eq!(buffer.to_vec(), [0xbe, 0xaf, 0, 0]);
        {
            let mut i = buffer.append(4);
            i.prev_by(4);
            i.write_hton_u32(0xdeadbeaf);
        }
        assert_eq!(buffer.to_vec(), [0xbe, 0xaf, 0, 0, 0xde, 0xad, 0xbe, 0xaf]);
        buffer.remove_at_start(5);
        assert_eq!(buffer.to_vec(), [0xad, 0xbe, 0xaf]);
    }

    #[test]
    fn test_remove_at_end_across_zero_area() {
        let mut buffer = ByteBuffer::with_zero_size(5);
        buffer.remove_at_end(1);
        assert_eq!(buffer.to_vec(), [0, 0, 0, 0]);
        {
            let mut i = buffer.append(2);
            i.prev_by(2);
            i.write_u8(0xab);
            i.write_u8(0xac);
        }
        assert_eq!(buffer.to_vec(), [0, 0, 0, 0, 0xab, 0xac]);
        buffer.remove_at_end(1);
        assert_eq!(buffer.to_vec(), [0, 0, 0, 0, 0xab]);
        buffer.remove_at_end(3);
        assert_eq!(buffer.to_vec(), [0, 0]);

        {
            let mut i = buffer.append(6);
            i.prev_by(6);
            i.write(&[0xac, 0xad, 0xae, 0xaf, 0xba, 0xbb]);
        }
        assert_eq!(buffer.to_vec(), [0, 0, 0xac, 0xad, 0xae, 0xaf, 0xba, 0xbb]);

        {
            let mut i = buffer.prepend(3);
            i.write_u8(0x30);
            i.write_u8(0x31);
            i.write_u8(0x32);
        }
        assert_eq!(
            buffer.to_vec(),
            [0x30, 0x31, 0x32, 0, 0, 0xac, 0xad, 0xae, 0xaf, 0xba, 0xbb]
        );
        buffer.remove_at_end(9);
        assert_eq!(buffer.to_vec(), [0x30, 0x31]);

        let mut buffer = ByteBuffer::with_zero_size(3);
        {
            let mut i = buffer.append(2);
            i.prev_by(2);
            i.write_hton_u16(0xabcd);
        }
        buffer.prepend(1).write_u8(0x21);
        assert_eq!(buffer.to_vec(), [0x21, 0, 0, 0, 0xab, 0xcd]);
        buffer.remove_at_end(8);
        assert_eq!(buffer.size(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_over_removal_clamps() {
        let mut buffer = ByteBuffer::with_zero_size(4);
        buffer.add_at_start(2);
        buffer.remove_at_start(u32::MAX);
        assert!(buffer.is_empty());

        let mut buffer = ByteBuffer::with_zero_size(4);
        buffer.add_at_end(2);
        buffer.remove_at_end(100);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_length_adds_are_noops() {
        let mut buffer = ByteBuffer::new();
        buffer.prepend(3).write(&[1, 2, 3]);
        let shared = buffer.clone();
        buffer.add_at_start(0);
        buffer.add_at_end(0);
        assert_eq!(buffer.to_vec(), [1, 2, 3]);
        assert!(Rc::ptr_eq(&buffer.store, &shared.store));
    }

    #[test]
    fn test_empty_writes_at_zero_area_start() {
        let mut buffer = ByteBuffer::with_zero_size(100);
        {
            let mut i = buffer.prepend(4);
            i.write_hton_u32(0x0102_0304);
            i.write(&[]);
            i.write_u8_repeat(0xee, 0);
        }
        {
            let mut i = buffer.begin_mut();
            i.write(&[]);
            i.next_by(4);
            i.write(&[]);
            i.write_u8_repeat(0xee, 0);
        }
        let mut expected = vec![1, 2, 3, 4];
        expected.extend_from_slice(&[0; 100]);
        assert_eq!(buffer.to_vec(), expected);

        // Without a zero area, its start is the buffer end.
        let mut buffer = ByteBuffer::new();
        buffer.prepend(2).write(&[5, 6]);
        let mut i = buffer.end_mut();
        i.write(&[]);
        i.write_u8_repeat(0xee, 0);
        assert_eq!(buffer.to_vec(), [5, 6]);
    }

    #[test]
    fn test_empty_writes_leave_shared_store_alone() {
        let mut original = ByteBuffer::with_zero_size(8);
        original.prepend(2).write(&[1, 2]);
        let mut copy = original.clone();
        copy.prepend(0).write(&[]);
        copy.append(0).write_u8_repeat(0, 0);
        assert!(Rc::ptr_eq(&copy.store, &original.store));
        assert_eq!(copy.to_vec(), original.to_vec());
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut original = ByteBuffer::new();
        original.prepend(4).write_hton_u32(0x01020304);

        let mut copy = original.clone();
        copy.prepend(2).write_hton_u16(0xaaaa);
        original.prepend(2).write_hton_u16(0xbbbb);

        assert_eq!(copy.to_vec(), [0xaa, 0xaa, 1, 2, 3, 4]);
        assert_eq!(original.to_vec(), [0xbb, 0xbb, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clone_is_isolated_at_end() {
        let mut original = ByteBuffer::new();
        {
            let mut i = original.append(2);
            i.prev_by(2);
            i.write(&[1, 2]);
        }

        let mut copy = original.clone();
        {
            let mut i = copy.append(1);
            i.prev();
            i.write_u8(0xcc);
        }
        {
            let mut i = original.append(1);
            i.prev();
            i.write_u8(0xdd);
        }

        assert_eq!(copy.to_vec(), [1, 2, 0xcc]);
        assert_eq!(original.to_vec(), [1, 2, 0xdd]);
    }

    #[test]
    fn test_overwriting_a_clone_leaves_original_intact() {
        let mut original = ByteBuffer::with_zero_size(2);
        original.prepend(3).write(&[1, 2, 3]);

        let mut copy = original.clone();
        copy.begin_mut().write(&[9, 9, 9]);
        {
            let mut i = copy.end_mut();
            i.prev_by(5);
            i.write_u8(8);
        }
        assert_eq!(copy.to_vec(), [8, 9, 9, 0, 0]);
        assert_eq!(original.to_vec(), [1, 2, 3, 0, 0]);
        assert!(!Rc::ptr_eq(&copy.store, &original.store));

        // Only the writing view pays for the copy.
        let fragment = original.create_fragment(1, 2);
        original.begin_mut().write_u8(7);
        assert_eq!(original.to_vec(), [7, 2, 3, 0, 0]);
        assert_eq!(fragment.to_vec(), [2, 3]);
    }

    #[test]
    fn test_unshared_overwrite_keeps_store() {
        let mut buffer = ByteBuffer::new();
        buffer.prepend(2).write(&[1, 2]);
        let before = Rc::as_ptr(&buffer.store);
        buffer.begin_mut().write_u8(3);
        assert_eq!(Rc::as_ptr(&buffer.store), before);
        assert_eq!(buffer.to_vec(), [3, 2]);
    }

    #[test]
    fn test_add_buffer_joins_zero_areas() {
        let mut head = ByteBuffer::with_zero_size(10);
        head.prepend(1).write_u8(0x11);

        let mut tail = ByteBuffer::with_zero_size(5);
        {
            let mut i = tail.append(2);
            i.prev_by(2);
            i.write(&[0x21, 0x22]);
        }

        head.add_buffer_at_end(&tail);
        assert_eq!(head.size(), 18);
        assert_eq!(head.zero_size(), 15);
        let mut expected = vec![0x11];
        expected.extend_from_slice(&[0; 15]);
        expected.extend_from_slice(&[0x21, 0x22]);
        assert_eq!(head.to_vec(), expected);
    }

    #[test]
    fn test_add_buffer_joins_zero_only_tail() {
        let mut head = ByteBuffer::with_zero_size(3);
        head.add_buffer_at_end(&ByteBuffer::with_zero_size(4));
        assert_eq!(head.size(), 7);
        assert_eq!(head.zero_size(), 7);
    }

    #[test]
    fn test_add_buffer_general_path() {
        let mut first = ByteBuffer::with_zero_size(2);
        {
            let mut i = first.append(1);
            i.prev();
            i.write_u8(9);
        }

        let mut second = ByteBuffer::new();
        second.prepend(3).write(&[4, 5, 6]);

        first.add_buffer_at_end(&second);
        assert_eq!(first.to_vec(), [0, 0, 9, 4, 5, 6]);
        assert_eq!(first.zero_size(), 0);
        assert_eq!(second.to_vec(), [4, 5, 6]);
    }

    #[test]
    fn test_fragments_of_one_store_reassemble() {
        let mut buffer = ByteBuffer::with_zero_size(6);
        buffer.prepend(3).write(&[1, 2, 3]);
        {
            let mut i = buffer.append(2);
            i.prev_by(2);
            i.write(&[7, 8]);
        }

        let mut joined = buffer.create_fragment(0, 4);
        joined.add_buffer_at_end(&buffer.create_fragment(4, 3));
        joined.add_buffer_at_end(&buffer.create_fragment(7, 4));
        assert_eq!(joined.to_vec(), buffer.to_vec());
    }

    #[test]
    fn test_full_fragment_is_identical() {
        let mut buffer = ByteBuffer::with_zero_size(3);
        buffer.prepend(2).write(&[0xab, 0xcd]);
        let fragment = buffer.create_fragment(0, buffer.size());
        assert_eq!(fragment.to_vec(), buffer.to_vec());
        assert!(Rc::ptr_eq(&fragment.store, &buffer.store));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_fragment_out_of_range() {
        let buffer = ByteBuffer::with_zero_size(3);
        let _ = buffer.create_fragment(2, 2);
    }

    #[test]
    fn test_full_copy_materializes_zeros() {
        let mut buffer = ByteBuffer::with_zero_size(4);
        buffer.prepend(1).write_u8(0xee);
        {
            let mut i = buffer.append(1);
            i.prev();
            i.write_u8(0xff);
        }

        let copy = buffer.create_full_copy();
        assert_eq!(copy.zero_size(), 0);
        assert_eq!(copy.to_vec(), [0xee, 0, 0, 0, 0, 0xff]);
        assert_eq!(&*buffer.peek_data(), &[0xee, 0, 0, 0, 0, 0xff]);
        assert_eq!(buffer.zero_size(), 0);
    }

    #[test]
    fn test_copy_data_partial() {
        let mut buffer = ByteBuffer::with_zero_size(3);
        buffer.prepend(2).write(&[1, 2]);
        {
            let mut i = buffer.append(2);
            i.prev_by(2);
            i.write(&[3, 4]);
        }

        let mut out = [0xffu8; 4];
        assert_eq!(buffer.copy_data(&mut out), 4);
        assert_eq!(out, [1, 2, 0, 0]);

        let mut out = [0xffu8; 16];
        assert_eq!(buffer.copy_data(&mut out), 7);
        assert_eq!(&out[..7], &[1, 2, 0, 0, 0, 3, 4]);
    }

    #[test]
    fn test_write_to_stream() {
        let mut buffer = ByteBuffer::with_zero_size(2500);
        buffer.prepend(1).write_u8(7);
        {
            let mut i = buffer.append(1);
            i.prev();
            i.write_u8(8);
        }

        let mut out = Vec::new();
        buffer.write_to(&mut out, buffer.size()).unwrap();
        assert_eq!(out.len(), 2502);
        assert_eq!(out[0], 7);
        assert!(out[1..2501].iter().all(|&b| b == 0));
        assert_eq!(out[2501], 8);

        let mut out = Vec::new();
        buffer.write_to(&mut out, 3).unwrap();
        assert_eq!(out, [7, 0, 0]);
    }

    #[test]
    fn test_dropped_buffer_raises_recommended_start() {
        let mut buffer = ByteBuffer::with_zero_size(10);
        buffer.add_at_start(40);
        drop(buffer);
        assert!(store::recommended_start() >= 40);
    }

    #[test]
    fn test_replaced_buffer_raises_recommended_start() {
        let mut buffer = ByteBuffer::with_zero_size(10);
        buffer.add_at_start(4000);
        assert!(store::recommended_start() < 4000);
        buffer = ByteBuffer::new();
        assert!(store::recommended_start() >= 4000);
        assert!(buffer.is_empty());

        // Materializing the zero area replaces the view in place.
        let mut buffer = ByteBuffer::with_zero_size(4);
        buffer.add_at_start(5000);
        assert!(store::recommended_start() < 5000);
        let _ = buffer.peek_data();
        assert!(store::recommended_start() >= 5000);
    }
}
