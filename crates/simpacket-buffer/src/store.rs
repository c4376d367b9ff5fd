//! Reference-counted backing storage for byte buffers.
//!
//! A [`ByteStore`] is shared between [`ByteBuffer`](crate::ByteBuffer) views through an
//! `Rc`; the strong count is the number of views. When the last view lets go, the raw
//! allocation is parked on a thread-local free list so the next packet can reuse it.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use simpacket_core::{Config, FreeList, PoolStats};

thread_local! {
    /// Raw allocations released by dropped stores.
    static FREE_LIST: RefCell<FreeList<Box<[u8]>>> = RefCell::new(FreeList::default());
    /// Largest zero-area start any dropped buffer reached.
    static RECOMMENDED_START: Cell<u32> = const { Cell::new(0) };
}

/// Raw byte allocation with a dirty-region watermark.
///
/// The dirty region `[dirty_start, dirty_end)` is expressed in physical store indices and
/// covers every byte some view has already exposed as content. A view that shares the store
/// may only grow in place when it sits exactly on the edge of that region.
pub struct ByteStore {
    data: RefCell<Box<[u8]>>,
    dirty_start: Cell<u32>,
    dirty_end: Cell<u32>,
}

impl ByteStore {
    /// Allocates fresh storage of at least `max(size, 1)` bytes, bypassing the free list.
    pub fn allocate(size: u32) -> Rc<Self> {
        let size = size.max(1) as usize;
        Rc::new(Self::from_raw(vec![0u8; size].into_boxed_slice()))
    }

    /// Returns storage of at least `size` bytes, reusing a released allocation if one fits.
    pub fn acquire(size: u32) -> Rc<Self> {
        let recycled = FREE_LIST
            .try_with(|list| list.borrow_mut().acquire(size.max(1) as usize))
            .ok()
            .flatten();
        match recycled {
            Some(raw) => Rc::new(Self::from_raw(raw)),
            None => Self::allocate(size),
        }
    }

    fn from_raw(raw: Box<[u8]>) -> Self {
        Self { data: RefCell::new(raw), dirty_start: Cell::new(0), dirty_end: Cell::new(0) }
    }

    /// Returns the number of bytes the store can hold.
    pub fn capacity(&self) -> u32 {
        self.data.borrow().len() as u32
    }

    /// Returns the start of the dirty region.
    pub fn dirty_start(&self) -> u32 {
        self.dirty_start.get()
    }

    /// Returns the end of the dirty region.
    pub fn dirty_end(&self) -> u32 {
        self.dirty_end.get()
    }

    pub(crate) fn set_dirty_start(&self, start: u32) {
        self.dirty_start.set(start);
    }

    pub(crate) fn set_dirty_end(&self, end: u32) {
        self.dirty_end.set(end);
    }

    pub(crate) fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |data| &data[..])
    }

    pub(crate) fn bytes_mut(&self) -> RefMut<'_, [u8]> {
        RefMut::map(self.data.borrow_mut(), |data| &mut data[..])
    }
}

impl Drop for ByteStore {
    fn drop(&mut self) {
        let raw = std::mem::take(self.data.get_mut());
        if raw.is_empty() {
            return;
        }
        // The list is gone during thread teardown; the allocation is simply freed then.
        let _ = FREE_LIST.try_with(|list| list.borrow_mut().release(raw));
    }
}

impl fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStore")
            .field("capacity", &self.capacity())
            .field("dirty_start", &self.dirty_start())
            .field("dirty_end", &self.dirty_end())
            .finish()
    }
}

/// Returns the offset at which fresh buffers should start inside their store.
pub(crate) fn recommended_start() -> u32 {
    RECOMMENDED_START.try_with(Cell::get).unwrap_or(0)
}

/// Raises the recommended start to at least `start`.
pub(crate) fn raise_recommended_start(start: u32) {
    let _ = RECOMMENDED_START.try_with(|hint| hint.set(hint.get().max(start)));
}

/// Applies the free-list settings of `config` to this thread's store pool.
pub fn configure_pool(config: &Config) {
    FREE_LIST.with(|list| list.borrow_mut().configure(config));
}

/// Returns the usage counters of this thread's store pool.
pub fn pool_stats() -> PoolStats {
    FREE_LIST.with(|list| list.borrow().stats())
}

/// Returns the number of allocations parked on this thread's store pool.
pub fn pool_available() -> usize {
    FREE_LIST.with(|list| list.borrow().available())
}

/// Logs the store pool counters at debug level.
pub fn log_pool_stats() {
    FREE_LIST.with(|list| list.borrow().log_stats("buffer"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_minimum_size() {
        let store = ByteStore::allocate(0);
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.dirty_start(), 0);
        assert_eq!(store.dirty_end(), 0);
        assert_eq!(Rc::strong_count(&store), 1);
    }

    #[test]
    fn test_dropped_store_is_recycled() {
        FREE_LIST.with(|list| list.borrow_mut().clear());
        let store = ByteStore::allocate(4096);
        drop(store);
        assert_eq!(pool_available(), 1);

        let again = ByteStore::acquire(100);
        assert_eq!(again.capacity(), 4096);
        assert_eq!(pool_available(), 0);
    }

    #[test]
    fn test_shared_store_not_recycled_until_last_view() {
        FREE_LIST.with(|list| list.borrow_mut().clear());
        let store = ByteStore::allocate(1 << 16);
        let other = Rc::clone(&store);
        drop(store);
        assert_eq!(pool_available(), 0);
        drop(other);
        assert_eq!(pool_available(), 1);
        FREE_LIST.with(|list| list.borrow_mut().clear());
    }

    #[test]
    fn test_recommended_start_only_grows() {
        raise_recommended_start(12);
        let current = recommended_start();
        assert!(current >= 12);
        raise_recommended_start(3);
        assert_eq!(recommended_start(), current);
    }
}
