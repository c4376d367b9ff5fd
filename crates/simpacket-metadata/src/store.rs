//! Shared byte storage for metadata logs.
//!
//! Logs cloned from one another share a [`MetadataStore`] through an `Rc`. Released stores
//! go to a thread-local free list of their own, separate from the buffer store pool.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use simpacket_core::{constants::METADATA_MIN_STORE_SIZE, Config, FreeList, PoolStats};

thread_local! {
    static FREE_LIST: RefCell<FreeList<Box<[u8]>>> = RefCell::new(FreeList::default());
    static MIN_STORE_SIZE: Cell<usize> = const { Cell::new(METADATA_MIN_STORE_SIZE) };
}

/// Flat record storage with a dirty-end watermark.
///
/// `dirty_end` is the end of the last record any sharing log wrote. A shared store may only
/// be appended to by the log whose `used` offset equals it.
pub struct MetadataStore {
    data: RefCell<Box<[u8]>>,
    dirty_end: Cell<u16>,
}

impl MetadataStore {
    /// Returns a store with room for at least `size` bytes.
    ///
    /// The store is never smaller than the configured minimum, and released stores are
    /// reused when one is large enough.
    pub fn acquire(size: usize) -> Rc<Self> {
        let size = size.max(MIN_STORE_SIZE.try_with(Cell::get).unwrap_or(METADATA_MIN_STORE_SIZE));
        let raw = FREE_LIST
            .try_with(|list| list.borrow_mut().acquire(size))
            .ok()
            .flatten()
            .unwrap_or_else(|| vec![0u8; size].into_boxed_slice());
        Rc::new(Self { data: RefCell::new(raw), dirty_end: Cell::new(0) })
    }

    /// Returns a store without backing bytes, used by logs that do not record anything.
    pub(crate) fn empty() -> Rc<Self> {
        Rc::new(Self { data: RefCell::new(Box::default()), dirty_end: Cell::new(0) })
    }

    /// Returns the number of bytes the store can hold.
    pub fn capacity(&self) -> usize {
        self.data.borrow().len()
    }

    /// Returns the end of the last record written by any sharing log.
    pub fn dirty_end(&self) -> u16 {
        self.dirty_end.get()
    }

    pub(crate) fn set_dirty_end(&self, end: u16) {
        self.dirty_end.set(end);
    }

    pub(crate) fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |data| &data[..])
    }

    pub(crate) fn bytes_mut(&self) -> RefMut<'_, [u8]> {
        RefMut::map(self.data.borrow_mut(), |data| &mut data[..])
    }
}

impl Drop for MetadataStore {
    fn drop(&mut self) {
        let raw = std::mem::take(self.data.get_mut());
        if raw.is_empty() {
            return;
        }
        let _ = FREE_LIST.try_with(|list| list.borrow_mut().release(raw));
    }
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("capacity", &self.capacity())
            .field("dirty_end", &self.dirty_end())
            .finish()
    }
}

/// Applies the free-list and minimum-size settings of `config` to this thread's
/// metadata store pool.
pub fn configure_pool(config: &Config) {
    FREE_LIST.with(|list| list.borrow_mut().configure(config));
    MIN_STORE_SIZE.with(|size| size.set(config.metadata_min_store_size.max(1)));
}

/// Returns the usage counters of this thread's metadata store pool.
pub fn pool_stats() -> PoolStats {
    FREE_LIST.with(|list| list.borrow().stats())
}

/// Logs the metadata store pool counters at debug level.
pub fn log_pool_stats() {
    FREE_LIST.with(|list| list.borrow().log_stats("metadata"));
}
