use crate::{config::Config, constants::FREE_LIST_MAX_ENTRIES};

/// A backing allocation that can be parked on a [`FreeList`].
pub trait Recyclable {
    /// Returns the usable size of the allocation in bytes.
    fn capacity(&self) -> usize;
}

impl Recyclable for Box<[u8]> {
    fn capacity(&self) -> usize {
        self.len()
    }
}

impl Recyclable for Vec<u8> {
    fn capacity(&self) -> usize {
        self.len()
    }
}

/// Counters describing how a free list has been used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served from the list.
    pub hits: u64,
    /// Acquisitions that found nothing large enough.
    pub misses: u64,
    /// Allocations returned to the list.
    pub recycled: u64,
    /// Allocations dropped, either on release or while scanning for a large enough entry.
    pub discarded: u64,
}

/// A bounded free list of released backing stores.
///
/// The list remembers the largest size ever requested or released (its high-water mark)
/// and refuses to keep anything smaller, so it tends to hold buffers large enough for the
/// next packet.
#[derive(Debug)]
pub struct FreeList<T> {
    /// Parked allocations; the most recently released one is at the back.
    entries: Vec<T>,
    /// Max number of parked allocations
    max_entries: usize,
    /// Largest size requested or released so far
    high_water: usize,
    /// When false, releases deallocate immediately
    enabled: bool,
    stats: PoolStats,
}

impl<T: Recyclable> FreeList<T> {
    /// Creates an empty free list keeping at most `max_entries` allocations.
    pub fn new(max_entries: usize) -> Self {
        Self { entries: Vec::new(), max_entries, high_water: 0, enabled: true, stats: PoolStats::default() }
    }

    /// Creates a free list sized and enabled according to `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut list = Self::new(config.free_list_capacity);
        list.enabled = config.free_list_enabled;
        list
    }

    /// Applies `config` to an existing list, dropping entries beyond the new capacity.
    pub fn configure(&mut self, config: &Config) {
        self.max_entries = config.free_list_capacity;
        self.enabled = config.free_list_enabled;
        if !self.enabled {
            self.entries.clear();
        } else {
            self.entries.truncate(self.max_entries);
        }
    }

    /// Takes an allocation of at least `size` bytes from the list.
    ///
    /// Entries scanned on the way that are too small are deallocated. Returns `None` when
    /// the caller has to allocate fresh storage.
    pub fn acquire(&mut self, size: usize) -> Option<T> {
        self.high_water = self.high_water.max(size);
        while let Some(entry) = self.entries.pop() {
            if entry.capacity() >= size {
                self.stats.hits += 1;
                return Some(entry);
            }
            self.stats.discarded += 1;
        }
        self.stats.misses += 1;
        None
    }

    /// Returns an allocation to the list, or drops it when the list is full, disabled, or
    /// the allocation is smaller than the high-water mark.
    pub fn release(&mut self, entry: T) {
        let capacity = entry.capacity();
        self.high_water = self.high_water.max(capacity);
        if !self.enabled || capacity < self.high_water || self.entries.len() >= self.max_entries {
            self.stats.discarded += 1;
            return;
        }
        self.stats.recycled += 1;
        self.entries.push(entry);
    }

    /// Returns the number of allocations currently parked.
    pub fn available(&self) -> usize {
        self.entries.len()
    }

    /// Returns the largest size requested or released so far.
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    /// Returns the usage counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Emits the usage counters at debug level.
    pub fn log_stats(&self, name: &str) {
        tracing::debug!(
            "{} free list: {} parked, high water {}, {:?}",
            name,
            self.entries.len(),
            self.high_water,
            self.stats
        );
    }

    /// Drops all parked allocations.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Recyclable> Default for FreeList<T> {
    fn default() -> Self {
        Self::new(FREE_LIST_MAX_ENTRIES)
    }
}
