#![warn(missing_docs)]

//! simpacket-buffer: the copy-on-write byte buffer behind every simulated packet.
//!
//! - [`ByteStore`]: reference-counted raw storage with a dirty-region watermark, recycled
//!   through a thread-local free list
//! - [`ByteBuffer`]: O(1)-clone view over a store with a virtual zero area for payload
//! - [`BufferIterator`]: read-only cursor with host, network and little-endian typed access
//! - [`BufferWriter`]: writing cursor, handed out only by a mutable borrow of the buffer
//!
//! Offset and cursor violations are programming errors and panic.

/// Copy-on-write buffer views.
pub mod buffer;
/// Typed cursor over a buffer.
pub mod iterator;
/// Backing stores and their free list.
pub mod store;
/// Whole-buffer transfer form.
pub mod transfer;
/// Writing cursor over an owned window of a buffer.
pub mod writer;

pub use buffer::ByteBuffer;
pub use iterator::BufferIterator;
pub use store::{configure_pool, log_pool_stats, pool_available, pool_stats, ByteStore};
pub use writer::BufferWriter;
