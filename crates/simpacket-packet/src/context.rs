use std::cell::Cell;

use simpacket_core::Config;

use crate::Packet;

/// Per-simulation state every packet is created through.
///
/// Holds the metadata recording switch and hands out packet uids. Creating a context also
/// applies its pool settings to the current thread's buffer and metadata store pools.
#[derive(Debug)]
pub struct PacketContext {
    config: Config,
    next_uid: Cell<u64>,
}

impl PacketContext {
    /// Creates a context and configures this thread's store pools from `config`.
    pub fn new(config: Config) -> Self {
        simpacket_buffer::configure_pool(&config);
        simpacket_metadata::configure_pool(&config);
        Self { config, next_uid: Cell::new(0) }
    }

    /// Returns the configuration this context was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true when packets record header and trailer metadata.
    pub fn metadata_enabled(&self) -> bool {
        self.config.metadata_enabled
    }

    /// Creates a packet of `size` zero bytes.
    pub fn create_packet(&self, size: u32) -> Packet {
        Packet::new(self, size)
    }

    /// Returns the number of packets created so far.
    pub fn packets_created(&self) -> u64 {
        self.next_uid.get()
    }

    pub(crate) fn allocate_uid(&self) -> u64 {
        let uid = self.next_uid.get();
        self.next_uid.set(uid + 1);
        uid
    }
}

impl Default for PacketContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
