//! Printing policy for metadata replay.

use std::{collections::HashMap, fmt};

use simpacket_buffer::BufferIterator;

use crate::{item::Item, record::ItemKind};

/// The part of an original chunk still present in a packet, as byte offsets into the chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentInformation {
    /// First byte of the chunk present.
    pub start: u32,
    /// One past the last byte of the chunk present.
    pub end: u32,
}

/// Prints payload: `(out, packet_uid, size, fragment)`. `fragment` is `None` for a complete
/// payload item.
pub type PayloadPrinter = Box<dyn Fn(&mut dyn fmt::Write, u64, u32, Option<FragmentInformation>) -> fmt::Result>;

/// Prints a complete chunk from its bytes: `(out, packet_uid, size, cursor)`.
pub type ChunkPrinter = Box<dyn for<'b> Fn(&mut dyn fmt::Write, u64, u32, &mut BufferIterator<'b>) -> fmt::Result>;

/// Prints a chunk by name only: `(out, packet_uid, size, name, fragment)`.
pub type FragmentPrinter = Box<dyn Fn(&mut dyn fmt::Write, u64, u32, &str, FragmentInformation) -> fmt::Result>;

struct Registration {
    name: String,
    chunk: Option<ChunkPrinter>,
    fragment: Option<FragmentPrinter>,
}

/// Decides how each item of a metadata log is printed.
///
/// Payload goes to the payload printer. A complete header or trailer whose type has a chunk
/// printer is decoded by it, a fragment of a type with a fragment printer goes there, and
/// everything else falls back to the default printer. Without a default printer, items
/// print as `Name (size=N)` or `Name Fragment [start:end]`.
pub struct PacketPrinter {
    forward: bool,
    separator: String,
    payload: Option<PayloadPrinter>,
    default: Option<FragmentPrinter>,
    registrations: HashMap<u32, Registration>,
}

impl PacketPrinter {
    /// Creates a printer that prints front to back, separated by spaces.
    pub fn new() -> Self {
        Self {
            forward: true,
            separator: String::from(" "),
            payload: None,
            default: None,
            registrations: HashMap::new(),
        }
    }

    /// Prints items front to back.
    pub fn print_forward(&mut self) {
        self.forward = true;
    }

    /// Prints items back to front.
    pub fn print_backward(&mut self) {
        self.forward = false;
    }

    /// Returns true when items print front to back.
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Sets the text written between two items.
    pub fn set_separator(&mut self, separator: impl Into<String>) {
        self.separator = separator.into();
    }

    /// Returns the text written between two items.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Sets the printer for payload items.
    pub fn set_payload_printer<F>(&mut self, printer: F)
    where
        F: Fn(&mut dyn fmt::Write, u64, u32, Option<FragmentInformation>) -> fmt::Result + 'static,
    {
        self.payload = Some(Box::new(printer));
    }

    /// Sets the printer for items nothing else handles.
    pub fn set_default_printer<F>(&mut self, printer: F)
    where
        F: Fn(&mut dyn fmt::Write, u64, u32, &str, FragmentInformation) -> fmt::Result + 'static,
    {
        self.default = Some(Box::new(printer));
    }

    /// Registers `name` and a printer for complete chunks of type `type_uid`.
    pub fn set_chunk_printer<F>(&mut self, type_uid: u32, name: impl Into<String>, printer: F)
    where
        F: for<'b> Fn(&mut dyn fmt::Write, u64, u32, &mut BufferIterator<'b>) -> fmt::Result + 'static,
    {
        self.registration(type_uid, name.into()).chunk = Some(Box::new(printer));
    }

    /// Registers `name` and a printer for fragments of chunks of type `type_uid`.
    pub fn set_fragment_printer<F>(&mut self, type_uid: u32, name: impl Into<String>, printer: F)
    where
        F: Fn(&mut dyn fmt::Write, u64, u32, &str, FragmentInformation) -> fmt::Result + 'static,
    {
        self.registration(type_uid, name.into()).fragment = Some(Box::new(printer));
    }

    fn registration(&mut self, type_uid: u32, name: String) -> &mut Registration {
        let registration = self
            .registrations
            .entry(type_uid)
            .or_insert_with(|| Registration { name: String::new(), chunk: None, fragment: None });
        registration.name = name;
        registration
    }

    /// Returns the display name of chunk type `type_uid`.
    pub fn name(&self, type_uid: u32) -> String {
        match self.registrations.get(&type_uid) {
            Some(registration) => registration.name.clone(),
            None => format!("Chunk({})", type_uid),
        }
    }

    /// Prints one item of packet `packet_uid`.
    pub fn print_item(&self, out: &mut dyn fmt::Write, packet_uid: u64, item: Item<'_>) -> fmt::Result {
        let fragment = FragmentInformation {
            start: item.trimmed_from_start,
            end: item.trimmed_from_start + item.current_size,
        };
        if item.kind == ItemKind::Payload {
            if let Some(payload) = &self.payload {
                return payload(out, packet_uid, item.current_size, item.is_fragment.then_some(fragment));
            }
            return self.print_default(out, packet_uid, item.current_size, "Payload", fragment, item.is_fragment);
        }

        let registration = self.registrations.get(&item.type_uid);
        if item.is_fragment {
            if let Some((name, printer)) = registration.and_then(|r| Some((r.name.as_str(), r.fragment.as_ref()?))) {
                return printer(out, packet_uid, item.current_size, name, fragment);
            }
        } else if let (Some(printer), Some(mut current)) = (registration.and_then(|r| r.chunk.as_ref()), item.current) {
            return printer(out, packet_uid, item.current_size, &mut current);
        }
        let name = self.name(item.type_uid);
        self.print_default(out, packet_uid, item.current_size, &name, fragment, item.is_fragment)
    }

    /// Prints `size` bytes of complete payload.
    pub(crate) fn print_payload(&self, out: &mut dyn fmt::Write, packet_uid: u64, size: u32) -> fmt::Result {
        if let Some(payload) = &self.payload {
            return payload(out, packet_uid, size, None);
        }
        self.print_default(out, packet_uid, size, "Payload", FragmentInformation { start: 0, end: size }, false)
    }

    fn print_default(
        &self,
        out: &mut dyn fmt::Write,
        packet_uid: u64,
        size: u32,
        name: &str,
        fragment: FragmentInformation,
        is_fragment: bool,
    ) -> fmt::Result {
        if let Some(default) = &self.default {
            return default(out, packet_uid, size, name, fragment);
        }
        if is_fragment {
            write!(out, "{} Fragment [{}:{}]", name, fragment.start, fragment.end)
        } else {
            write!(out, "{} (size={})", name, size)
        }
    }
}

impl Default for PacketPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PacketPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketPrinter")
            .field("forward", &self.forward)
            .field("separator", &self.separator)
            .field("registered", &self.registrations.len())
            .finish()
    }
}
