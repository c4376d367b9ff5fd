
use simpacket_metadata::PacketPrinter;

use crate::{Chunk, Header, Trailer};

/// Typed registration of chunk printers.
///
/// A registered type prints complete items as `Name (fields)` by deserializing a default
/// instance from the packet bytes and calling its [`Chunk::print`].
pub trait PrinterExt {
    /// Registers header type `H`.
    fn register_header<H: Header + Default + 'static>(&mut self);

    /// Registers trailer type `T`.
    fn register_trailer<T: Trailer + Default + 'static>(&mut self);
}

fn register<C: Chunk + Default + 'static>(printer: &mut PacketPrinter) {
    let sample = C::default();
    let name = sample.name().to_string();
    let label = name.clone();
    printer.set_chunk_printer(sample.type_uid(), name, move |out, _, _, cursor| {
        let mut chunk = C::default();
        chunk.deserialize(cursor);
        write!(out, "{} (", label)?;
        chunk.print(out)?;
        out.write_char(')')
    });
}

impl PrinterExt for PacketPrinter {
    fn register_header<H: Header + Default + 'static>(&mut self) {
        register::<H>(self);
    }

    fn register_trailer<T: Trailer + Default + 'static>(&mut self) {
        register::<T>(self);
    }
}
