//! Unsigned LEB128 for the variable-width fields of a metadata record.

/// Returns the number of bytes `value` occupies once encoded.
pub(crate) fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Encodes `value` at the front of `out` and returns the number of bytes written.
pub(crate) fn write(out: &mut [u8], mut value: u32) -> usize {
    let mut written = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out[written] = byte;
            return written + 1;
        }
        out[written] = byte | 0x80;
        written += 1;
    }
}

/// Decodes a value from the front of `bytes`, returning it with the number of bytes read.
///
/// # Panics
///
/// Panics when the fifth byte still carries a continuation bit or spills past 32 bits.
/// Metadata stores are only ever written by [`write`], so this means the store is corrupt.
pub(crate) fn read(bytes: &[u8]) -> (u32, usize) {
    let mut value = 0u32;
    for (index, &byte) in bytes.iter().take(5).enumerate() {
        if index == 4 {
            assert!(byte & 0xf0 == 0, "invalid uleb128 value in metadata log: {:#04x}", byte);
        }
        value |= u32::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return (value, index + 1);
        }
    }
    panic!("unterminated uleb128 value in metadata log");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len_boundaries() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(0x7f), 1);
        assert_eq!(encoded_len(0x80), 2);
        assert_eq!(encoded_len(0x3fff), 2);
        assert_eq!(encoded_len(0x4000), 3);
        assert_eq!(encoded_len(0x1f_ffff), 3);
        assert_eq!(encoded_len(0x20_0000), 4);
        assert_eq!(encoded_len(0x0fff_ffff), 4);
        assert_eq!(encoded_len(0x1000_0000), 5);
        assert_eq!(encoded_len(u32::MAX), 5);
    }

    #[test]
    fn test_write_matches_encoded_len() {
        for value in [0, 1, 0x7f, 0x80, 300, 0x3fff, 0x4000, 0x12_3456, 0x0fff_ffff, u32::MAX] {
            let mut out = [0u8; 5];
            let written = write(&mut out, value);
            assert_eq!(written, encoded_len(value));
            assert_eq!(read(&out), (value, written));
        }
    }

    #[test]
    fn test_known_encoding() {
        let mut out = [0u8; 5];
        assert_eq!(write(&mut out, 300), 2);
        assert_eq!(&out[..2], &[0xac, 0x02]);
    }

    #[test]
    #[should_panic(expected = "invalid uleb128")]
    fn test_fifth_byte_overflow_panics() {
        read(&[0xff, 0xff, 0xff, 0xff, 0x1f]);
    }

    #[test]
    #[should_panic(expected = "invalid uleb128")]
    fn test_fifth_byte_continuation_panics() {
        read(&[0x80, 0x80, 0x80, 0x80, 0x81]);
    }
}
