//! LEB128 variable-length integers over byte streams.

use std::io::{self, Read, Write};

/// A u64 never needs more than ten 7-bit groups.
const MAX_VARINT_BYTES: usize = 10;

/// Writes `value` as a varint.
pub fn write_varint<W: Write + ?Sized>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let mut len = 0;
    loop {
        if value < 0x80 {
            buf[len] = value as u8;
            len += 1;
            break;
        }
        buf[len] = (value as u8) | 0x80;
        len += 1;
        value >>= 7;
    }
    writer.write_all(&buf[..len])
}

/// Reads a varint, returning `None` on a clean end of stream.
///
/// A stream that ends in the middle of a varint is an error.
pub fn read_varint_opt<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<u64>> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for i in 0..MAX_VARINT_BYTES {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte)? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "incomplete varint",
            ));
        }
        result |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint exceeds maximum length",
    ))
}

/// Reads a varint that must be present.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    read_varint_opt(reader)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "expected varint")
    })
}
