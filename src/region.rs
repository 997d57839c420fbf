//! Exact-length reads of the raw regions that follow the header.

use std::io::{self, Read};

/// Read exactly `size` bytes, verbatim.
///
/// A zero size yields an empty buffer without touching the reader.  The
/// buffer grows with the bytes actually delivered rather than being sized
/// from the (untrusted) header field up front, so an oversized field on a
/// short file fails with `UnexpectedEof` instead of a huge allocation.
pub fn read_region<R: Read>(reader: &mut R, size: u32, what: &str) -> io::Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut buf = Vec::with_capacity((size as usize).min(64 * 1024));
    reader.by_ref().take(size as u64).read_to_end(&mut buf)?;
    if buf.len() != size as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{what}: expected {size} bytes, file ends after {}", buf.len()),
        ));
    }
    Ok(buf)
}
