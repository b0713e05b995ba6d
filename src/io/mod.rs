//! Forward-only reading primitives shared by the container and video
//! parsers.
//!
//! Header parsing never copies payload: packets are indexed by offset and
//! length, and the bytes themselves are read later through the
//! [`segment::SegmentedReader`] built from that index.

pub mod bits;
pub mod segment;

use std::io::{Read, Seek, SeekFrom};

use crate::errors::DemuxError;

/// The three bytes that introduce every start code.
pub const START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// Read exactly `N` bytes into an array.
///
/// # Errors
/// `Io` if the underlying read fails or returns short.
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], DemuxError> {
    let mut data = [0u8; N];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Read exactly `len` bytes into a freshly allocated buffer.
///
/// # Errors
/// `Io` if the underlying read fails or returns short.
pub fn read_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, DemuxError> {
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Read `N` bytes without consuming them: the reader is seeked back to
/// where it was.
///
/// # Errors
/// `Io` if the underlying read or seek fails.
pub fn peek<R: Read + Seek, const N: usize>(reader: &mut R) -> Result<[u8; N], DemuxError> {
    let data = read_array(reader)?;
    reader.seek(SeekFrom::Current(-(N as i64)))?;
    Ok(data)
}

/// Skip `count` bytes without reading them.
///
/// # Errors
/// `Io` if the underlying seek fails.
pub fn skip<R: Seek>(reader: &mut R, count: u64) -> Result<(), DemuxError> {
    reader.seek(SeekFrom::Current(i64::try_from(count).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "skip length overflow")
    })?))?;
    Ok(())
}

/// Advance the reader until the next three peeked bytes are
/// [`START_CODE_PREFIX`].
///
/// Skipped bytes must be zero padding. In strict mode a non-zero skipped
/// byte aborts the scan.
///
/// # Errors
/// `MalformedVideoStream` on a non-zero padding byte in strict mode; `Io`
/// if the stream ends before a start code is found.
pub fn next_start_code<R: Read + Seek>(reader: &mut R, strict: bool) -> Result<(), DemuxError> {
    loop {
        let next: [u8; 3] = peek(reader)?;
        if next == START_CODE_PREFIX {
            return Ok(());
        }
        let [byte] = read_array(reader)?;
        if strict && byte != 0 {
            return Err(DemuxError::MalformedVideoStream(byte));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn peek_does_not_consume() {
        let mut reader = Cursor::new(vec![0x01, 0x02, 0x03, 0x04]);
        let peeked: [u8; 2] = peek(&mut reader).unwrap();
        assert_eq!(peeked, [0x01, 0x02]);
        let read: [u8; 4] = read_array(&mut reader).unwrap();
        assert_eq!(read, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn next_start_code_skips_zero_padding() {
        let mut reader = Cursor::new(vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xB3]);
        next_start_code(&mut reader, true).unwrap();
        let code: [u8; 4] = read_array(&mut reader).unwrap();
        assert_eq!(code, [0x00, 0x00, 0x01, 0xB3]);
    }

    #[test]
    fn next_start_code_rejects_garbage_in_strict_mode() {
        let mut reader = Cursor::new(vec![0x42, 0x00, 0x00, 0x01, 0xB3]);
        let err = next_start_code(&mut reader, true).unwrap_err();
        assert!(matches!(err, DemuxError::MalformedVideoStream(0x42)));
    }

    #[test]
    fn next_start_code_tolerates_garbage_otherwise() {
        let mut reader = Cursor::new(vec![0x42, 0x17, 0x00, 0x00, 0x01, 0x00]);
        next_start_code(&mut reader, false).unwrap();
        let code: [u8; 4] = read_array(&mut reader).unwrap();
        assert_eq!(code, [0x00, 0x00, 0x01, 0x00]);
    }
}
