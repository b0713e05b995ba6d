//! Bit-granular reads over a byte source.
//!
//! Most headers in a Program Stream are parsed from fixed-size buffers,
//! but the picture header of an MPEG-2 video stream has a trailer whose
//! length is only known bit by bit. [`BitReader`] pulls whole bytes from
//! the underlying reader and hands out 1 to 32 bits at a time, MSB first,
//! across byte boundaries.

use std::io::Read;

use crate::errors::DemuxError;

/// A stateful bit cursor over a byte source. Not thread-safe.
pub struct BitReader<'a, R> {
    reader: &'a mut R,
    /// The most recently fetched byte.
    current: u8,
    /// Bit cursor within `current`, `0..8`. Zero means a fresh byte is
    /// needed.
    position: u8,
    /// In keep mode, every byte fetched from the reader.
    kept: Option<Vec<u8>>,
}

impl<'a, R: Read> BitReader<'a, R> {
    /// Create a bit reader starting at the next byte of `reader`.
    pub fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            current: 0,
            position: 0,
            kept: None,
        }
    }

    /// Like [`BitReader::new`], but every byte fetched from the source is
    /// also accumulated in a side buffer, recoverable with
    /// [`BitReader::into_data`].
    pub fn keeping(reader: &'a mut R) -> Self {
        Self {
            reader,
            current: 0,
            position: 0,
            kept: Some(Vec::new()),
        }
    }

    fn fetch(&mut self) -> Result<u8, DemuxError> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        if let Some(kept) = &mut self.kept {
            kept.push(byte[0]);
        }
        Ok(byte[0])
    }

    /// Read the next `count` bits as an MSB-first unsigned integer.
    ///
    /// # Errors
    /// `InvalidBitCount` unless `1 <= count <= 32`; `Io` if the source
    /// ends mid-read.
    pub fn read(&mut self, count: u32) -> Result<u32, DemuxError> {
        if count == 0 || count > 32 {
            return Err(DemuxError::InvalidBitCount(count));
        }

        let mut value = 0u32;
        let mut left = count;
        while left > 0 {
            if self.position == 0 {
                self.current = self.fetch()?;
            }
            let available = 8 - self.position;
            let take = left.min(u32::from(available)) as u8;
            let shift = available - take;
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = (self.current >> shift) & mask;
            value = (value << take) | u32::from(chunk);
            self.position = (self.position + take) % 8;
            left -= u32::from(take);
        }
        Ok(value)
    }

    /// Read a single bit as a flag.
    ///
    /// # Errors
    /// `Io` if the source ends mid-read.
    pub fn read_flag(&mut self) -> Result<bool, DemuxError> {
        Ok(self.read(1)? == 1)
    }

    /// In keep mode, the bytes fetched so far; `None` otherwise.
    #[must_use]
    pub fn into_data(self) -> Option<Vec<u8>> {
        self.kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_zero_and_oversized_reads() {
        let mut source = Cursor::new(vec![0xFF; 8]);
        let mut reader = BitReader::new(&mut source);
        assert!(matches!(
            reader.read(0),
            Err(DemuxError::InvalidBitCount(0))
        ));
        assert!(matches!(
            reader.read(33),
            Err(DemuxError::InvalidBitCount(33))
        ));
        assert_eq!(reader.read(32).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn reads_cross_byte_boundaries() {
        // 0b10110011_01000111_11110000
        let mut source = Cursor::new(vec![0xB3, 0x47, 0xF0]);
        let mut reader = BitReader::new(&mut source);
        assert_eq!(reader.read(3).unwrap(), 0b101);
        assert_eq!(reader.read(6).unwrap(), 0b100_110);
        assert_eq!(reader.read(1).unwrap(), 0b1);
        assert_eq!(reader.read(14).unwrap(), 0b000_111_1111_0000);
    }

    // Splitting the concatenated bit-string into chunks and interpreting
    // each chunk MSB-first must match sequential reads of those widths.
    #[test]
    fn matches_bit_string_slicing() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x55];
        let bit_string: String = bytes.iter().map(|b| format!("{b:08b}")).collect();

        let widths = [1u32, 7, 3, 13, 2, 32, 5, 8, 1];
        assert_eq!(widths.iter().sum::<u32>() as usize, bit_string.len());

        let mut source = Cursor::new(bytes.to_vec());
        let mut reader = BitReader::new(&mut source);
        let mut cursor = 0usize;
        for width in widths {
            let chunk = &bit_string[cursor..cursor + width as usize];
            let expected = u32::from_str_radix(chunk, 2).unwrap();
            assert_eq!(reader.read(width).unwrap(), expected, "width {width}");
            cursor += width as usize;
        }
    }

    #[test]
    fn keep_mode_recovers_fetched_bytes() {
        let bytes = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let mut source = Cursor::new(bytes.clone());
        let mut reader = BitReader::keeping(&mut source);
        reader.read(5).unwrap();
        reader.read(16).unwrap();
        // 21 bits consumed -> 3 bytes fetched.
        assert_eq!(reader.into_data().unwrap(), &bytes[..3]);
    }

    #[test]
    fn plain_mode_has_no_data() {
        let mut source = Cursor::new(vec![0x00]);
        let mut reader = BitReader::new(&mut source);
        reader.read(8).unwrap();
        assert!(reader.into_data().is_none());
    }
}
