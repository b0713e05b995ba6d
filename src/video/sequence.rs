//! Sequence-level headers of an MPEG-2 video elementary stream.

use std::io::Read;

use crate::errors::DemuxError;
use crate::io::bits::BitReader;
use crate::io::read_array;
use crate::video::SEQUENCE_HEADER_CODE;

/// The 12-byte sequence header, plus its optional quantiser matrices.
///
/// The matrices follow the `constrained_parameters_flag` with a one-bit
/// offset from the byte boundary, so the whole header is read through
/// the bit reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    /// Low 12 bits of the frame width.
    pub horizontal_size_value: u16,
    /// Low 12 bits of the frame height.
    pub vertical_size_value: u16,
    /// 4-bit aspect ratio code.
    pub aspect_ratio_information: u8,
    /// 4-bit frame rate code.
    pub frame_rate_code: u8,
    /// Low 18 bits of the bit rate, in units of 400 bit/s.
    pub bit_rate_value: u32,
    /// Low 10 bits of the VBV buffer size, in units of 16 KiB.
    pub vbv_buffer_size_value: u16,
    /// MPEG-1 constrained parameters flag, always 0 in MPEG-2.
    pub constrained_parameters_flag: bool,
    /// Intra quantiser matrix, when the stream replaces the default.
    pub intra_quantiser_matrix: Option<[u8; 64]>,
    /// Non-intra quantiser matrix, when the stream replaces the
    /// default.
    pub non_intra_quantiser_matrix: Option<[u8; 64]>,
}

fn read_matrix<R: Read>(bits: &mut BitReader<'_, R>) -> Result<[u8; 64], DemuxError> {
    let mut matrix = [0u8; 64];
    for value in &mut matrix {
        *value = bits.read(8)? as u8;
    }
    Ok(matrix)
}

impl SequenceHeader {
    /// Parse the header, reader positioned at its start code.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let code: [u8; 4] = read_array(reader)?;
        if code != SEQUENCE_HEADER_CODE {
            return Err(DemuxError::InvalidFixedBits("sequence header code"));
        }

        let mut bits = BitReader::new(reader);
        let horizontal_size_value = bits.read(12)? as u16;
        let vertical_size_value = bits.read(12)? as u16;
        let aspect_ratio_information = bits.read(4)? as u8;
        let frame_rate_code = bits.read(4)? as u8;
        let bit_rate_value = bits.read(18)?;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("sequence header"));
        }
        let vbv_buffer_size_value = bits.read(10)? as u16;
        let constrained_parameters_flag = bits.read_flag()?;

        let intra_quantiser_matrix = if bits.read_flag()? {
            Some(read_matrix(&mut bits)?)
        } else {
            None
        };
        let non_intra_quantiser_matrix = if bits.read_flag()? {
            Some(read_matrix(&mut bits)?)
        } else {
            None
        };

        Ok(Self {
            horizontal_size_value,
            vertical_size_value,
            aspect_ratio_information,
            frame_rate_code,
            bit_rate_value,
            vbv_buffer_size_value,
            constrained_parameters_flag,
            intra_quantiser_matrix,
            non_intra_quantiser_matrix,
        })
    }

    /// Human-readable aspect ratio.
    #[must_use]
    pub const fn aspect_ratio_str(&self) -> &'static str {
        match self.aspect_ratio_information {
            0b0001 => "1:1",
            0b0010 => "4:3",
            0b0011 => "16:9",
            0b0100 => "2.21:1",
            0b0000 => "forbidden",
            _ => "reserved",
        }
    }

    /// Human-readable frame rate.
    #[must_use]
    pub const fn frame_rate_str(&self) -> &'static str {
        match self.frame_rate_code {
            0b0001 => "23.976",
            0b0010 => "24",
            0b0011 => "25",
            0b0100 => "29.97",
            0b0101 => "30",
            0b0110 => "50",
            0b0111 => "59.94",
            0b1000 => "60",
            0b0000 => "forbidden",
            _ => "reserved",
        }
    }
}

/// The sequence extension that must follow every MPEG-2 sequence
/// header. Its absence marks an MPEG-1 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceExtension {
    /// Profile and level indication byte.
    pub profile_and_level_indication: u8,
    /// Set when the sequence contains only progressive frames.
    pub progressive_sequence: bool,
    /// 2-bit chroma format code.
    pub chroma_format: u8,
    /// High 2 bits of the frame width.
    pub horizontal_size_extension: u8,
    /// High 2 bits of the frame height.
    pub vertical_size_extension: u8,
    /// High 12 bits of the bit rate.
    pub bit_rate_extension: u16,
    /// High 8 bits of the VBV buffer size.
    pub vbv_buffer_size_extension: u8,
    /// Set when the stream carries no B pictures.
    pub low_delay: bool,
    /// Frame rate multiplier numerator minus one.
    pub frame_rate_extension_n: u8,
    /// Frame rate multiplier denominator minus one.
    pub frame_rate_extension_d: u8,
}

/// Extension start code identifier of a sequence extension.
const SEQUENCE_EXTENSION_ID: u32 = 0b0001;

impl SequenceExtension {
    /// Parse the extension body, reader positioned just after the
    /// extension start code.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        if bits.read(4)? != SEQUENCE_EXTENSION_ID {
            return Err(DemuxError::InvalidFixedBits("sequence extension identifier"));
        }
        let profile_and_level_indication = bits.read(8)? as u8;
        let progressive_sequence = bits.read_flag()?;
        let chroma_format = bits.read(2)? as u8;
        let horizontal_size_extension = bits.read(2)? as u8;
        let vertical_size_extension = bits.read(2)? as u8;
        let bit_rate_extension = bits.read(12)? as u16;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("sequence extension"));
        }
        let vbv_buffer_size_extension = bits.read(8)? as u8;
        let low_delay = bits.read_flag()?;
        let frame_rate_extension_n = bits.read(2)? as u8;
        let frame_rate_extension_d = bits.read(5)? as u8;

        Ok(Self {
            profile_and_level_indication,
            progressive_sequence,
            chroma_format,
            horizontal_size_extension,
            vertical_size_extension,
            bit_rate_extension,
            vbv_buffer_size_extension,
            low_delay,
            frame_rate_extension_n,
            frame_rate_extension_d,
        })
    }

    /// Human-readable chroma format.
    #[must_use]
    pub const fn chroma_format_str(&self) -> &'static str {
        match self.chroma_format {
            0b01 => "4:2:0",
            0b10 => "4:2:2",
            0b11 => "4:4:4",
            _ => "reserved",
        }
    }
}
