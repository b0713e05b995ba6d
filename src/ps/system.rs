//! The optional system header of a pack: global rate/buffer bounds and
//! one P-STD buffer descriptor per declared stream.

use nom::{bits::complete::take, IResult, Parser as _};
use std::io::{Read, Seek};

use crate::errors::DemuxError;
use crate::io::{peek, read_array};
use crate::ps::clock::BitInput;
use crate::ps::{bool_flag, check_markers, parse_bits, SYSTEM_HEADER_START_CODE};

/// Stream id introducing the 6-byte extended bound descriptor.
const EXTENDED_BOUND_ID: u8 = 0xB7;

/// One P-STD buffer bound descriptor of a system header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamBound {
    /// The 3-byte form, naming a stream id directly.
    Standard {
        /// The described stream.
        stream_id: u8,
        /// Buffer size scale: 1024-byte units when set, 128-byte
        /// otherwise.
        buffer_bound_scale: bool,
        /// Buffer size bound in `buffer_bound_scale` units.
        buffer_size_bound: u16,
    },
    /// The 6-byte form (id `0xB7`), naming a stream id extension.
    Extended {
        /// The described extended stream.
        stream_id_extension: u8,
        /// Buffer size scale: 1024-byte units when set, 128-byte
        /// otherwise.
        buffer_bound_scale: bool,
        /// Buffer size bound in `buffer_bound_scale` units.
        buffer_size_bound: u16,
    },
}

/// The parsed system header of a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHeader {
    /// Absolute file offset of the header start code.
    pub offset: u64,
    /// `header_length`: bytes following the length field.
    pub header_length: u16,
    /// Upper bound of the program mux rate, in units of 50 bytes/s.
    pub rate_bound: u32,
    /// Upper bound of concurrently decoded audio streams.
    pub audio_bound: u8,
    /// Set when the bitrate is constant.
    pub fixed_flag: bool,
    /// Set when the stream meets the constrained system parameters.
    pub csps_flag: bool,
    /// Audio sampling locked to the system clock.
    pub system_audio_lock_flag: bool,
    /// Video frame rate locked to the system clock.
    pub system_video_lock_flag: bool,
    /// Upper bound of concurrently decoded video streams.
    pub video_bound: u8,
    /// Restriction on low packet rates.
    pub packet_rate_restriction_flag: bool,
    /// Per-stream buffer bounds, in file order.
    pub streams: Vec<StreamBound>,
}

struct SystemBits {
    header_length: u16,
    marker_0: u8,
    rate_bound: u32,
    marker_1: u8,
    audio_bound: u8,
    fixed_flag: bool,
    csps_flag: bool,
    system_audio_lock_flag: bool,
    system_video_lock_flag: bool,
    marker_2: u8,
    video_bound: u8,
    packet_rate_restriction_flag: bool,
}

fn system_bits(input: BitInput) -> IResult<BitInput, SystemBits> {
    let (input, (header_length, marker_0, rate_bound, marker_1)): (_, (u16, u8, u32, u8)) = (
        take(16usize),
        take(1usize),
        take(22usize),
        take(1usize),
    )
        .parse(input)?;
    let (input, (audio_bound, fixed_flag, csps_flag)): (_, (u8, _, _)) =
        (take(6usize), bool_flag, bool_flag).parse(input)?;
    let (input, (system_audio_lock_flag, system_video_lock_flag, marker_2, video_bound)): (
        _,
        (_, _, u8, u8),
    ) = (bool_flag, bool_flag, take(1usize), take(5usize)).parse(input)?;
    let (input, (packet_rate_restriction_flag, _reserved)): (_, (_, u8)) =
        (bool_flag, take(7usize)).parse(input)?;
    Ok((
        input,
        SystemBits {
            header_length,
            marker_0,
            rate_bound,
            marker_1,
            audio_bound,
            fixed_flag,
            csps_flag,
            system_audio_lock_flag,
            system_video_lock_flag,
            marker_2,
            video_bound,
            packet_rate_restriction_flag,
        },
    ))
}

fn standard_bound_bits(input: BitInput) -> IResult<BitInput, (u8, u8, bool, u16)> {
    let (input, (stream_id, fixed, scale, size)): (_, (u8, u8, _, u16)) = (
        take(8usize),
        take(2usize),
        bool_flag,
        take(13usize),
    )
        .parse(input)?;
    Ok((input, (stream_id, fixed, scale, size)))
}

struct ExtendedBoundBits {
    fixed_11_0: u8,
    zeros: u8,
    stream_id_extension: u8,
    fixed_b6: u8,
    fixed_11_1: u8,
    scale: bool,
    size: u16,
}

fn extended_bound_bits(input: BitInput) -> IResult<BitInput, ExtendedBoundBits> {
    let (input, (_stream_id, fixed_11_0, zeros, stream_id_extension)): (_, (u8, u8, u8, u8)) = (
        take(8usize),
        take(2usize),
        take(7usize),
        take(7usize),
    )
        .parse(input)?;
    let (input, (fixed_b6, fixed_11_1, scale, size)): (_, (u8, u8, _, u16)) = (
        take(8usize),
        take(2usize),
        bool_flag,
        take(13usize),
    )
        .parse(input)?;
    Ok((
        input,
        ExtendedBoundBits {
            fixed_11_0,
            zeros,
            stream_id_extension,
            fixed_b6,
            fixed_11_1,
            scale,
            size,
        },
    ))
}

fn parse_standard_bound(data: [u8; 3]) -> Result<StreamBound, DemuxError> {
    let (_, (stream_id, fixed, scale, size)) =
        parse_bits(&data, "system header stream bound", standard_bound_bits)?;
    if fixed != 0b11 {
        return Err(DemuxError::InvalidFixedBits("system header stream bound"));
    }
    Ok(StreamBound::Standard {
        stream_id,
        buffer_bound_scale: scale,
        buffer_size_bound: size,
    })
}

fn parse_extended_bound(data: [u8; 6]) -> Result<StreamBound, DemuxError> {
    let (_, bits) = parse_bits(&data, "system header extended bound", extended_bound_bits)?;
    if bits.fixed_11_0 != 0b11
        || bits.zeros != 0
        || bits.fixed_b6 != 0b1011_0110
        || bits.fixed_11_1 != 0b11
    {
        return Err(DemuxError::InvalidFixedBits("system header extended bound"));
    }
    Ok(StreamBound::Extended {
        stream_id_extension: bits.stream_id_extension,
        buffer_bound_scale: bits.scale,
        buffer_size_bound: bits.size,
    })
}

impl SystemHeader {
    /// Parse a system header, reader positioned at its start code.
    pub(crate) fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        let offset = reader.stream_position()?;
        let data: [u8; 12] = read_array(reader)?;
        if data[0..4] != SYSTEM_HEADER_START_CODE {
            return Err(DemuxError::InvalidFixedBits("system header start code"));
        }

        let (_, bits) = parse_bits(&data[4..], "system header", system_bits)?;
        check_markers(
            &[bits.marker_0, bits.marker_1, bits.marker_2],
            "system header",
        )?;

        let mut streams = Vec::new();
        loop {
            let next: [u8; 1] = peek(reader)?;
            if next[0] & 0b1000_0000 == 0 {
                break;
            }
            let bound = if next[0] == EXTENDED_BOUND_ID {
                parse_extended_bound(read_array(reader)?)?
            } else {
                parse_standard_bound(read_array(reader)?)?
            };
            streams.push(bound);
        }

        Ok(Self {
            offset,
            header_length: bits.header_length,
            rate_bound: bits.rate_bound,
            audio_bound: bits.audio_bound,
            fixed_flag: bits.fixed_flag,
            csps_flag: bits.csps_flag,
            system_audio_lock_flag: bits.system_audio_lock_flag,
            system_video_lock_flag: bits.system_video_lock_flag,
            video_bound: bits.video_bound,
            packet_rate_restriction_flag: bits.packet_rate_restriction_flag,
            streams,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // header_length 9, markers set, rate_bound 25200, audio_bound 1,
    // video_bound 1, one standard bound for stream 0xE0.
    fn example_header() -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBB, 0x00, 0x09];
        // 1 0000000110001001110000 1 -> marker, rate 25200, marker
        data.extend_from_slice(&[0x80, 0xC4, 0xE1]);
        // audio_bound 1, fixed 0, csps 0 -> 00000100
        data.push(0b0000_0100);
        // locks 0, marker 1, video_bound 1 -> 00100001
        data.push(0b0010_0001);
        // packet_rate_restriction 0, reserved 1111111
        data.push(0b0111_1111);
        // standard stream bound: 0xE0, 11, scale 1, size 0x123
        data.extend_from_slice(&[0xE0, 0b1110_0001, 0x23]);
        // next byte has a clear top bit, ending the descriptor list
        data.extend_from_slice(&[0x00]);
        data
    }

    #[test]
    fn parse_header_and_bounds() {
        let mut reader = Cursor::new(example_header());
        let header = SystemHeader::parse(&mut reader).unwrap();
        assert_eq!(header.header_length, 9);
        assert_eq!(header.rate_bound, 25_200);
        assert_eq!(header.audio_bound, 1);
        assert_eq!(header.video_bound, 1);
        assert_eq!(
            header.streams,
            vec![StreamBound::Standard {
                stream_id: 0xE0,
                buffer_bound_scale: true,
                buffer_size_bound: 0x123,
            }]
        );
        // The terminating byte is left unconsumed.
        assert_eq!(reader.position(), 15);
    }

    #[test]
    fn cleared_marker_is_rejected() {
        let mut data = example_header();
        data[6] &= 0b0111_1111; // clear marker_0
        let mut reader = Cursor::new(data);
        assert!(matches!(
            SystemHeader::parse(&mut reader),
            Err(DemuxError::InvalidMarker("system header"))
        ));
    }

    #[test]
    fn extended_bound_entry() {
        let mut data = vec![0x00, 0x00, 0x01, 0xBB, 0x00, 0x0C];
        data.extend_from_slice(&[0x80, 0xC4, 0xE1, 0x04, 0x21, 0x7F]);
        // extended: 0xB7, 11 0000000, ext 5, 0xB6, 11, scale 0, size 0x100
        data.extend_from_slice(&[0xB7, 0b1100_0000, 0b0000_0101, 0xB6, 0b1100_0001, 0x00]);
        data.push(0x00);
        let mut reader = Cursor::new(data);
        let header = SystemHeader::parse(&mut reader).unwrap();
        assert_eq!(
            header.streams,
            vec![StreamBound::Extended {
                stream_id_extension: 5,
                buffer_bound_scale: false,
                buffer_size_bound: 0x100,
            }]
        );
    }
}
