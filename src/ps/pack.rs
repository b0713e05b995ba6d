//! The pack layer of a Program Stream: the outermost multiplexing unit.
//!
//! A pack is a 14-byte header (plus stuffing), an optional system
//! header, and the `PES` packets that share its system clock reference.

use log::trace;
use nom::{bits::complete::take, IResult, Parser as _};
use std::fmt;
use std::io::{Read, Seek};

use crate::errors::DemuxError;
use crate::io::{peek, read_array, skip, START_CODE_PREFIX};
use crate::ps::clock::{scr_and_ext, BitInput, Scr};
use crate::ps::pes::PesPacket;
use crate::ps::system::SystemHeader;
use crate::ps::{
    check_markers, parse_bits, PACK_START_CODE, PROGRAM_END_CODE, SYSTEM_HEADER_START_CODE,
};

/// One pack: header fields plus the `PES` packets it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    /// Absolute file offset of the pack start code.
    pub offset: u64,
    /// System clock reference of the pack.
    pub scr: Scr,
    /// `program_mux_rate`, in units of 50 bytes/s.
    pub program_mux_rate: u32,
    /// Stuffing bytes that followed the header.
    pub stuffing_length: u8,
    /// The system header, present in at least the first pack of a
    /// program.
    pub system_header: Option<SystemHeader>,
    /// The contained `PES` packets, in file order.
    pub pes_packets: Vec<PesPacket>,
}

struct PackBits {
    mpeg2_tag: u8,
    scr: Scr,
    scr_markers: [u8; 4],
    program_mux_rate: u32,
    marker_4: u8,
    marker_5: u8,
    stuffing_length: u8,
}

fn pack_bits(input: BitInput) -> IResult<BitInput, PackBits> {
    let (
        input,
        (mpeg2_tag, (scr, scr_markers), program_mux_rate, marker_4, marker_5, _reserved, stuffing_length),
    ): (_, (u8, _, u32, u8, u8, u8, u8)) = (
        take(2usize),
        scr_and_ext,
        take(22usize),
        take(1usize),
        take(1usize),
        take(5usize),
        take(3usize),
    )
        .parse(input)?;
    Ok((
        input,
        PackBits {
            mpeg2_tag,
            scr,
            scr_markers,
            program_mux_rate,
            marker_4,
            marker_5,
            stuffing_length,
        },
    ))
}

impl Pack {
    /// Parse one pack and all the `PES` packets it contains, leaving the
    /// reader positioned at the next pack start or program end code.
    pub(crate) fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        let offset = reader.stream_position()?;
        let data: [u8; 14] = read_array(reader)?;
        if data[0..4] != PACK_START_CODE {
            return Err(DemuxError::InvalidFixedBits("pack start code"));
        }

        let (_, bits) = parse_bits(&data[4..], "pack header", pack_bits)?;
        if bits.mpeg2_tag != 0b01 {
            // MPEG-1 packs carry 0010 here instead.
            return Err(DemuxError::InvalidFixedBits("not an MPEG-2 program stream"));
        }
        let [m0, m1, m2, m3] = bits.scr_markers;
        check_markers(&[m0, m1, m2, m3, bits.marker_4, bits.marker_5], "pack header")?;

        skip(reader, u64::from(bits.stuffing_length))?;

        let next: [u8; 4] = peek(reader)?;
        let system_header = if next == SYSTEM_HEADER_START_CODE {
            Some(SystemHeader::parse(reader)?)
        } else {
            None
        };

        let mut pes_packets = Vec::new();
        loop {
            let next: [u8; 4] = peek(reader)?;
            if next == PACK_START_CODE || next == PROGRAM_END_CODE {
                break;
            }
            if next[0..3] != START_CODE_PREFIX {
                return Err(DemuxError::InvalidFixedBits("pack contents"));
            }
            pes_packets.push(PesPacket::parse(reader)?);
        }

        let pack = Self {
            offset,
            scr: bits.scr,
            program_mux_rate: bits.program_mux_rate,
            stuffing_length: bits.stuffing_length,
            system_header,
            pes_packets,
        };
        trace!("parsed {pack}");
        Ok(pack)
    }

    /// `program_mux_rate` converted to bits per second.
    #[must_use]
    pub const fn program_mux_rate_bps(&self) -> u64 {
        self.program_mux_rate as u64 * 50 * 8
    }

    /// Number of `PES` packets in this pack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pes_packets.len()
    }

    /// Whether the pack contains no `PES` packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pes_packets.is_empty()
    }
}

impl fmt::Display for Pack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[pack @ 0x{:X}, SCR {}, {} kbps, {} PES]",
            self.offset,
            self.scr,
            self.program_mux_rate_bps() / 1024,
            self.pes_packets.len()
        )
    }
}
