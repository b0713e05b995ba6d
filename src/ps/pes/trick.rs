//! DSM trick-mode control byte of a `PES` header.

use nom::{bits::complete::take, IResult, Parser as _};

use crate::errors::DemuxError;
use crate::ps::clock::BitInput;
use crate::ps::parse_bits;

/// The trick-mode control byte: a 3-bit selector over the playback mode,
/// with the lower 5 bits interpreted per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickMode {
    /// Fast forward playback.
    FastForward {
        /// Which field(s) of interlaced material are displayed.
        field_id: u8,
        /// Whether intra slices may be refreshed.
        intra_slice_refresh: bool,
        /// How coefficient data was truncated.
        frequency_truncation: u8,
    },
    /// Slow motion playback.
    SlowMotion {
        /// How often each picture is repeated.
        rep_cntrl: u8,
    },
    /// A frozen picture.
    FreezeFrame {
        /// Which field(s) of interlaced material are displayed.
        field_id: u8,
    },
    /// Fast reverse playback.
    FastReverse {
        /// Which field(s) of interlaced material are displayed.
        field_id: u8,
        /// Whether intra slices may be refreshed.
        intra_slice_refresh: bool,
        /// How coefficient data was truncated.
        frequency_truncation: u8,
    },
    /// Slow reverse playback.
    SlowReverse {
        /// How often each picture is repeated.
        rep_cntrl: u8,
    },
    /// One of the three reserved selector values, payload kept verbatim.
    Reserved {
        /// The untouched lower 5 bits.
        bits: u8,
    },
}

fn trick_bits(input: BitInput) -> IResult<BitInput, (u8, u8)> {
    let (input, (control, payload)): (_, (u8, u8)) =
        (take(3usize), take(5usize)).parse(input)?;
    Ok((input, (control, payload)))
}

impl TrickMode {
    /// Parse the 1-byte trick-mode block.
    pub(crate) fn parse(input: &[u8]) -> Result<(&[u8], Self), DemuxError> {
        let (rest, (control, payload)) = parse_bits(input, "trick mode", trick_bits)?;
        let field_id = (payload >> 3) & 0b11;
        let intra_slice_refresh = payload & 0b100 != 0;
        let frequency_truncation = payload & 0b11;

        let mode = match control {
            0b000 => Self::FastForward {
                field_id,
                intra_slice_refresh,
                frequency_truncation,
            },
            0b001 => Self::SlowMotion {
                rep_cntrl: payload,
            },
            0b010 => Self::FreezeFrame { field_id },
            0b011 => Self::FastReverse {
                field_id,
                intra_slice_refresh,
                frequency_truncation,
            },
            0b100 => Self::SlowReverse {
                rep_cntrl: payload,
            },
            _ => Self::Reserved { bits: payload },
        };
        Ok((rest, mode))
    }
}
