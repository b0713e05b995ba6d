//! `PTS` and `DTS` timestamp blocks of a `PES` header.
//!
//! See the [`PES` header documentation][PES] for details.
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

use nom::{bits::complete::take, IResult, Parser as _};

use crate::errors::DemuxError;
use crate::ps::clock::{timestamp, BitInput, Timestamp};
use crate::ps::{check_markers, parse_bits};

/// Presentation and decoding timestamps carried by a `PES` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtsDts {
    /// Presentation Time Stamp.
    pub pts: Timestamp,
    /// Decode Time Stamp, present only in the 10-byte form.
    pub dts: Option<Timestamp>,
}

/// A 4-bit prefix followed by a marker-interleaved 33-bit timestamp, 40
/// bits in total.
fn prefixed_timestamp(input: BitInput) -> IResult<BitInput, (u8, Timestamp, [u8; 3])> {
    let (input, (prefix, (ts, markers))): (_, (u8, _)) =
        (take(4usize), timestamp).parse(input)?;
    Ok((input, (prefix, ts, markers)))
}

impl PtsDts {
    /// Parse the 5-byte PTS-only block, prefix `0010`.
    pub(crate) fn parse_pts(input: &[u8]) -> Result<(&[u8], Self), DemuxError> {
        let (rest, (prefix, pts, markers)) = parse_bits(input, "PTS", prefixed_timestamp)?;
        if prefix != 0b0010 {
            return Err(DemuxError::InvalidFixedBits("PTS prefix"));
        }
        check_markers(&markers, "PTS")?;
        Ok((rest, Self { pts, dts: None }))
    }

    /// Parse the 10-byte PTS+DTS block, prefixes `0011` then `0001`.
    pub(crate) fn parse_pts_dts(input: &[u8]) -> Result<(&[u8], Self), DemuxError> {
        let (rest, (pts_prefix, pts, pts_markers)) =
            parse_bits(input, "PTS", prefixed_timestamp)?;
        if pts_prefix != 0b0011 {
            return Err(DemuxError::InvalidFixedBits("PTS prefix"));
        }
        check_markers(&pts_markers, "PTS")?;

        let (rest, (dts_prefix, dts, dts_markers)) =
            parse_bits(rest, "DTS", prefixed_timestamp)?;
        if dts_prefix != 0b0001 {
            return Err(DemuxError::InvalidFixedBits("DTS prefix"));
        }
        check_markers(&dts_markers, "DTS")?;

        Ok((
            rest,
            Self {
                pts,
                dts: Some(dts),
            },
        ))
    }
}
