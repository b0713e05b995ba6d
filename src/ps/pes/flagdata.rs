//! The optional `PES` header: a 3-byte flag prefix announcing which
//! sub-sections follow, the sub-sections themselves, and `0xFF` stuffing
//! up to `PES_header_data_length`.

use nom::{bits::complete::take, IResult, Parser as _};
use std::io::Read;

use super::extension::PesExtension;
use super::ptsdts::PtsDts;
use super::trick::TrickMode;
use crate::errors::DemuxError;
use crate::io::{read_array, read_vec};
use crate::ps::clock::{scr_and_ext, BitInput, Scr};
use crate::ps::{bool_flag, check_markers, parse_bits, split_checked};

/// The parsed optional `PES` header.
///
/// Scrambled payload is not deciphered; `scrambling_control` is exposed
/// as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagData {
    /// Payload scrambling mode, `00` meaning not scrambled.
    pub scrambling_control: u8,
    /// Transport priority of this packet.
    pub priority: bool,
    /// Set when the payload begins with an access-point boundary.
    pub data_alignment_indicator: bool,
    /// Copyright protection of the payload.
    pub copyright: bool,
    /// Original (set) or copy (clear).
    pub original_or_copy: bool,
    /// Presentation / decoding timestamps.
    pub pts_dts: Option<PtsDts>,
    /// Elementary stream clock reference.
    pub escr: Option<Scr>,
    /// Elementary stream rate, in units of 50 bytes/s.
    pub es_rate: Option<u32>,
    /// DSM trick-mode control.
    pub trick_mode: Option<TrickMode>,
    /// Additional copy info bits.
    pub additional_copy_info: Option<u8>,
    /// CRC of the previous PES packet.
    pub previous_packet_crc: Option<u16>,
    /// The extension block.
    pub extension: Option<PesExtension>,
    /// `PES_header_data_length`: bytes of sub-sections plus stuffing.
    pub header_data_length: u8,
}

struct FlagBits {
    fixed: u8,
    scrambling_control: u8,
    priority: bool,
    data_alignment_indicator: bool,
    copyright: bool,
    original_or_copy: bool,
    pts_dts_flags: u8,
    escr_flag: bool,
    es_rate_flag: bool,
    dsm_trick_mode_flag: bool,
    additional_copy_info_flag: bool,
    crc_flag: bool,
    extension_flag: bool,
}

fn flag_bits(input: BitInput) -> IResult<BitInput, FlagBits> {
    let (input, (fixed, scrambling_control, priority, data_alignment_indicator, copyright, original_or_copy)): (
        _,
        (u8, u8, _, _, _, _),
    ) = (
        take(2usize),
        take(2usize),
        bool_flag,
        bool_flag,
        bool_flag,
        bool_flag,
    )
        .parse(input)?;
    let (
        input,
        (
            pts_dts_flags,
            escr_flag,
            es_rate_flag,
            dsm_trick_mode_flag,
            additional_copy_info_flag,
            crc_flag,
            extension_flag,
        ),
    ): (_, (u8, _, _, _, _, _, _)) = (
        take(2usize),
        bool_flag,
        bool_flag,
        bool_flag,
        bool_flag,
        bool_flag,
        bool_flag,
    )
        .parse(input)?;
    Ok((
        input,
        FlagBits {
            fixed,
            scrambling_control,
            priority,
            data_alignment_indicator,
            copyright,
            original_or_copy,
            pts_dts_flags,
            escr_flag,
            es_rate_flag,
            dsm_trick_mode_flag,
            additional_copy_info_flag,
            crc_flag,
            extension_flag,
        },
    ))
}

/// 2 reserved bits, then an `SCR`-shaped 46-bit clock block.
fn escr_bits(input: BitInput) -> IResult<BitInput, (Scr, [u8; 4])> {
    let (input, (_reserved, parsed)): (_, (u8, _)) =
        (take(2usize), scr_and_ext).parse(input)?;
    Ok((input, parsed))
}

fn es_rate_bits(input: BitInput) -> IResult<BitInput, (u8, u32, u8)> {
    let (input, (marker_0, rate, marker_1)): (_, (u8, u32, u8)) =
        (take(1usize), take(22usize), take(1usize)).parse(input)?;
    Ok((input, (marker_0, rate, marker_1)))
}

fn copy_info_bits(input: BitInput) -> IResult<BitInput, (u8, u8)> {
    let (input, (marker_0, info)): (_, (u8, u8)) =
        (take(1usize), take(7usize)).parse(input)?;
    Ok((input, (marker_0, info)))
}

fn parse_escr(input: &[u8]) -> Result<(&[u8], Scr), DemuxError> {
    let (rest, (escr, markers)) = parse_bits(input, "ESCR", escr_bits)?;
    check_markers(&markers, "ESCR")?;
    Ok((rest, escr))
}

fn parse_es_rate(input: &[u8]) -> Result<(&[u8], u32), DemuxError> {
    let (rest, (marker_0, rate, marker_1)) = parse_bits(input, "ES rate", es_rate_bits)?;
    check_markers(&[marker_0, marker_1], "ES rate")?;
    Ok((rest, rate))
}

fn parse_copy_info(input: &[u8]) -> Result<(&[u8], u8), DemuxError> {
    let (rest, (marker_0, info)) = parse_bits(input, "additional copy info", copy_info_bits)?;
    check_markers(&[marker_0], "additional copy info")?;
    Ok((rest, info))
}

fn parse_crc(input: &[u8]) -> Result<(&[u8], u16), DemuxError> {
    let (head, rest) = split_checked(input, 2, "PES CRC")?;
    Ok((rest, u16::from_be_bytes([head[0], head[1]])))
}

impl FlagData {
    /// Bytes this header occupies after the 6-byte packet prefix.
    #[must_use]
    pub const fn len(&self) -> u64 {
        3 + self.header_data_length as u64
    }

    /// Whether the header is the minimal 3-byte form.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.header_data_length == 0
    }

    /// Read and parse the optional `PES` header from `reader`.
    ///
    /// # Errors
    /// `InvalidFixedBits` on a bad `10` prefix, the forbidden
    /// `PTS_DTS_flags` value `01`, or non-`0xFF` stuffing;
    /// `InvalidMarker` on any cleared marker bit; `UnsupportedFormat` on
    /// a pack header field inside the extension; `Io` on short reads.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let prefix: [u8; 3] = read_array(reader)?;
        let (_, flags) = parse_bits(&prefix, "PES flag bytes", flag_bits)?;

        if flags.fixed != 0b10 {
            return Err(DemuxError::InvalidFixedBits("PES flag prefix"));
        }
        if flags.pts_dts_flags == 0b01 {
            return Err(DemuxError::InvalidFixedBits("PTS_DTS_flags"));
        }

        let header_data_length = prefix[2];
        let data = read_vec(reader, usize::from(header_data_length))?;
        let mut input: &[u8] = &data;

        let pts_dts = match flags.pts_dts_flags {
            0b10 => {
                let (rest, parsed) = PtsDts::parse_pts(input)?;
                input = rest;
                Some(parsed)
            }
            0b11 => {
                let (rest, parsed) = PtsDts::parse_pts_dts(input)?;
                input = rest;
                Some(parsed)
            }
            _ => None,
        };

        let escr = if flags.escr_flag {
            let (rest, parsed) = parse_escr(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        let es_rate = if flags.es_rate_flag {
            let (rest, parsed) = parse_es_rate(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        let trick_mode = if flags.dsm_trick_mode_flag {
            let (rest, parsed) = TrickMode::parse(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        let additional_copy_info = if flags.additional_copy_info_flag {
            let (rest, parsed) = parse_copy_info(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        let previous_packet_crc = if flags.crc_flag {
            let (rest, parsed) = parse_crc(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        let extension = if flags.extension_flag {
            let (rest, parsed) = PesExtension::parse(input)?;
            input = rest;
            Some(parsed)
        } else {
            None
        };

        // Whatever the sub-sections did not consume must be stuffing.
        if !input.iter().all(|&byte| byte == 0xFF) {
            return Err(DemuxError::InvalidFixedBits("PES header stuffing"));
        }

        Ok(Self {
            scrambling_control: flags.scrambling_control,
            priority: flags.priority,
            data_alignment_indicator: flags.data_alignment_indicator,
            copyright: flags.copyright,
            original_or_copy: flags.original_or_copy,
            pts_dts,
            escr,
            es_rate,
            trick_mode,
            additional_copy_info,
            previous_packet_crc,
            extension,
            header_data_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::clock::Timestamp;
    use std::io::Cursor;

    #[test]
    fn parse_minimal_header() {
        let mut reader = Cursor::new(vec![0x80, 0x00, 0x00]);
        let parsed = FlagData::read_from(&mut reader).unwrap();
        assert_eq!(parsed.header_data_length, 0);
        assert_eq!(parsed.len(), 3);
        assert!(parsed.pts_dts.is_none());
    }

    #[test]
    fn parse_pts_only_header() {
        let mut reader = Cursor::new(vec![0x80, 0x80, 0x05, 0x21, 0x00, 0x01, 0x00, 0x01]);
        let parsed = FlagData::read_from(&mut reader).unwrap();
        let pts_dts = parsed.pts_dts.unwrap();
        assert_eq!(pts_dts.pts, Timestamp::new(0));
        assert_eq!(pts_dts.dts, None);
        assert_eq!(parsed.len(), 8);
    }

    #[test]
    fn stuffing_after_sections_is_checked() {
        let mut reader = Cursor::new(vec![
            0x80, 0x80, 0x08, 0x21, 0x00, 0x01, 0x00, 0x01, 0xFF, 0xFF, 0xFF,
        ]);
        let parsed = FlagData::read_from(&mut reader).unwrap();
        assert_eq!(parsed.header_data_length, 8);

        let mut reader = Cursor::new(vec![
            0x80, 0x80, 0x08, 0x21, 0x00, 0x01, 0x00, 0x01, 0xFF, 0x00, 0xFF,
        ]);
        assert!(matches!(
            FlagData::read_from(&mut reader),
            Err(DemuxError::InvalidFixedBits("PES header stuffing"))
        ));
    }

    #[test]
    fn forbidden_pts_dts_flags_value() {
        // PTS_DTS_flags == 0b01 is forbidden by the standard.
        let mut reader = Cursor::new(vec![0x80, 0x40, 0x00]);
        assert!(matches!(
            FlagData::read_from(&mut reader),
            Err(DemuxError::InvalidFixedBits("PTS_DTS_flags"))
        ));
    }

    #[test]
    fn bad_flag_prefix() {
        let mut reader = Cursor::new(vec![0x40, 0x00, 0x00]);
        assert!(matches!(
            FlagData::read_from(&mut reader),
            Err(DemuxError::InvalidFixedBits("PES flag prefix"))
        ));
    }

    #[test]
    fn parse_escr_and_es_rate() {
        // ESCR: reserved 00, base 0 with markers, extension 0, marker.
        // Bits: 00 000 1 000000000000000 1 000000000000000 1 000000000 1
        let escr = [0x04, 0x00, 0x04, 0x00, 0x04, 0x01];
        // ES rate: marker, 22-bit rate 0x12345, marker.
        let es_rate = [0x82, 0x46, 0x8B];
        let mut data = vec![0x80, 0b0011_0000, 0x09];
        data.extend_from_slice(&escr);
        data.extend_from_slice(&es_rate);
        let mut reader = Cursor::new(data);
        let parsed = FlagData::read_from(&mut reader).unwrap();
        assert_eq!(parsed.escr.unwrap().value(), 0);
        assert_eq!(parsed.es_rate, Some(0x12345));
    }
}
