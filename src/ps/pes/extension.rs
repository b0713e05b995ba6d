//! The optional extension block of a `PES` header, with its own nested
//! optional sub-fields.

use nom::{bits::complete::take, IResult, Parser as _};

use crate::errors::DemuxError;
use crate::ps::clock::{timestamp, BitInput, Timestamp};
use crate::ps::{bool_flag, check_markers, parse_bits, split_checked};

/// The program packet sequence counter field, 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSequenceCounter {
    /// Counter incremented per PES packet of the program.
    pub counter: u8,
    /// Set when the packet carries MPEG-1 system stream data.
    pub mpeg1_mpeg2_identifier: bool,
    /// Stuffing length used in the original packet.
    pub original_stuff_length: u8,
}

/// The P-STD buffer descriptor, 2 bytes with a fixed `01` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PStdBuffer {
    /// Buffer size scale: 1024-byte units when set, 128-byte otherwise.
    pub scale: bool,
    /// Buffer size bound in `scale` units.
    pub size: u16,
}

/// The second-level extension: either a stream id extension or a
/// reserved form with an optional 40-bit TREF block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension2 {
    /// A 7-bit stream id extension.
    StreamIdExtension(u8),
    /// The reserved form.
    Reserved {
        /// TREF timestamp, present when the tref_extension_flag is 0.
        tref: Option<Timestamp>,
    },
}

/// The extension block of a `PES` header: a flag byte gating four nested
/// optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesExtension {
    /// 16 bytes of private data.
    pub private_data: Option<[u8; 16]>,
    /// Program packet sequence counter.
    pub packet_sequence_counter: Option<PacketSequenceCounter>,
    /// P-STD buffer bound for this stream.
    pub p_std_buffer: Option<PStdBuffer>,
    /// Second-level extension.
    pub extension_2: Option<Extension2>,
}

struct ExtensionFlags {
    private_data: bool,
    pack_header_field: bool,
    packet_sequence_counter: bool,
    p_std_buffer: bool,
    extension_2: bool,
}

fn extension_flag_bits(input: BitInput) -> IResult<BitInput, ExtensionFlags> {
    let (input, (private_data, pack_header_field, packet_sequence_counter, p_std_buffer)) =
        (bool_flag, bool_flag, bool_flag, bool_flag).parse(input)?;
    let (input, (_reserved, extension_2)): (_, (u8, _)) =
        (take(3usize), bool_flag).parse(input)?;
    Ok((
        input,
        ExtensionFlags {
            private_data,
            pack_header_field,
            packet_sequence_counter,
            p_std_buffer,
            extension_2,
        },
    ))
}

fn counter_bits(input: BitInput) -> IResult<BitInput, (u8, u8, u8, bool, u8)> {
    let (input, (marker_0, counter, marker_1, mpeg1_mpeg2_identifier, original_stuff_length)): (
        _,
        (u8, u8, u8, _, u8),
    ) = (
        take(1usize),
        take(7usize),
        take(1usize),
        bool_flag,
        take(6usize),
    )
        .parse(input)?;
    Ok((
        input,
        (
            marker_0,
            counter,
            marker_1,
            mpeg1_mpeg2_identifier,
            original_stuff_length,
        ),
    ))
}

fn p_std_bits(input: BitInput) -> IResult<BitInput, (u8, bool, u16)> {
    let (input, (fixed, scale, size)): (_, (u8, _, u16)) =
        (take(2usize), bool_flag, take(13usize)).parse(input)?;
    Ok((input, (fixed, scale, size)))
}

fn extension_2_bits(input: BitInput) -> IResult<BitInput, (u8, u8, bool, u8)> {
    let (input, (marker_0, field_length, id_extension_flag, low_bits)): (_, (u8, u8, _, u8)) = (
        take(1usize),
        take(7usize),
        bool_flag,
        take(7usize),
    )
        .parse(input)?;
    Ok((input, (marker_0, field_length, id_extension_flag, low_bits)))
}

fn tref_bits(input: BitInput) -> IResult<BitInput, (u8, (Timestamp, [u8; 3]))> {
    let (input, (reserved, stamp)): (_, (u8, _)) = (take(4usize), timestamp).parse(input)?;
    Ok((input, (reserved, stamp)))
}

fn parse_extension_2(input: &[u8]) -> Result<(&[u8], Extension2), DemuxError> {
    let (rest, (marker_0, _field_length, id_extension_flag, low_bits)) =
        parse_bits(input, "PES extension 2", extension_2_bits)?;
    check_markers(&[marker_0], "PES extension 2")?;

    if !id_extension_flag {
        return Ok((rest, Extension2::StreamIdExtension(low_bits)));
    }

    // Reserved form: the low bits hold 6 reserved bits and the
    // tref_extension_flag, which gates a 40-bit TREF block when 0.
    let tref_extension_flag = low_bits & 0b1;
    if tref_extension_flag != 0 {
        return Ok((rest, Extension2::Reserved { tref: None }));
    }

    let (rest, (_reserved, (tref, markers))) = parse_bits(rest, "TREF", tref_bits)?;
    check_markers(&markers, "TREF")?;
    Ok((rest, Extension2::Reserved { tref: Some(tref) }))
}

impl PesExtension {
    /// Parse the extension block announced by the `PES_extension_flag`.
    pub(crate) fn parse(input: &[u8]) -> Result<(&[u8], Self), DemuxError> {
        let (mut rest, flags) = parse_bits(input, "PES extension flags", extension_flag_bits)?;

        if flags.pack_header_field {
            return Err(DemuxError::UnsupportedFormat(
                "pack header field inside a PES extension",
            ));
        }

        let private_data = if flags.private_data {
            let (head, tail) = split_checked(rest, 16, "PES private data")?;
            rest = tail;
            let mut data = [0u8; 16];
            data.copy_from_slice(head);
            Some(data)
        } else {
            None
        };

        let packet_sequence_counter = if flags.packet_sequence_counter {
            let (tail, (marker_0, counter, marker_1, mpeg1_mpeg2_identifier, stuff_length)) =
                parse_bits(rest, "packet sequence counter", counter_bits)?;
            check_markers(&[marker_0, marker_1], "packet sequence counter")?;
            rest = tail;
            Some(PacketSequenceCounter {
                counter,
                mpeg1_mpeg2_identifier,
                original_stuff_length: stuff_length,
            })
        } else {
            None
        };

        let p_std_buffer = if flags.p_std_buffer {
            let (tail, (fixed, scale, size)) = parse_bits(rest, "P-STD buffer", p_std_bits)?;
            if fixed != 0b01 {
                return Err(DemuxError::InvalidFixedBits("P-STD buffer prefix"));
            }
            rest = tail;
            Some(PStdBuffer { scale, size })
        } else {
            None
        };

        let extension_2 = if flags.extension_2 {
            let (tail, parsed) = parse_extension_2(rest)?;
            rest = tail;
            Some(parsed)
        } else {
            None
        };

        Ok((
            rest,
            Self {
                private_data,
                packet_sequence_counter,
                p_std_buffer,
                extension_2,
            },
        ))
    }
}
