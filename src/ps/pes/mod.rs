//! # MPEG-2 Packetized Elementary Streams (`PES`)
//!
//! `PES` packets are nested inside the packs of a Program Stream. Only
//! their headers are parsed here: payload bytes stay on disk, located by
//! the offset and length recorded per packet, and are read later through
//! a [`crate::io::segment::SegmentedReader`].
//!
//! [pes]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

pub mod extension;
pub mod flagdata;
pub mod ptsdts;
pub mod trick;

use log::trace;
use std::io::{Read, Seek};

use self::flagdata::FlagData;
use crate::errors::DemuxError;
use crate::io::{peek, read_array, skip, START_CODE_PREFIX};
use crate::ps::stream_id::{
    stream_name, DSMCC_STREAM, ECM_STREAM, EMM_STREAM, H222_1_TYPE_E, PADDING_STREAM,
    PRIVATE_STREAM_1, PRIVATE_STREAM_2, PROGRAM_STREAM_DIRECTORY, PROGRAM_STREAM_MAP,
};

/// Stream ids whose PES packets carry no optional header: the packet
/// body is treated as opaque payload.
fn is_opaque(stream_id: u8) -> bool {
    matches!(
        stream_id,
        PROGRAM_STREAM_MAP
            | PRIVATE_STREAM_2
            | ECM_STREAM
            | EMM_STREAM
            | PROGRAM_STREAM_DIRECTORY
            | DSMCC_STREAM
            | H222_1_TYPE_E
    )
}

/// One indexed `PES` packet.
///
/// Everything here is fixed-size header data; the payload is described
/// by [`PesPacket::payload_offset`] and [`PesPacket::payload_length`]
/// but never loaded during indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    /// Absolute file offset of the packet start code.
    pub offset: u64,
    /// The stream this packet belongs to.
    pub stream_id: u8,
    /// `PES_packet_length`: bytes following the length field.
    pub pes_packet_length: u16,
    /// Bytes from the packet start to the payload.
    pub header_length: u64,
    /// Payload bytes following the header.
    pub payload_length: u64,
    /// First payload byte, recorded for `private_stream_1` packets.
    pub substream_id: Option<u8>,
    /// The optional header, absent for opaque and padding streams.
    pub flag_data: Option<FlagData>,
}

impl PesPacket {
    /// Parse one packet header, leaving the reader positioned after the
    /// packet.
    pub(crate) fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        let offset = reader.stream_position()?;
        let head: [u8; 6] = read_array(reader)?;
        if head[0..3] != START_CODE_PREFIX {
            return Err(DemuxError::InvalidFixedBits("PES start code prefix"));
        }
        let stream_id = head[3];
        let pes_packet_length = u16::from_be_bytes([head[4], head[5]]);

        if stream_id < PROGRAM_STREAM_MAP {
            return Err(DemuxError::UnsupportedFormat(
                "stream_id outside the PES id space",
            ));
        }

        if is_opaque(stream_id) || stream_id == PADDING_STREAM {
            skip(reader, u64::from(pes_packet_length))?;
            let packet = Self {
                offset,
                stream_id,
                pes_packet_length,
                header_length: 6,
                payload_length: u64::from(pes_packet_length),
                substream_id: None,
                flag_data: None,
            };
            trace!("indexed opaque PES packet {packet:?}");
            return Ok(packet);
        }

        let flag_data = FlagData::read_from(reader)?;
        let header_bytes = flag_data.len();
        let payload_length = u64::from(pes_packet_length)
            .checked_sub(header_bytes)
            .ok_or(DemuxError::InvalidFixedBits("PES packet length"))?;

        let substream_id = if stream_id == PRIVATE_STREAM_1 && payload_length > 0 {
            let next: [u8; 1] = peek(reader)?;
            Some(next[0])
        } else {
            None
        };

        skip(reader, payload_length)?;

        let packet = Self {
            offset,
            stream_id,
            pes_packet_length,
            header_length: 6 + header_bytes,
            payload_length,
            substream_id,
            flag_data: Some(flag_data),
        };
        trace!("indexed PES packet {packet:?}");
        Ok(packet)
    }

    /// Total packet size on disk, start code included.
    #[must_use]
    pub const fn full_packet_length(&self) -> u64 {
        6 + self.pes_packet_length as u64
    }

    /// Absolute file offset of the first payload byte.
    #[must_use]
    pub const fn payload_offset(&self) -> u64 {
        self.offset + self.header_length
    }

    /// The symbolic name of this packet's stream id, when it has one.
    #[must_use]
    pub fn stream_name(&self) -> Option<String> {
        stream_name(self.stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::pes::ptsdts::PtsDts;
    use crate::ps::clock::Timestamp;
    use std::io::Cursor;

    #[test]
    fn parse_pts_only_video_packet() {
        // stream 0xE0, length 8: flag bytes + 5 PTS bytes, no payload.
        let data = vec![
            0x00, 0x00, 0x01, 0xE0, 0x00, 0x08, 0x80, 0x80, 0x05, 0x21, 0x00, 0x01, 0x00, 0x01,
        ];
        let mut reader = Cursor::new(data);
        let packet = PesPacket::parse(&mut reader).unwrap();
        assert_eq!(packet.stream_id, 0xE0);
        assert_eq!(packet.pes_packet_length, 8);
        assert_eq!(packet.header_length, 14);
        assert_eq!(packet.payload_length, 0);
        assert_eq!(
            packet.flag_data.unwrap().pts_dts,
            Some(PtsDts {
                pts: Timestamp::new(0),
                dts: None,
            })
        );
    }

    #[test]
    fn parse_padding_packet() {
        let mut data = vec![0x00, 0x00, 0x01, 0xBE, 0x00, 0x10];
        data.extend_from_slice(&[0xFF; 16]);
        let mut reader = Cursor::new(data);
        let packet = PesPacket::parse(&mut reader).unwrap();
        assert_eq!(packet.stream_id, 0xBE);
        assert_eq!(packet.header_length, 6);
        assert_eq!(packet.payload_length, 16);
        assert!(packet.flag_data.is_none());
        assert_eq!(reader.position(), 22);
    }

    #[test]
    fn private_stream_records_substream_id() {
        let mut data = vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x07, 0x80, 0x00, 0x00];
        data.extend_from_slice(&[0x80, 0x01, 0x02, 0x03]);
        let mut reader = Cursor::new(data);
        let packet = PesPacket::parse(&mut reader).unwrap();
        assert_eq!(packet.substream_id, Some(0x80));
        assert_eq!(packet.payload_length, 4);
        assert_eq!(packet.payload_offset(), 9);
    }

    #[test]
    fn bad_start_code_prefix() {
        let data = vec![0x00, 0x00, 0x02, 0xE0, 0x00, 0x00];
        let mut reader = Cursor::new(data);
        assert!(matches!(
            PesPacket::parse(&mut reader),
            Err(DemuxError::InvalidFixedBits("PES start code prefix"))
        ));
    }

    #[test]
    fn unknown_stream_id_is_unsupported() {
        let data = vec![0x00, 0x00, 0x01, 0x42, 0x00, 0x00];
        let mut reader = Cursor::new(data);
        assert!(matches!(
            PesPacket::parse(&mut reader),
            Err(DemuxError::UnsupportedFormat(_))
        ));
    }
}
