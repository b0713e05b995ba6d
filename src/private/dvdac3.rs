//! DVD AC-3 audio carried in `private_stream_1` packets.
//!
//! DVDs wrap each run of AC-3 frames in a 4-byte private header:
//! substream number, frame count, and a pointer to the first access
//! unit. The AC-3 payload proper follows it.

use log::debug;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use crate::errors::DemuxError;
use crate::io::segment::{Segment, SegmentedReader};
use crate::io::{peek, read_array};
use crate::ps::pes::PesPacket;
use crate::ps::stream_id::PRIVATE_STREAM_1;
use crate::ps::ProgramStream;

/// Length of the private header preceding the AC-3 frames.
pub const AC3_HEADER_LENGTH: u64 = 4;
/// Substream number DVDs assign to the first AC-3 track.
pub const AC3_SUBSTREAM_NUMBER: u8 = 0x80;
/// The AC-3 sync word opening every frame.
pub const AC3_SYNC_WORD: [u8; 2] = [0x0B, 0x77];

/// `PES` header length of every DVD AC-3 packet.
const AC3_PES_HEADER_LENGTH: u64 = 0x11;

/// The parsed private header of one DVD AC-3 `PES` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvdAc3Audio {
    /// Substream number, `0x80` for the first AC-3 track.
    pub substream_number: u8,
    /// AC-3 frames starting in this packet.
    pub audio_frame_count: u8,
    /// Offset of the first access unit within the packet.
    pub first_access_unit_pointer: u16,
    /// AC-3 payload bytes in this packet.
    pub data_length: u64,
}

impl DvdAc3Audio {
    /// Probe one `private_stream_1` packet for DVD AC-3 content. The
    /// sync word is only required on the first packet of a stream; the
    /// reader position is restored either way.
    ///
    /// # Errors
    /// `WrongPrivateStream` when the packet does not look like DVD
    /// AC-3; `Io` when the probe reads fail.
    pub fn probe<R: Read + Seek>(
        packet: &PesPacket,
        reader: &mut R,
        is_first: bool,
    ) -> Result<Self, DemuxError> {
        if packet.stream_id != PRIVATE_STREAM_1
            || packet.header_length != AC3_PES_HEADER_LENGTH
            || packet.payload_length < AC3_HEADER_LENGTH + 2
        {
            return Err(DemuxError::WrongPrivateStream);
        }

        let saved = reader.stream_position()?;
        let result = Self::probe_at(packet, reader, is_first);
        reader.seek(SeekFrom::Start(saved))?;
        result
    }

    fn probe_at<R: Read + Seek>(
        packet: &PesPacket,
        reader: &mut R,
        is_first: bool,
    ) -> Result<Self, DemuxError> {
        reader.seek(SeekFrom::Start(packet.payload_offset()))?;
        let header: [u8; 4] = read_array(reader)?;
        let sync: [u8; 2] = peek(reader)?;

        if header[0] != AC3_SUBSTREAM_NUMBER || (is_first && sync != AC3_SYNC_WORD) {
            debug!(
                "not DVD AC-3: substream 0x{:02X}, sync {:02X} {:02X}",
                header[0], sync[0], sync[1]
            );
            return Err(DemuxError::WrongPrivateStream);
        }

        Ok(Self {
            substream_number: header[0],
            audio_frame_count: header[1],
            first_access_unit_pointer: u16::from_be_bytes([header[2], header[3]]),
            data_length: packet.payload_length - AC3_HEADER_LENGTH,
        })
    }
}

impl fmt::Display for DvdAc3Audio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DVD AC-3 audio")
    }
}

/// Build a flat reader over the AC-3 elementary stream: every
/// `private_stream_1` packet is probed and its payload past the private
/// header becomes one segment.
///
/// # Errors
/// `WrongPrivateStream` when any packet fails the probe; otherwise as
/// [`ProgramStream::stream_iter`].
pub fn reader<R: Read + Seek>(
    index: &ProgramStream,
    mut handle: R,
) -> Result<SegmentedReader<R>, DemuxError> {
    let mut segments = Vec::new();
    let mut virtual_start = 0u64;
    for (number, packet) in index.stream_iter("private_stream_1")?.enumerate() {
        let audio = DvdAc3Audio::probe(packet, &mut handle, number == 0)?;
        segments.push(Segment::new(
            packet.payload_offset() + AC3_HEADER_LENGTH,
            virtual_start,
            audio.data_length,
        ));
        virtual_start += audio.data_length;
    }
    Ok(SegmentedReader::new(handle, segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::{ProgramStream, PROGRAM_END_CODE};
    use std::io::Cursor;

    const PACK_HEADER: [u8; 14] = [
        0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8,
    ];

    /// A private_stream_1 PES with header length 0x11 and the given
    /// AC-3 payload (private header included).
    fn ac3_pes(payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBD];
        let length = u16::try_from(3 + 8 + payload.len()).unwrap();
        data.extend_from_slice(&length.to_be_bytes());
        // flags + PTS 0: header data length 8 -> header length 0x11.
        data.extend_from_slice(&[0x81, 0x80, 0x08, 0x21, 0x00, 0x01, 0x00, 0x01, 0xFF, 0xFF, 0xFF]);
        data.extend_from_slice(payload);
        data
    }

    fn ac3_file(payload: &[u8]) -> Vec<u8> {
        let mut data = PACK_HEADER.to_vec();
        data.extend_from_slice(&ac3_pes(payload));
        data.extend_from_slice(&PROGRAM_END_CODE);
        data
    }

    #[test]
    fn probe_accepts_dvd_ac3() {
        let payload = [0x80, 0x01, 0x00, 0x02, 0x0B, 0x77, 0x11, 0x22, 0x33, 0x44];
        let data = ac3_file(&payload);
        let index = ProgramStream::open(&mut Cursor::new(data.clone())).unwrap();
        let packet = index.streams().next().unwrap().1;

        let mut handle = Cursor::new(data);
        let audio = DvdAc3Audio::probe(packet, &mut handle, true).unwrap();
        assert_eq!(audio.substream_number, 0x80);
        assert_eq!(audio.audio_frame_count, 1);
        assert_eq!(audio.first_access_unit_pointer, 2);
        assert_eq!(audio.data_length, packet.payload_length - 4);
        // The probe must not move the handle.
        assert_eq!(handle.position(), 0);
    }

    #[test]
    fn probe_rejects_wrong_substream_or_sync() {
        let no_sync = [0x80, 0x01, 0x00, 0x02, 0x00, 0x00, 0x11, 0x22];
        let data = ac3_file(&no_sync);
        let index = ProgramStream::open(&mut Cursor::new(data.clone())).unwrap();
        let packet = index.streams().next().unwrap().1;
        let mut handle = Cursor::new(data);
        assert!(matches!(
            DvdAc3Audio::probe(packet, &mut handle, true),
            Err(DemuxError::WrongPrivateStream)
        ));
        // Subsequent packets skip the sync word check.
        assert!(DvdAc3Audio::probe(packet, &mut handle, false).is_ok());

        let bad_substream = [0x21, 0x01, 0x00, 0x02, 0x0B, 0x77, 0x11, 0x22];
        let data = ac3_file(&bad_substream);
        let index = ProgramStream::open(&mut Cursor::new(data.clone())).unwrap();
        let packet = index.streams().next().unwrap().1;
        let mut handle = Cursor::new(data);
        assert!(matches!(
            DvdAc3Audio::probe(packet, &mut handle, false),
            Err(DemuxError::WrongPrivateStream)
        ));
    }

    #[test]
    fn reader_strips_the_private_headers() {
        let payload = [0x80, 0x01, 0x00, 0x02, 0x0B, 0x77, 0x11, 0x22, 0x33, 0x44];
        let data = ac3_file(&payload);
        let index = ProgramStream::open(&mut Cursor::new(data.clone())).unwrap();
        let mut stream = reader(&index, Cursor::new(data)).unwrap();
        let mut extracted = Vec::new();
        stream.read_to_end(&mut extracted).unwrap();
        assert_eq!(extracted, &payload[4..]);
    }
}
