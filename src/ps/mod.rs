//! # MPEG-2 Program Streams (PS)
//!
//! This module reads the container layer of an MPEG-2 Program Stream:
//! the sequence of packs, their optional system headers, and the `PES`
//! packets nested inside them. [`ProgramStream::open`] walks the whole
//! file once, recording fixed-size header data and payload locations;
//! payload bytes are only touched later, through the segmented readers
//! built from the index.
//!
//! Useful references include:
//!
//! - [Program Stream](https://en.wikipedia.org/wiki/MPEG_program_stream) (PS)
//! - [Packetized Elementary Stream][PES] (PES)
//! - [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

pub mod clock;
pub mod pack;
pub mod pes;
pub mod stream_id;
pub mod system;

use log::trace;
use nom::error::Error as NomError;
use nom::{bits::complete::take, combinator::map, IResult, Parser};
use std::io::{Read, Seek};

use self::clock::BitInput;
use self::pack::Pack;
use self::pes::PesPacket;
use self::stream_id::stream_id_by_name;
use crate::errors::DemuxError;
use crate::io::peek;
use crate::io::segment::{Segment, SegmentedReader};

/// Start code of a pack header.
pub const PACK_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xBA];
/// Start code of a system header.
pub const SYSTEM_HEADER_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xBB];
/// The code ending a program stream.
pub const PROGRAM_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB9];

/// Run a bit-level parser over an exact-size header buffer, mapping any
/// nom-level failure to `InvalidFixedBits` with `context`.
pub(crate) fn parse_bits<'a, O, P>(
    input: &'a [u8],
    context: &'static str,
    parser: P,
) -> Result<(&'a [u8], O), DemuxError>
where
    P: Parser<BitInput<'a>, Output = O, Error = NomError<BitInput<'a>>>,
{
    nom::bits::bits::<_, _, NomError<BitInput<'a>>, NomError<&'a [u8]>, _>(parser)(input)
        .map_err(|_| DemuxError::InvalidFixedBits(context))
}

/// Deserialize a single Boolean flag bit.
pub(crate) fn bool_flag(input: BitInput) -> IResult<BitInput, bool> {
    map(take(1usize), |bit: u8| bit == 1).parse(input)
}

/// Require every captured marker bit to be 1.
pub(crate) fn check_markers(markers: &[u8], context: &'static str) -> Result<(), DemuxError> {
    if markers.iter().all(|&marker| marker == 1) {
        Ok(())
    } else {
        Err(DemuxError::InvalidMarker(context))
    }
}

/// Split `input` at `n`, or fail with `InvalidFixedBits` when the header
/// buffer is too short for the announced field.
pub(crate) fn split_checked<'a>(
    input: &'a [u8],
    n: usize,
    context: &'static str,
) -> Result<(&'a [u8], &'a [u8]), DemuxError> {
    input
        .split_at_checked(n)
        .ok_or(DemuxError::InvalidFixedBits(context))
}

/// Select a stream of the index by numeric id or symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSelector<'a> {
    /// A raw stream id.
    Id(u8),
    /// A symbolic name from the stream id table, e.g.
    /// `"video stream number 0"`.
    Name(&'a str),
}

impl From<u8> for StreamSelector<'_> {
    fn from(id: u8) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for StreamSelector<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

/// The in-memory index of a Program Stream file.
///
/// Built once by [`ProgramStream::open`] and immutable afterwards. Holds
/// one record per pack and per `PES` packet; payload stays on disk.
#[derive(Debug)]
pub struct ProgramStream {
    packs: Vec<Pack>,
    /// First-seen `PES` per stream id, as indices into `packs`, in
    /// discovery order.
    first_seen: Vec<(u8, (usize, usize))>,
}

impl ProgramStream {
    /// Walk the file, building the index, until the program end code.
    /// The reader must be positioned at a pack start code.
    ///
    /// # Errors
    /// Any header violation is fatal; see [`DemuxError`]. There is no
    /// resynchronization.
    pub fn open<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        profiling::scope!("ProgramStream open");

        let mut packs: Vec<Pack> = Vec::new();
        let mut first_seen: Vec<(u8, (usize, usize))> = Vec::new();
        loop {
            let pack = Pack::parse(reader)?;
            for (pes_index, packet) in pack.pes_packets.iter().enumerate() {
                if !first_seen.iter().any(|(id, _)| *id == packet.stream_id) {
                    first_seen.push((packet.stream_id, (packs.len(), pes_index)));
                }
            }
            packs.push(pack);

            let next: [u8; 4] = peek(reader)?;
            if next == PROGRAM_END_CODE {
                break;
            }
        }
        trace!(
            "indexed {} packs, {} streams",
            packs.len(),
            first_seen.len()
        );
        Ok(Self { packs, first_seen })
    }

    /// The packs of the file, in order.
    #[must_use]
    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    /// The first `PES` packet seen for each stream id, in discovery
    /// order.
    pub fn streams(&self) -> impl Iterator<Item = (u8, &PesPacket)> + '_ {
        self.first_seen
            .iter()
            .map(|&(id, (pack, pes))| (id, &self.packs[pack].pes_packets[pes]))
    }

    fn resolve(&self, selector: StreamSelector<'_>) -> Result<u8, DemuxError> {
        let id = match selector {
            StreamSelector::Id(id) => id,
            StreamSelector::Name(name) => {
                stream_id_by_name(name).ok_or_else(|| DemuxError::UnknownStream(name.to_owned()))?
            }
        };
        if self.first_seen.iter().any(|&(seen, _)| seen == id) {
            Ok(id)
        } else {
            Err(DemuxError::StreamNotPresent(id))
        }
    }

    /// Every `PES` packet of one stream, in file order.
    ///
    /// # Errors
    /// `UnknownStream` when a name maps to no id, `StreamNotPresent`
    /// when the id never occurred in the file.
    pub fn stream_iter<'a, S>(
        &'a self,
        selector: S,
    ) -> Result<impl Iterator<Item = &'a PesPacket>, DemuxError>
    where
        S: Into<StreamSelector<'a>>,
    {
        let id = self.resolve(selector.into())?;
        Ok(self
            .packs
            .iter()
            .flat_map(|pack| pack.pes_packets.iter())
            .filter(move |packet| packet.stream_id == id))
    }

    /// A flat reader over the payload of one stream, backed by `handle`
    /// (typically a second handle to the indexed file).
    ///
    /// # Errors
    /// Same as [`ProgramStream::stream_iter`].
    pub fn stream_reader<'a, S, R>(
        &'a self,
        selector: S,
        handle: R,
    ) -> Result<SegmentedReader<R>, DemuxError>
    where
        S: Into<StreamSelector<'a>>,
        R: Read + Seek,
    {
        let mut segments = Vec::new();
        let mut virtual_start = 0u64;
        for packet in self.stream_iter(selector)? {
            segments.push(Segment::new(
                packet.payload_offset(),
                virtual_start,
                packet.payload_length,
            ));
            virtual_start += packet.payload_length;
        }
        Ok(SegmentedReader::new(handle, segments))
    }

    /// Total `PES` packet count across all packs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packs.iter().map(Pack::len).sum()
    }

    /// Whether the file contains no `PES` packets at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PACK_HEADER: [u8; 14] = [
        0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8,
    ];

    fn pes_packet(stream_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, stream_id];
        let length = u16::try_from(payload.len() + 3).unwrap();
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&[0x80, 0x00, 0x00]);
        data.extend_from_slice(payload);
        data
    }

    fn two_stream_file() -> Vec<u8> {
        let mut data = PACK_HEADER.to_vec();
        data.extend_from_slice(&pes_packet(0xE0, b"video-1."));
        data.extend_from_slice(&pes_packet(0xC0, b"audio-1."));
        data.extend_from_slice(&PACK_HEADER);
        data.extend_from_slice(&pes_packet(0xE0, b"video-2."));
        data.extend_from_slice(&PROGRAM_END_CODE);
        data
    }

    #[test]
    fn minimal_pack_has_no_streams() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut data = PACK_HEADER.to_vec();
        data.extend_from_slice(&PROGRAM_END_CODE);
        let mut reader = Cursor::new(data);
        let index = ProgramStream::open(&mut reader).unwrap();
        assert_eq!(index.packs().len(), 1);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.packs()[0].scr.value(), 0);
        assert_eq!(index.packs()[0].program_mux_rate_bps(), 10_080_000);
    }

    #[test]
    fn padding_stream_is_indexed_and_readable() {
        let mut data = PACK_HEADER.to_vec();
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xBE, 0x00, 0x10]);
        data.extend_from_slice(&[0xAA; 16]);
        data.extend_from_slice(&PROGRAM_END_CODE);
        let mut reader = Cursor::new(data.clone());
        let index = ProgramStream::open(&mut reader).unwrap();
        assert_eq!(index.len(), 1);

        let packets: Vec<_> = index.stream_iter("padding_stream").unwrap().collect();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].stream_id, 0xBE);
        assert_eq!(packets[0].payload_length, 16);

        let mut stream = index
            .stream_reader("padding_stream", Cursor::new(data))
            .unwrap();
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).unwrap();
        assert_eq!(payload, vec![0xAA; 16]);
    }

    #[test]
    fn streams_are_listed_in_discovery_order() {
        let mut reader = Cursor::new(two_stream_file());
        let index = ProgramStream::open(&mut reader).unwrap();
        let ids: Vec<u8> = index.streams().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0xE0, 0xC0]);
        assert_eq!(index.len(), 3);
    }

    // For every indexed packet, offset + 6 + pes_packet_length lands on
    // the next PES start, the next pack start, or the program end code.
    #[test]
    fn packet_lengths_tile_the_file() {
        let data = two_stream_file();
        let mut reader = Cursor::new(data.clone());
        let index = ProgramStream::open(&mut reader).unwrap();
        for pack in index.packs() {
            for packet in &pack.pes_packets {
                let end = usize::try_from(packet.offset + packet.full_packet_length()).unwrap();
                let next = &data[end..end + 4];
                assert_eq!(&next[..3], &[0x00, 0x00, 0x01]);
                assert!(matches!(next[3], 0xBA | 0xB9 | 0xC0 | 0xE0));
            }
        }
    }

    // Concatenating the payload segments of a stream must yield exactly
    // the bytes at (payload_offset, payload_length) of each packet.
    #[test]
    fn stream_reader_concatenates_payloads() {
        let data = two_stream_file();
        let mut reader = Cursor::new(data.clone());
        let index = ProgramStream::open(&mut reader).unwrap();

        let mut stream = index
            .stream_reader("video stream number 0", Cursor::new(data.clone()))
            .unwrap();
        let mut video = Vec::new();
        stream.read_to_end(&mut video).unwrap();
        assert_eq!(video, b"video-1.video-2.");

        let mut expected = Vec::new();
        for packet in index.stream_iter(0xE0u8).unwrap() {
            let start = usize::try_from(packet.payload_offset()).unwrap();
            let end = start + usize::try_from(packet.payload_length).unwrap();
            expected.extend_from_slice(&data[start..end]);
        }
        assert_eq!(video, expected);
    }

    #[test]
    fn unknown_names_and_absent_ids_are_distinguished() {
        let mut reader = Cursor::new(two_stream_file());
        let index = ProgramStream::open(&mut reader).unwrap();
        assert!(matches!(
            index.stream_iter("zzz").map(|_| ()),
            Err(DemuxError::UnknownStream(_))
        ));
        assert!(matches!(
            index.stream_iter("video stream number 3").map(|_| ()),
            Err(DemuxError::StreamNotPresent(0xE3))
        ));
        assert!(matches!(
            index.stream_iter(0xBDu8).map(|_| ()),
            Err(DemuxError::StreamNotPresent(0xBD))
        ));
    }
}
