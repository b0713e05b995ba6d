//! PS2 PCM audio carried in `private_stream_1` packets.
//!
//! PlayStation 2 titles mux raw PCM (or VAG ADPCM) into the program
//! stream with an `SShd`/`SSbd` sub-header on the first packet and a
//! short continuation header on the rest. Multi-channel PCM is stored
//! as per-channel interleave blocks of `0x200` bytes which have to be
//! re-woven into sample order for WAV output.

use log::warn;
use std::cmp;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use crate::errors::DemuxError;
use crate::io::segment::{Segment, SegmentedReader};
use crate::ps::pes::PesPacket;
use crate::ps::stream_id::PRIVATE_STREAM_1;
use crate::ps::ProgramStream;

/// Byte length of the first packet's header, `SShd`/`SSbd` included.
pub const FULL_HEADER_LENGTH: u64 = 0x3F;
/// Byte length of the continuation header on later packets.
pub const SUB_HEADER_LENGTH: u64 = 0x17;
/// Offset of the header fields relative to the packet length field.
const BLOCK_DATA_START: u64 = 0x06;
/// The only interleave size this recognizer understands.
pub const INTERLEAVE_SIZE: u32 = 0x200;

/// Size of the synthesized RIFF/WAVE header.
const WAV_HEADER_SIZE: u64 = 44;

/// Sample encoding of a PS2 audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioType {
    /// PCM, 16-bit big endian samples.
    Pcm16Be,
    /// PCM, 16-bit little endian samples.
    Pcm16Le,
    /// SPU2-ADPCM (VAG).
    Vag,
}

impl AudioType {
    fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Pcm16Be),
            1 => Some(Self::Pcm16Le),
            2 => Some(Self::Vag),
            _ => None,
        }
    }

    /// Human-readable encoding name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pcm16Be => "PCM 16bit big endian",
            Self::Pcm16Le => "PCM 16bit little endian",
            Self::Vag => "SPU2-ADPCM (VAG)",
        }
    }
}

fn le_u32(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Read up to `buffer.len()` bytes, zero-filling on a short read so the
/// predicate checks below fail instead of erroring on truncated files.
fn read_filled<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), DemuxError> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = reader.read(&mut buffer[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(())
}

/// The parsed sub-header of the first PS2 PCM `PES` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ps2PcmAudio {
    /// Audio type byte of the stream prefix, `0xA0` or `0xA1`.
    pub stream_audio_type: u8,
    /// Stream number within the title.
    pub stream_number: u16,
    /// Sample encoding.
    pub audio_type: AudioType,
    /// Sampling rate in Hz.
    pub sampling_rate: u32,
    /// Channel count.
    pub num_channels: u32,
    /// Per-channel interleave block size, always `0x200` here.
    pub interleave_size: u32,
    /// First block of the loop region.
    pub loop_start_block_address: u32,
    /// Last block of the loop region.
    pub loop_end_block_address: u32,
    /// Total audio payload bytes announced for the whole stream.
    pub total_audio_data_size: u32,
    /// `pes_packet_length` of the probed packet.
    block_size: u16,
}

impl Ps2PcmAudio {
    /// Probe the first `private_stream_1` packet of a stream for the
    /// PS2 PCM layout. The reader position is restored either way.
    ///
    /// # Errors
    /// `WrongPrivateStream` when the packet does not carry the PS2 PCM
    /// sub-header; `Io` when the probe reads fail.
    pub fn probe<R: Read + Seek>(packet: &PesPacket, reader: &mut R) -> Result<Self, DemuxError> {
        if packet.stream_id != PRIVATE_STREAM_1 {
            return Err(DemuxError::WrongPrivateStream);
        }
        let saved = reader.stream_position()?;
        let result = Self::probe_at(packet, reader);
        reader.seek(SeekFrom::Start(saved))?;
        result
    }

    fn probe_at<R: Read + Seek>(packet: &PesPacket, reader: &mut R) -> Result<Self, DemuxError> {
        reader.seek(SeekFrom::Start(packet.offset))?;
        let mut data = [0u8; FULL_HEADER_LENGTH as usize];
        read_filled(reader, &mut data)?;

        let audio_type = AudioType::from_raw(le_u32(&data[0x1F..]));
        let num_channels = le_u32(&data[0x27..]);
        let interleave_size = le_u32(&data[0x2B..]);
        let total_audio_data_size = le_u32(&data[0x3B..]);

        let valid = data[..4] == [0x00, 0x00, 0x01, 0xBD]
            && matches!(data[0x14], 0xA0 | 0xA1)
            && &data[0x17..0x1B] == b"SShd"
            && audio_type.is_some()
            && interleave_size == INTERLEAVE_SIZE
            && &data[0x37..0x3B] == b"SSbd"
            && num_channels > 0
            && total_audio_data_size % (num_channels * INTERLEAVE_SIZE) == 0;
        if !valid {
            return Err(DemuxError::WrongPrivateStream);
        }

        Ok(Self {
            stream_audio_type: data[0x14],
            stream_number: u16::from_be_bytes([data[0x15], data[0x16]]),
            audio_type: audio_type.unwrap_or(AudioType::Pcm16Le),
            sampling_rate: le_u32(&data[0x23..]),
            num_channels,
            interleave_size,
            loop_start_block_address: le_u32(&data[0x2F..]),
            loop_end_block_address: le_u32(&data[0x33..]),
            total_audio_data_size,
            block_size: u16::from_be_bytes([data[4], data[5]]),
        })
    }

    /// Probe a continuation packet, returning its audio payload size.
    fn probe_continuation<R: Read + Seek>(
        packet: &PesPacket,
        reader: &mut R,
    ) -> Result<u64, DemuxError> {
        if packet.stream_id != PRIVATE_STREAM_1 {
            return Err(DemuxError::WrongPrivateStream);
        }
        let saved = reader.stream_position()?;
        reader.seek(SeekFrom::Start(packet.offset))?;
        let mut data = [0u8; SUB_HEADER_LENGTH as usize];
        let result = read_filled(reader, &mut data);
        reader.seek(SeekFrom::Start(saved))?;
        result?;

        let valid = data[..4] == [0x00, 0x00, 0x01, 0xBD] && matches!(data[0x14], 0xA0 | 0xA1);
        if !valid {
            return Err(DemuxError::WrongPrivateStream);
        }
        let block_size = u64::from(u16::from_be_bytes([data[4], data[5]]));
        block_size
            .checked_sub(SUB_HEADER_LENGTH - BLOCK_DATA_START)
            .ok_or(DemuxError::WrongPrivateStream)
    }

    /// Audio payload bytes of the probed first packet.
    #[must_use]
    pub const fn audio_data_size(&self) -> u64 {
        self.block_size as u64 - (FULL_HEADER_LENGTH - BLOCK_DATA_START)
    }
}

impl fmt::Display for Ps2PcmAudio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PS2 audio ({}) {} channel(s) {} Hz",
            self.audio_type.as_str(),
            self.num_channels,
            self.sampling_rate
        )
    }
}

fn wav_header(audio: &Ps2PcmAudio) -> Vec<u8> {
    let block_align = u16::try_from(audio.num_channels * 2).unwrap_or(u16::MAX);
    let byte_rate = audio.sampling_rate * u32::from(block_align);
    let mut header = Vec::with_capacity(WAV_HEADER_SIZE as usize);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + audio.total_audio_data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&u16::try_from(audio.num_channels).unwrap_or(u16::MAX).to_le_bytes());
    header.extend_from_slice(&audio.sampling_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    header.extend_from_slice(b"data");
    header.extend_from_slice(&audio.total_audio_data_size.to_le_bytes());
    header
}

/// Regroup one `num_channels * 0x200` block from per-channel planes to
/// sample-interleaved order, 16-bit samples kept byte-for-byte.
fn reinterleave(raw: &[u8], channels: usize) -> Vec<u8> {
    let plane = raw.len() / channels;
    let mut out = Vec::with_capacity(raw.len());
    for sample in 0..plane / 2 {
        for channel in 0..channels {
            let at = channel * plane + sample * 2;
            out.extend_from_slice(&raw[at..at + 2]);
        }
    }
    out
}

/// A WAV-shaped reader over a PS2 PCM stream: the synthesized RIFF
/// header, then the audio payload reinterleaved to sample order.
///
/// Reads may return short at the header, block and padding boundaries;
/// wrap in a `BufReader` or use `read_exact` for contiguous output.
pub struct Ps2PcmReader<R> {
    inner: SegmentedReader<R>,
    num_channels: u32,
    /// `num_channels * 0x200`, the reinterleaving unit.
    group_size: u64,
    cached_block: Option<u64>,
    cache: Vec<u8>,
}

impl<R: Read + Seek> Ps2PcmReader<R> {
    /// Total length of the virtual WAV stream.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.inner.total_size()
    }
}

impl<R: Read + Seek> Read for Ps2PcmReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        profiling::scope!("Ps2PcmReader read");

        if buf.is_empty() || self.num_channels <= 1 {
            return self.inner.read(buf);
        }

        let position = self.inner.virtual_position();
        if position >= self.inner.total_size() {
            return Ok(0);
        }

        // Serve the WAV header bytes as they are.
        if position < WAV_HEADER_SIZE {
            let want = cmp::min(buf.len() as u64, WAV_HEADER_SIZE - position) as usize;
            return self.inner.read(&mut buf[..want]);
        }

        // Serve from one reinterleaved block, short-reading at its end.
        let audio_position = position - WAV_HEADER_SIZE;
        let block = audio_position / self.group_size;
        let offset = (audio_position % self.group_size) as usize;
        if self.cached_block != Some(block) {
            self.inner
                .seek(SeekFrom::Start(WAV_HEADER_SIZE + block * self.group_size))?;
            let mut raw = vec![0u8; self.group_size as usize];
            self.inner.read_exact(&mut raw)?;
            self.cache = reinterleave(&raw, cast::usize(self.num_channels));
            self.cached_block = Some(block);
        }

        let available = self.cache.len() - offset;
        let count = cmp::min(buf.len(), available);
        buf[..count].copy_from_slice(&self.cache[offset..offset + count]);
        self.inner
            .seek(SeekFrom::Start(position + count as u64))?;
        Ok(count)
    }
}

impl<R: Read + Seek> Seek for Ps2PcmReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Build the WAV-shaped reader for the PS2 PCM stream of `index`.
///
/// The synthesized RIFF header forms the first segment; when the muxed
/// payload falls short of the announced total (a known encoder quirk)
/// the missing tail, less than one interleave block, is zero-padded.
///
/// # Errors
/// `WrongPrivateStream` when any packet fails its probe;
/// `UnsupportedFormat` when the payload disagrees with the announced
/// total by a block or more; otherwise as
/// [`ProgramStream::stream_iter`].
pub fn reader<R: Read + Seek>(
    index: &ProgramStream,
    mut handle: R,
) -> Result<Ps2PcmReader<R>, DemuxError> {
    let mut segments = Vec::new();
    let mut audio = None;
    let mut audio_data_size = 0u64;

    for (number, packet) in index.stream_iter("private_stream_1")?.enumerate() {
        let (header_length, data_size) = if number == 0 {
            let first = Ps2PcmAudio::probe(packet, &mut handle)?;
            let data_size = first.audio_data_size();
            segments.push(Segment::memory(wav_header(&first), 0));
            audio = Some(first);
            (FULL_HEADER_LENGTH, data_size)
        } else {
            let data_size = Ps2PcmAudio::probe_continuation(packet, &mut handle)?;
            (SUB_HEADER_LENGTH, data_size)
        };

        segments.push(Segment::new(
            packet.offset + header_length,
            WAV_HEADER_SIZE + audio_data_size,
            data_size,
        ));
        audio_data_size += data_size;
    }

    let audio = audio.ok_or(DemuxError::WrongPrivateStream)?;
    let total = u64::from(audio.total_audio_data_size);
    if audio_data_size != total {
        // Known muxer quirk: a few final zero bytes may be missing.
        // Anything bigger than an interleave block is not that.
        let missing = total
            .checked_sub(audio_data_size)
            .filter(|&missing| missing < u64::from(audio.interleave_size))
            .ok_or(DemuxError::UnsupportedFormat(
                "PS2 PCM payload disagrees with its announced size",
            ))?;
        warn!(
            "PS2 PCM audio size mismatch (read {audio_data_size} != expected {total}), \
             padding with {missing} zero bytes"
        );
        segments.push(Segment::memory(
            vec![0u8; missing as usize],
            WAV_HEADER_SIZE + audio_data_size,
        ));
    }

    Ok(Ps2PcmReader {
        inner: SegmentedReader::new(handle, segments),
        num_channels: audio.num_channels,
        group_size: u64::from(audio.num_channels) * u64::from(audio.interleave_size),
        cached_block: None,
        cache: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::{ProgramStream, PROGRAM_END_CODE};
    use std::io::Cursor;

    const PACK_HEADER: [u8; 14] = [
        0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8,
    ];

    /// First PS2 PCM packet: PES header ending at 0x14, audio-type and
    /// stream-number bytes, the SShd/SSbd sub-header, then `audio`.
    fn first_pcm_pes(channels: u32, total: u32, audio: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBD];
        let length = u16::try_from(0x39 + audio.len()).unwrap();
        data.extend_from_slice(&length.to_be_bytes());
        // flags + PTS 0 + 6 stuffing bytes: payload starts at 0x14.
        data.extend_from_slice(&[0x81, 0x80, 0x0B, 0x21, 0x00, 0x01, 0x00, 0x01]);
        data.extend_from_slice(&[0xFF; 6]);
        data.push(0xA0); // stream audio type
        data.extend_from_slice(&[0x00, 0x01]); // stream number
        data.extend_from_slice(b"SShd");
        data.extend_from_slice(&0x18u32.to_le_bytes()); // sub-header length
        data.extend_from_slice(&1u32.to_le_bytes()); // PCM16LE
        data.extend_from_slice(&48_000u32.to_le_bytes());
        data.extend_from_slice(&channels.to_le_bytes());
        data.extend_from_slice(&0x200u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // loop start
        data.extend_from_slice(&0u32.to_le_bytes()); // loop end
        data.extend_from_slice(b"SSbd");
        data.extend_from_slice(&total.to_le_bytes());
        data.extend_from_slice(audio);
        data
    }

    /// Continuation packet: same PES shape, payload is audio only.
    fn continuation_pcm_pes(audio: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xBD];
        let length = u16::try_from(0x11 + audio.len()).unwrap();
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&[0x81, 0x80, 0x0B, 0x21, 0x00, 0x01, 0x00, 0x01]);
        data.extend_from_slice(&[0xFF; 6]);
        data.push(0xA0);
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(audio);
        data
    }

    fn pcm_file(packets: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PACK_HEADER.to_vec();
        for packet in packets {
            data.extend_from_slice(packet);
        }
        data.extend_from_slice(&PROGRAM_END_CODE);
        data
    }

    fn open(data: &[u8]) -> ProgramStream {
        ProgramStream::open(&mut Cursor::new(data.to_vec())).unwrap()
    }

    #[test]
    fn probe_reads_the_sub_header() {
        let audio = vec![0u8; 0x400];
        let data = pcm_file(&[first_pcm_pes(2, 0x400, &audio)]);
        let index = open(&data);
        let packet = index.streams().next().unwrap().1;
        let mut handle = Cursor::new(data);
        let parsed = Ps2PcmAudio::probe(packet, &mut handle).unwrap();
        assert_eq!(parsed.audio_type, AudioType::Pcm16Le);
        assert_eq!(parsed.sampling_rate, 48_000);
        assert_eq!(parsed.num_channels, 2);
        assert_eq!(parsed.total_audio_data_size, 0x400);
        assert_eq!(parsed.audio_data_size(), 0x400);
        assert_eq!(
            parsed.to_string(),
            "PS2 audio (PCM 16bit little endian) 2 channel(s) 48000 Hz"
        );
        assert_eq!(handle.position(), 0);
    }

    #[test]
    fn probe_rejects_foreign_payload() {
        let payload = [0x80, 0x01, 0x00, 0x02, 0x0B, 0x77, 0x11, 0x22];
        let mut pes = vec![0x00, 0x00, 0x01, 0xBD];
        pes.extend_from_slice(&u16::try_from(3 + payload.len()).unwrap().to_be_bytes());
        pes.extend_from_slice(&[0x80, 0x00, 0x00]);
        pes.extend_from_slice(&payload);
        let data = pcm_file(&[pes]);
        let index = open(&data);
        let packet = index.streams().next().unwrap().1;
        let mut handle = Cursor::new(data);
        assert!(matches!(
            Ps2PcmAudio::probe(packet, &mut handle),
            Err(DemuxError::WrongPrivateStream)
        ));
    }

    // A 2-channel block of two adjacent 0x200 planes L|R must come out
    // of the reader as L0 R0 L1 R1 ... 16-bit little-endian pairs.
    #[test]
    fn two_channel_blocks_are_reinterleaved() {
        let mut audio = Vec::with_capacity(0x400);
        for i in 0..0x100u16 {
            audio.extend_from_slice(&(0x1000 + i).to_le_bytes());
        }
        for i in 0..0x100u16 {
            audio.extend_from_slice(&(0x2000 + i).to_le_bytes());
        }
        let data = pcm_file(&[first_pcm_pes(2, 0x400, &audio)]);
        let index = open(&data);
        let mut stream = reader(&index, Cursor::new(data)).unwrap();

        let mut wav = Vec::new();
        stream.read_to_end(&mut wav).unwrap();
        assert_eq!(wav.len(), 44 + 0x400);

        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 0x400);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 2);
        assert_eq!(
            u32::from_le_bytes(wav[24..28].try_into().unwrap()),
            48_000
        );
        assert_eq!(
            u32::from_le_bytes(wav[40..44].try_into().unwrap()),
            0x400
        );

        let samples = &wav[44..];
        for i in 0..0x100usize {
            let left = u16::from_le_bytes(samples[i * 4..i * 4 + 2].try_into().unwrap());
            let right = u16::from_le_bytes(samples[i * 4 + 2..i * 4 + 4].try_into().unwrap());
            assert_eq!(left, 0x1000 + i as u16, "left sample {i}");
            assert_eq!(right, 0x2000 + i as u16, "right sample {i}");
        }
    }

    #[test]
    fn windowed_reads_match_the_full_wav() {
        let mut audio = Vec::with_capacity(0x800);
        for i in 0..0x200u16 {
            audio.extend_from_slice(&(0x1000 + i).to_le_bytes());
        }
        for i in 0..0x200u16 {
            audio.extend_from_slice(&(0x2000 + i).to_le_bytes());
        }
        let data = pcm_file(&[first_pcm_pes(2, 0x800, &audio)]);
        let index = open(&data);
        let mut stream = reader(&index, Cursor::new(data)).unwrap();

        let mut full = Vec::new();
        stream.read_to_end(&mut full).unwrap();

        for (start, len) in [(0u64, 44usize), (30, 40), (44, 7), (1000, 300), (2091, 1)] {
            stream.seek(SeekFrom::Start(start)).unwrap();
            let mut window = vec![0u8; len];
            stream.read_exact(&mut window).unwrap();
            assert_eq!(
                window,
                &full[start as usize..start as usize + len],
                "window {start}+{len}"
            );
        }
    }

    #[test]
    fn short_payload_is_zero_padded() {
        // 16 audio bytes missing from the announced total.
        let audio = vec![0x55u8; 0x400 - 16];
        let data = pcm_file(&[first_pcm_pes(2, 0x400, &audio)]);
        let index = open(&data);
        let mut stream = reader(&index, Cursor::new(data)).unwrap();
        let mut wav = Vec::new();
        stream.read_to_end(&mut wav).unwrap();
        assert_eq!(wav.len(), 44 + 0x400);
        // The padding lands at the tail of the second plane, so the
        // last 8 interleaved sample pairs have zero right channels.
        assert_eq!(&wav[wav.len() - 4..], &[0x55, 0x55, 0x00, 0x00][..]);
    }

    #[test]
    fn mono_stream_passes_straight_through() {
        let audio: Vec<u8> = (0..0x200u16).flat_map(|i| i.to_le_bytes()).collect();
        let first: Vec<u8> = first_pcm_pes(1, 0x400, &audio);
        let continuation = continuation_pcm_pes(&audio);
        let data = pcm_file(&[first, continuation]);
        let index = open(&data);
        let mut stream = reader(&index, Cursor::new(data)).unwrap();
        let mut wav = Vec::new();
        stream.read_to_end(&mut wav).unwrap();
        assert_eq!(wav.len(), 44 + 0x800);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
        assert_eq!(&wav[44..44 + 0x400], &audio[..]);
        assert_eq!(&wav[44 + 0x400..], &audio[..]);
    }
}
