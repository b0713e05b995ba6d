//! Recognizers for payload carried in `private_stream_1`.
//!
//! Several unrelated formats travel as private stream 1; the only way
//! to tell them apart is to probe the first `PES` packet with each
//! recognizer in turn. A recognizer either claims the stream or backs
//! off with [`DemuxError::WrongPrivateStream`], the one error the
//! driver loop swallows.

pub mod dvdac3;
pub mod ps2pcm;

use std::io::{Read, Seek};

use self::dvdac3::DvdAc3Audio;
use self::ps2pcm::Ps2PcmAudio;
use crate::errors::DemuxError;
use crate::ps::pes::PesPacket;

/// What a `private_stream_1` sub-stream turned out to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateStreamKind {
    /// PS2 PCM (or VAG) audio.
    Ps2Pcm(Ps2PcmAudio),
    /// DVD AC-3 audio.
    DvdAc3(DvdAc3Audio),
}

/// Probe `packet`, the first `PES` of a private stream, with every
/// recognizer in fixed order. `None` means no recognizer claimed it.
///
/// # Errors
/// Everything except `WrongPrivateStream` propagates unchanged.
pub fn recognize<R: Read + Seek>(
    packet: &PesPacket,
    reader: &mut R,
) -> Result<Option<PrivateStreamKind>, DemuxError> {
    match Ps2PcmAudio::probe(packet, reader) {
        Ok(audio) => return Ok(Some(PrivateStreamKind::Ps2Pcm(audio))),
        Err(DemuxError::WrongPrivateStream) => {}
        Err(err) => return Err(err),
    }
    match DvdAc3Audio::probe(packet, reader, true) {
        Ok(audio) => return Ok(Some(PrivateStreamKind::DvdAc3(audio))),
        Err(DemuxError::WrongPrivateStream) => {}
        Err(err) => return Err(err),
    }
    Ok(None)
}
