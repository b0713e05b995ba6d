//! This crate demultiplexes MPEG-2 Program Stream files (ISO/IEC
//! 13818-1) into their elementary streams.
//!
//! A Program Stream interleaves video, audio and private payload
//! streams inside a hierarchy of packs and `PES` packets.
//! [`ProgramStream::open`] parses that hierarchy once, indexing every
//! packet by stream id without copying payload; each stream can then be
//! read back as a flat byte sequence through a segmented reader, fed to
//! the MPEG-2 video walker, or probed by the private-stream
//! recognizers.
//!
//! ## Example code
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let mut file = BufReader::new(File::open("movie.mpg")?);
//! let index = psdemux::ProgramStream::open(&mut file)?;
//! for (stream_id, packet) in index.streams() {
//!     println!(
//!         "stream 0x{stream_id:02X}, first packet of {} payload bytes",
//!         packet.payload_length
//!     );
//! }
//!
//! // Reassemble one elementary stream with its own file handle.
//! let mut video = index.stream_reader("video stream number 0", File::open("movie.mpg")?)?;
//! let m2v = psdemux::video::Mpeg2Video::info(&mut video)?;
//! println!("{m2v}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Background & References
//!
//! - [Program Stream](https://en.wikipedia.org/wiki/MPEG_program_stream) (PS)
//! - [Packetized Elementary Stream][PES] (PES)
//! - [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html
//!
//! ## Limitations
//!
//! MPEG-1 program streams are rejected, scrambled payload is not
//! deciphered, and a malformed header anywhere aborts the parse; there
//! is no resynchronization strategy.

mod errors;
mod util;

pub mod io;
pub mod private;
pub mod ps;
pub mod video;

pub use crate::errors::DemuxError;
pub use crate::ps::{ProgramStream, StreamSelector};
