//! A virtual seekable stream assembled from scattered fragments.
//!
//! A demultiplexed elementary stream is physically a list of payload
//! ranges inside the Program Stream file, sometimes with synthesized
//! pieces around them (a generated WAV header, trailing zero padding).
//! [`SegmentedReader`] presents that list as one flat [`Read`] +
//! [`Seek`] byte stream.

use std::cmp;
use std::fmt;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::util::BytesFormatter;

/// Where the bytes of a [`Segment`] physically live.
pub enum SegmentSource {
    /// A range of the shared underlying handle.
    Handle,
    /// An owned in-memory buffer (synthesized headers, padding).
    Memory(Vec<u8>),
}

impl fmt::Debug for SegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Handle => write!(f, "Handle"),
            Self::Memory(data) => f.debug_tuple("Memory").field(&BytesFormatter(data)).finish(),
        }
    }
}

/// One fragment of the virtual stream.
///
/// Virtual ranges of the segments handed to [`SegmentedReader::new`] must
/// be contiguous and start at zero:
/// `segments[i].virtual_start + segments[i].length ==
/// segments[i + 1].virtual_start`.
#[derive(Debug)]
pub struct Segment {
    /// Byte source of this fragment.
    pub source: SegmentSource,
    /// Start of the fragment within its source.
    pub physical_offset: u64,
    /// Position of the fragment in the virtual stream.
    pub virtual_start: u64,
    /// Fragment length in bytes.
    pub length: u64,
}

impl Segment {
    /// A fragment backed by the shared underlying handle.
    #[must_use]
    pub const fn new(physical_offset: u64, virtual_start: u64, length: u64) -> Self {
        Self {
            source: SegmentSource::Handle,
            physical_offset,
            virtual_start,
            length,
        }
    }

    /// A fragment backed by an owned buffer.
    #[must_use]
    pub fn memory(data: Vec<u8>, virtual_start: u64) -> Self {
        let length = data.len() as u64;
        Self {
            source: SegmentSource::Memory(data),
            physical_offset: 0,
            virtual_start,
            length,
        }
    }
}

/// A seekable byte stream synthesized from an ordered list of segments.
///
/// Segments backed by [`SegmentSource::Handle`] all read from the one
/// `handle` passed at construction; the handle is re-seeked before every
/// physical read, so it may be shared freely between segments. One caller
/// at a time: neither the reader nor the handle is synchronized.
pub struct SegmentedReader<R> {
    handle: R,
    segments: Vec<Segment>,
    total_size: u64,
    /// Index of the current segment; may be `segments.len()` at the end
    /// of the stream.
    position: usize,
    /// Byte offset within the current segment.
    offset: u64,
}

impl<R: Read + Seek> SegmentedReader<R> {
    /// Build a reader over `segments`, sorted by virtual start.
    #[must_use]
    pub fn new(handle: R, mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|segment| segment.virtual_start);
        debug_assert!(segments.first().map_or(true, |s| s.virtual_start == 0));
        debug_assert!(segments
            .windows(2)
            .all(|pair| pair[0].virtual_start + pair[0].length == pair[1].virtual_start));
        let total_size = segments.iter().map(|segment| segment.length).sum();
        Self {
            handle,
            segments,
            total_size,
            position: 0,
            offset: 0,
        }
    }

    /// Total length of the virtual stream in bytes.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Current position in the virtual stream.
    #[must_use]
    pub fn virtual_position(&self) -> u64 {
        match self.segments.get(self.position) {
            Some(segment) => segment.virtual_start + self.offset,
            None => self.total_size,
        }
    }

    /// Wrap this reader in a 4 KiB read-ahead buffer. Seeking the
    /// [`BufReader`] discards the buffer, which is the wanted
    /// invalidate-on-seek behavior.
    #[must_use]
    pub fn buffered(self) -> BufReader<Self> {
        BufReader::with_capacity(4096, self)
    }

    fn locate(&mut self, target: u64) {
        let position = self
            .segments
            .partition_point(|segment| segment.virtual_start <= target)
            .saturating_sub(1);
        self.position = position;
        self.offset = match self.segments.get(position) {
            Some(segment) => target - segment.virtual_start,
            None => 0,
        };
    }
}

impl<R: Read + Seek> Read for SegmentedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0usize;
        while written < buf.len() && self.position < self.segments.len() {
            let segment = &self.segments[self.position];
            let left_in_segment = segment.length - self.offset;
            if left_in_segment == 0 {
                self.position += 1;
                self.offset = 0;
                continue;
            }

            let want = cmp::min(left_in_segment, (buf.len() - written) as u64) as usize;
            let read = match &segment.source {
                SegmentSource::Handle => {
                    self.handle
                        .seek(SeekFrom::Start(segment.physical_offset + self.offset))?;
                    self.handle.read(&mut buf[written..written + want])?
                }
                SegmentSource::Memory(data) => {
                    let start = (segment.physical_offset + self.offset) as usize;
                    let available = cmp::min(want, data.len().saturating_sub(start));
                    buf[written..written + available]
                        .copy_from_slice(&data[start..start + available]);
                    available
                }
            };
            if read == 0 {
                break;
            }

            written += read;
            self.offset += read as u64;
            if self.offset >= segment.length {
                self.position += 1;
                self.offset = 0;
            }
        }
        Ok(written)
    }
}

impl<R: Read + Seek> Seek for SegmentedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => cmp::min(offset, self.total_size),
            SeekFrom::Current(delta) => {
                let target = i128::from(self.virtual_position()) + i128::from(delta);
                target.clamp(0, i128::from(self.total_size)) as u64
            }
            SeekFrom::End(delta) => self.total_size.saturating_sub(delta.min(0).unsigned_abs()),
        };
        self.locate(target);
        Ok(target)
    }
}
