//! # MPEG-2 video elementary streams
//!
//! A start-code-directed walker over the video elementary stream
//! reassembled by the segmented reader. It recognizes sequence, GOP,
//! picture and extension boundaries and parses their bit-packed
//! headers; slice data between a picture and the next boundary is
//! located but never bit-parsed, which is all demultiplexing needs.
//!
//! Grammar walked here, per ISO/IEC 13818-2:
//!
//! ```text
//! MPEG2Video := Sequence+ SequenceEnd
//! Sequence   := SequenceHeader SequenceExtension ExtensionAndUserData(0)
//!               (GroupOfPictures | Picture)*
//! Picture    := PictureHeader PictureCodingExtension
//!               ExtensionAndUserData(2) PictureData
//! ```

pub mod extension;
pub mod picture;
pub mod sequence;

use log::trace;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use self::extension::ExtensionData;
use self::picture::{GroupOfPicturesHeader, PictureCodingExtension, PictureHeader};
use self::sequence::{SequenceExtension, SequenceHeader};
use crate::errors::DemuxError;
use crate::io::{next_start_code, peek, read_array, START_CODE_PREFIX};

/// Start code of a picture header.
pub const PICTURE_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
/// Start code of a user data block.
pub const USER_DATA_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB2];
/// Start code of a sequence header.
pub const SEQUENCE_HEADER_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB3];
/// Start code of an extension structure.
pub const EXTENSION_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB5];
/// The code ending the elementary stream.
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB7];
/// Start code of a group-of-pictures header.
pub const GROUP_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB8];

/// Whether `code` introduces a slice (`00 00 01 01..AF`).
#[must_use]
pub fn is_slice_start_code(code: [u8; 4]) -> bool {
    code[..3] == START_CODE_PREFIX && (0x01..=0xAF).contains(&code[3])
}

/// One coded picture: header, coding extension, and the picture-level
/// extension and user data that followed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// The picture header.
    pub header: PictureHeader,
    /// The mandatory MPEG-2 coding extension.
    pub coding_extension: PictureCodingExtension,
    /// Picture-level extensions, in file order.
    pub extensions: Vec<ExtensionData>,
    /// Picture-level user data blocks.
    pub user_data: Vec<Vec<u8>>,
}

impl Picture {
    fn parse<R: Read + Seek>(
        reader: &mut R,
        progressive_sequence: bool,
    ) -> Result<Self, DemuxError> {
        let code: [u8; 4] = read_array(reader)?;
        if code != PICTURE_START_CODE {
            return Err(DemuxError::InvalidFixedBits("picture start code"));
        }
        let header = PictureHeader::parse(reader)?;
        next_start_code(reader, true)?;

        let code: [u8; 4] = read_array(reader)?;
        if code != EXTENSION_START_CODE {
            return Err(DemuxError::InvalidFixedBits(
                "picture coding extension start code",
            ));
        }
        let coding_extension = PictureCodingExtension::parse(reader)?;
        next_start_code(reader, true)?;

        let offset_count = coding_extension.frame_centre_offset_count(progressive_sequence);
        let mut extensions = Vec::new();
        let mut user_data = Vec::new();
        loop {
            let next: [u8; 4] = peek(reader)?;
            if next == EXTENSION_START_CODE {
                let _: [u8; 4] = read_array(reader)?;
                extensions.push(ExtensionData::parse_picture_level(reader, offset_count)?);
                next_start_code(reader, true)?;
            } else if next == USER_DATA_START_CODE {
                let _: [u8; 4] = read_array(reader)?;
                user_data.push(read_user_data(reader)?);
            } else {
                break;
            }
        }

        Ok(Self {
            header,
            coding_extension,
            extensions,
            user_data,
        })
    }
}

/// One video sequence: its headers, the structures between them, and
/// all coded pictures up to the next sequence boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Position of the sequence header in the elementary stream.
    pub offset: u64,
    /// The sequence header.
    pub header: SequenceHeader,
    /// The mandatory MPEG-2 sequence extension.
    pub extension: SequenceExtension,
    /// Sequence-level extensions (display, scalable), in file order.
    pub extensions: Vec<ExtensionData>,
    /// Sequence- and GOP-level user data blocks.
    pub user_data: Vec<Vec<u8>>,
    /// GOP headers, in file order.
    pub gop_headers: Vec<GroupOfPicturesHeader>,
    /// Coded pictures, in file order.
    pub pictures: Vec<Picture>,
}

impl Sequence {
    /// Frame width including the extension bits.
    #[must_use]
    pub fn horizontal_size(&self) -> u32 {
        u32::from(self.header.horizontal_size_value)
            | u32::from(self.extension.horizontal_size_extension) << 12
    }

    /// Frame height including the extension bits.
    #[must_use]
    pub fn vertical_size(&self) -> u32 {
        u32::from(self.header.vertical_size_value)
            | u32::from(self.extension.vertical_size_extension) << 12
    }

    fn parse<R: Read + Seek>(reader: &mut R, headers_only: bool) -> Result<Self, DemuxError> {
        let offset = reader.stream_position()?;
        let header = SequenceHeader::parse(reader)?;
        next_start_code(reader, true)?;

        let next: [u8; 4] = peek(reader)?;
        if next != EXTENSION_START_CODE {
            // MPEG-1 video has no sequence extension.
            return Err(DemuxError::UnsupportedFormat(
                "ISO/IEC 11172-2 (MPEG-1 video) is not supported",
            ));
        }
        let _: [u8; 4] = read_array(reader)?;
        let extension = SequenceExtension::parse(reader)?;
        next_start_code(reader, true)?;

        let mut sequence = Self {
            offset,
            header,
            extension,
            extensions: Vec::new(),
            user_data: Vec::new(),
            gop_headers: Vec::new(),
            pictures: Vec::new(),
        };

        loop {
            let next: [u8; 4] = peek(reader)?;
            if next == EXTENSION_START_CODE {
                let _: [u8; 4] = read_array(reader)?;
                sequence
                    .extensions
                    .push(ExtensionData::parse_sequence_level(reader)?);
                next_start_code(reader, true)?;
            } else if next == USER_DATA_START_CODE {
                let _: [u8; 4] = read_array(reader)?;
                sequence.user_data.push(read_user_data(reader)?);
            } else {
                break;
            }
        }

        if headers_only {
            return Ok(sequence);
        }

        let progressive = sequence.extension.progressive_sequence;
        loop {
            let next: [u8; 4] = peek(reader)?;
            if next == GROUP_START_CODE {
                sequence
                    .gop_headers
                    .push(GroupOfPicturesHeader::parse(reader)?);
                next_start_code(reader, true)?;
                // The GOP layer carries only user data.
                while peek::<_, 4>(reader)? == USER_DATA_START_CODE {
                    let _: [u8; 4] = read_array(reader)?;
                    sequence.user_data.push(read_user_data(reader)?);
                }
            } else if next == PICTURE_START_CODE {
                let picture = Picture::parse(reader, progressive)?;
                skip_picture_data(reader)?;
                trace!("parsed picture {:?}", picture.header.picture_coding_type);
                sequence.pictures.push(picture);
            } else {
                break;
            }
        }

        Ok(sequence)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MPEG-2 Video {}x{} {} {} fps {}",
            self.horizontal_size(),
            self.vertical_size(),
            self.extension.chroma_format_str(),
            self.header.frame_rate_str(),
            self.header.aspect_ratio_str(),
        )?;
        if let Some(picture) = self.pictures.last() {
            if picture.coding_extension.progressive_frame {
                write!(f, " progressive")?;
            } else if picture.coding_extension.top_field_first {
                write!(f, " interlaced (top field first)")?;
            } else {
                write!(f, " interlaced (bottom field first)")?;
            }
        }
        Ok(())
    }
}

/// Collect user data bytes up to the next start code prefix.
fn read_user_data<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>, DemuxError> {
    let mut data = Vec::new();
    loop {
        let next: [u8; 3] = peek(reader)?;
        if next == START_CODE_PREFIX {
            return Ok(data);
        }
        let [byte] = read_array(reader)?;
        data.push(byte);
    }
}

/// Advance the reader over slice data to the next sequence, GOP,
/// picture or sequence-end start code, scanning in 4 KiB chunks.
fn skip_picture_data<R: Read + Seek>(reader: &mut R) -> Result<(), DemuxError> {
    fn find_boundary(data: &[u8]) -> Option<usize> {
        data.windows(4).position(|window| {
            window[..3] == START_CODE_PREFIX && matches!(window[3], 0x00 | 0xB3 | 0xB7 | 0xB8)
        })
    }

    let mut chunk = [0u8; 4096];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        if let Some(index) = find_boundary(&chunk[..read]) {
            reader.seek(SeekFrom::Current(index as i64 - read as i64))?;
            return Ok(());
        }
        // A start code may straddle the chunk boundary.
        if read > 3 {
            reader.seek(SeekFrom::Current(-3))?;
        }
    }
}

/// A parsed MPEG-2 video elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpeg2Video {
    /// The sequences of the stream, in file order.
    pub sequences: Vec<Sequence>,
}

impl Mpeg2Video {
    /// Walk the whole stream, through every sequence up to the
    /// sequence end code.
    ///
    /// # Errors
    /// `UnsupportedFormat` when the stream is not MPEG-2 video (MPEG-1
    /// included); any header violation per [`DemuxError`].
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        Self::walk(reader, false)
    }

    /// Parse only the first sequence's headers, enough for a summary.
    ///
    /// # Errors
    /// Same as [`Mpeg2Video::parse`].
    pub fn info<R: Read + Seek>(reader: &mut R) -> Result<Self, DemuxError> {
        Self::walk(reader, true)
    }

    fn walk<R: Read + Seek>(reader: &mut R, headers_only: bool) -> Result<Self, DemuxError> {
        profiling::scope!("Mpeg2Video walk");

        let mut sequences = Vec::new();
        loop {
            let next: [u8; 4] = peek(reader)?;
            if next != SEQUENCE_HEADER_CODE {
                if sequences.is_empty() {
                    return Err(DemuxError::UnsupportedFormat(
                        "not an MPEG-2 video elementary stream",
                    ));
                }
                break;
            }
            sequences.push(Sequence::parse(reader, headers_only)?);
            if headers_only {
                return Ok(Self { sequences });
            }
        }

        let next: [u8; 4] = peek(reader)?;
        if next != SEQUENCE_END_CODE {
            return Err(DemuxError::InvalidFixedBits("sequence end code"));
        }
        Ok(Self { sequences })
    }
}

impl fmt::Display for Mpeg2Video {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.sequences.first() {
            Some(sequence) => sequence.fmt(f),
            None => write!(f, "MPEG-2 Video (empty)"),
        }
    }
}
