//! Picture-layer structures: GOP headers, picture headers and the
//! picture coding extension.

use std::io::Read;

use crate::errors::DemuxError;
use crate::io::bits::BitReader;
use crate::io::read_array;
use crate::video::GROUP_START_CODE;

/// The 3-bit picture coding type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureCodingType {
    /// Intra-coded.
    I,
    /// Predictive-coded.
    P,
    /// Bidirectionally-predictive-coded.
    B,
    /// DC intra-coded, MPEG-1 only.
    D,
    /// A forbidden or reserved tag value, kept verbatim.
    Reserved(u8),
}

impl PictureCodingType {
    fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::I,
            2 => Self::P,
            3 => Self::B,
            4 => Self::D,
            other => Self::Reserved(other),
        }
    }

    /// One-letter name of the coding type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I => "I",
            Self::P => "P",
            Self::B => "B",
            Self::D => "D",
            Self::Reserved(_) => "?",
        }
    }
}

/// The group-of-pictures header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOfPicturesHeader {
    /// Raw 25-bit SMPTE time code.
    pub time_code: u32,
    /// Set when the GOP can be decoded without the previous one.
    pub closed_gop: bool,
    /// Set when leading B pictures reference a lost anchor.
    pub broken_link: bool,
}

impl GroupOfPicturesHeader {
    /// Parse the 8-byte header, reader positioned at its start code.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let code: [u8; 4] = read_array(reader)?;
        if code != GROUP_START_CODE {
            return Err(DemuxError::InvalidFixedBits("group start code"));
        }
        let mut bits = BitReader::new(reader);
        let time_code = bits.read(25)?;
        let closed_gop = bits.read_flag()?;
        let broken_link = bits.read_flag()?;
        Ok(Self {
            time_code,
            closed_gop,
            broken_link,
        })
    }
}

/// The motion vector scale carried for P and B pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionVectorScale {
    /// MPEG-1 full-pel flag, always 0 in MPEG-2.
    pub full_pel_vector: bool,
    /// 3-bit f-code, `111` in MPEG-2 (superseded by the coding
    /// extension).
    pub f_code: u8,
}

/// The picture header: a fixed 29-bit prefix, then a bit trailer whose
/// layout depends on the coding type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureHeader {
    /// Display order of the picture within its GOP, modulo 1024.
    pub temporal_reference: u16,
    /// Coding type tag.
    pub picture_coding_type: PictureCodingType,
    /// VBV occupancy delay in 1/90000 s units.
    pub vbv_delay: u16,
    /// Forward vector scale, present for P and B pictures.
    pub forward: Option<MotionVectorScale>,
    /// Backward vector scale, present for B pictures.
    pub backward: Option<MotionVectorScale>,
    /// `extra_information_picture` bytes, terminated by a cleared
    /// `extra_bit_picture`.
    pub extra_information: Vec<u8>,
}

impl PictureHeader {
    /// Parse the header body, reader positioned just after the picture
    /// start code.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        let temporal_reference = bits.read(10)? as u16;
        let picture_coding_type = PictureCodingType::from_raw(bits.read(3)? as u8);
        let vbv_delay = bits.read(16)? as u16;

        let forward = if matches!(
            picture_coding_type,
            PictureCodingType::P | PictureCodingType::B
        ) {
            Some(MotionVectorScale {
                full_pel_vector: bits.read_flag()?,
                f_code: bits.read(3)? as u8,
            })
        } else {
            None
        };
        let backward = if picture_coding_type == PictureCodingType::B {
            Some(MotionVectorScale {
                full_pel_vector: bits.read_flag()?,
                f_code: bits.read(3)? as u8,
            })
        } else {
            None
        };

        let mut extra_information = Vec::new();
        while bits.read_flag()? {
            extra_information.push(bits.read(8)? as u8);
        }

        Ok(Self {
            temporal_reference,
            picture_coding_type,
            vbv_delay,
            forward,
            backward,
            extra_information,
        })
    }
}

/// Composite display information of a picture coding extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeDisplay {
    /// Set on PAL material encoded from a signal with a positive
    /// v-axis.
    pub v_axis: bool,
    /// Field count of the original analog frame.
    pub field_sequence: u8,
    /// Sub-carrier/line frequency relation.
    pub sub_carrier: bool,
    /// Burst amplitude of the original signal.
    pub burst_amplitude: u8,
    /// Sub-carrier phase of the original signal.
    pub sub_carrier_phase: u8,
}

/// The picture coding extension that follows every MPEG-2 picture
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureCodingExtension {
    /// f-codes: `[forward, backward] x [horizontal, vertical]`.
    pub f_code: [[u8; 2]; 2],
    /// Precision of the DC coefficients, 8 to 11 bits.
    pub intra_dc_precision: u8,
    /// Frame or field structure code.
    pub picture_structure: u8,
    /// Which field of an interlaced frame comes first.
    pub top_field_first: bool,
    /// Frame-only prediction and DCT.
    pub frame_pred_frame_dct: bool,
    /// Motion vectors carried for concealment in intra macroblocks.
    pub concealment_motion_vectors: bool,
    /// Quantiser scale interpretation.
    pub q_scale_type: bool,
    /// Alternate intra VLC table in use.
    pub intra_vlc_format: bool,
    /// Alternate coefficient scan order in use.
    pub alternate_scan: bool,
    /// Repeat the first field during display.
    pub repeat_first_field: bool,
    /// Chroma type of 4:2:0 material.
    pub chroma_420_type: bool,
    /// The two fields of the frame were captured at one instant.
    pub progressive_frame: bool,
    /// Composite display information, when present.
    pub composite_display: Option<CompositeDisplay>,
}

/// Extension start code identifier of a picture coding extension.
const PICTURE_CODING_EXTENSION_ID: u32 = 0b1000;

impl PictureCodingExtension {
    /// Parse the extension body, reader positioned just after the
    /// extension start code.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        if bits.read(4)? != PICTURE_CODING_EXTENSION_ID {
            return Err(DemuxError::InvalidFixedBits(
                "picture coding extension identifier",
            ));
        }

        let mut f_code = [[0u8; 2]; 2];
        for direction in &mut f_code {
            for component in direction {
                *component = bits.read(4)? as u8;
            }
        }
        let intra_dc_precision = bits.read(2)? as u8;
        let picture_structure = bits.read(2)? as u8;
        let top_field_first = bits.read_flag()?;
        let frame_pred_frame_dct = bits.read_flag()?;
        let concealment_motion_vectors = bits.read_flag()?;
        let q_scale_type = bits.read_flag()?;
        let intra_vlc_format = bits.read_flag()?;
        let alternate_scan = bits.read_flag()?;
        let repeat_first_field = bits.read_flag()?;
        let chroma_420_type = bits.read_flag()?;
        let progressive_frame = bits.read_flag()?;

        let composite_display = if bits.read_flag()? {
            Some(CompositeDisplay {
                v_axis: bits.read_flag()?,
                field_sequence: bits.read(3)? as u8,
                sub_carrier: bits.read_flag()?,
                burst_amplitude: bits.read(7)? as u8,
                sub_carrier_phase: bits.read(8)? as u8,
            })
        } else {
            None
        };

        Ok(Self {
            f_code,
            intra_dc_precision,
            picture_structure,
            top_field_first,
            frame_pred_frame_dct,
            concealment_motion_vectors,
            q_scale_type,
            intra_vlc_format,
            alternate_scan,
            repeat_first_field,
            chroma_420_type,
            progressive_frame,
            composite_display,
        })
    }

    /// Number of frame centre offsets a picture display extension of
    /// this picture carries.
    pub(crate) fn frame_centre_offset_count(&self, progressive_sequence: bool) -> usize {
        if progressive_sequence {
            if self.repeat_first_field {
                if self.top_field_first {
                    3
                } else {
                    2
                }
            } else {
                1
            }
        } else if self.picture_structure != 0b11 {
            // Field pictures carry exactly one offset.
            1
        } else if self.repeat_first_field {
            3
        } else {
            2
        }
    }
}
