//! Extension structures that may follow sequence and picture headers,
//! dispatched on the 4-bit extension start code identifier.

use std::io::{Read, Seek};

use crate::errors::DemuxError;
use crate::io::bits::BitReader;
use crate::io::peek;

/// The sequence display extension: video format and display size hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDisplayExtension {
    /// 3-bit video format code (PAL, NTSC, ...).
    pub video_format: u8,
    /// Colour description triple, when present: primaries, transfer
    /// characteristics, matrix coefficients.
    pub colour_description: Option<(u8, u8, u8)>,
    /// Intended horizontal display size.
    pub display_horizontal_size: u16,
    /// Intended vertical display size.
    pub display_vertical_size: u16,
}

impl SequenceDisplayExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let video_format = bits.read(3)? as u8;
        let colour_description = if bits.read_flag()? {
            Some((
                bits.read(8)? as u8,
                bits.read(8)? as u8,
                bits.read(8)? as u8,
            ))
        } else {
            None
        };
        let display_horizontal_size = bits.read(14)? as u16;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("sequence display extension"));
        }
        let display_vertical_size = bits.read(14)? as u16;
        Ok(Self {
            video_format,
            colour_description,
            display_horizontal_size,
            display_vertical_size,
        })
    }
}

/// Scalable mode of a sequence scalable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalableMode {
    /// Slice data split across two layers.
    DataPartitioning,
    /// An enhancement layer refining a lower-resolution base layer.
    Spatial,
    /// An enhancement layer refining reconstruction quality.
    Snr,
    /// An enhancement layer raising the frame rate.
    Temporal,
}

/// Spatial scalability parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialScalability {
    /// Width of the lower layer frame.
    pub lower_layer_prediction_horizontal_size: u16,
    /// Height of the lower layer frame.
    pub lower_layer_prediction_vertical_size: u16,
    /// Horizontal subsampling numerator.
    pub horizontal_subsampling_factor_m: u8,
    /// Horizontal subsampling denominator.
    pub horizontal_subsampling_factor_n: u8,
    /// Vertical subsampling numerator.
    pub vertical_subsampling_factor_m: u8,
    /// Vertical subsampling denominator.
    pub vertical_subsampling_factor_n: u8,
}

/// Temporal scalability parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalScalability {
    /// Whether base and enhancement pictures are multiplexed.
    pub mux_to_progressive_sequence: Option<bool>,
    /// Number of enhancement pictures between base pictures.
    pub picture_mux_order: u8,
    /// Ratio of enhancement to base pictures.
    pub picture_mux_factor: u8,
}

/// The sequence scalable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceScalableExtension {
    /// Which scalability the sequence uses.
    pub scalable_mode: ScalableMode,
    /// Layer id of this stream within the scalability hierarchy.
    pub layer_id: u8,
    /// Spatial parameters, for [`ScalableMode::Spatial`].
    pub spatial: Option<SpatialScalability>,
    /// Temporal parameters, for [`ScalableMode::Temporal`].
    pub temporal: Option<TemporalScalability>,
}

impl SequenceScalableExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let scalable_mode = match bits.read(2)? {
            0b00 => ScalableMode::DataPartitioning,
            0b01 => ScalableMode::Spatial,
            0b10 => ScalableMode::Snr,
            _ => ScalableMode::Temporal,
        };
        let layer_id = bits.read(4)? as u8;

        let mut spatial = None;
        let mut temporal = None;
        match scalable_mode {
            ScalableMode::Spatial => {
                let lower_layer_prediction_horizontal_size = bits.read(14)? as u16;
                if !bits.read_flag()? {
                    return Err(DemuxError::InvalidMarker("sequence scalable extension"));
                }
                let lower_layer_prediction_vertical_size = bits.read(14)? as u16;
                spatial = Some(SpatialScalability {
                    lower_layer_prediction_horizontal_size,
                    lower_layer_prediction_vertical_size,
                    horizontal_subsampling_factor_m: bits.read(5)? as u8,
                    horizontal_subsampling_factor_n: bits.read(5)? as u8,
                    vertical_subsampling_factor_m: bits.read(5)? as u8,
                    vertical_subsampling_factor_n: bits.read(5)? as u8,
                });
            }
            ScalableMode::Temporal => {
                let picture_mux_enable = bits.read_flag()?;
                let mux_to_progressive_sequence = if picture_mux_enable {
                    Some(bits.read_flag()?)
                } else {
                    None
                };
                temporal = Some(TemporalScalability {
                    mux_to_progressive_sequence,
                    picture_mux_order: bits.read(3)? as u8,
                    picture_mux_factor: bits.read(3)? as u8,
                });
            }
            ScalableMode::DataPartitioning | ScalableMode::Snr => {}
        }

        Ok(Self {
            scalable_mode,
            layer_id,
            spatial,
            temporal,
        })
    }
}

/// The quant matrix extension: up to four replacement matrices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantMatrixExtension {
    /// Replacement intra quantiser matrix.
    pub intra_quantiser_matrix: Option<[u8; 64]>,
    /// Replacement non-intra quantiser matrix.
    pub non_intra_quantiser_matrix: Option<[u8; 64]>,
    /// Replacement chroma intra quantiser matrix.
    pub chroma_intra_quantiser_matrix: Option<[u8; 64]>,
    /// Replacement chroma non-intra quantiser matrix.
    pub chroma_non_intra_quantiser_matrix: Option<[u8; 64]>,
}

fn read_matrix<R: Read>(bits: &mut BitReader<'_, R>) -> Result<Option<[u8; 64]>, DemuxError> {
    if !bits.read_flag()? {
        return Ok(None);
    }
    let mut matrix = [0u8; 64];
    for value in &mut matrix {
        *value = bits.read(8)? as u8;
    }
    Ok(Some(matrix))
}

impl QuantMatrixExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        Ok(Self {
            intra_quantiser_matrix: read_matrix(&mut bits)?,
            non_intra_quantiser_matrix: read_matrix(&mut bits)?,
            chroma_intra_quantiser_matrix: read_matrix(&mut bits)?,
            chroma_non_intra_quantiser_matrix: read_matrix(&mut bits)?,
        })
    }
}

/// The copyright extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyrightExtension {
    /// Whether the following material is copyrighted.
    pub copyright_flag: bool,
    /// Registered copyright identifier.
    pub copyright_identifier: u8,
    /// Original (set) or copy (clear).
    pub original_or_copy: bool,
    /// 64-bit copyright number, assembled from its three parts.
    pub copyright_number: u64,
}

impl CopyrightExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let copyright_flag = bits.read_flag()?;
        let copyright_identifier = bits.read(8)? as u8;
        let original_or_copy = bits.read_flag()?;
        bits.read(7)?; // reserved
        let mut number = 0u64;
        for width in [20u32, 22, 22] {
            if !bits.read_flag()? {
                return Err(DemuxError::InvalidMarker("copyright extension"));
            }
            number = (number << width) | u64::from(bits.read(width)?);
        }
        Ok(Self {
            copyright_flag,
            copyright_identifier,
            original_or_copy,
            copyright_number: number,
        })
    }
}

/// One frame centre offset of a picture display extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCentreOffset {
    /// Horizontal offset in 1/16th sample units.
    pub horizontal_offset: u16,
    /// Vertical offset in 1/16th line units.
    pub vertical_offset: u16,
}

/// The picture display extension: one centre offset per displayed
/// field or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureDisplayExtension {
    /// The offsets, count dictated by the surrounding sequence and
    /// picture state.
    pub frame_centre_offsets: Vec<FrameCentreOffset>,
}

impl PictureDisplayExtension {
    fn parse<R: Read>(reader: &mut R, offset_count: usize) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let mut frame_centre_offsets = Vec::with_capacity(offset_count);
        for _ in 0..offset_count {
            let horizontal_offset = bits.read(16)? as u16;
            if !bits.read_flag()? {
                return Err(DemuxError::InvalidMarker("picture display extension"));
            }
            let vertical_offset = bits.read(16)? as u16;
            if !bits.read_flag()? {
                return Err(DemuxError::InvalidMarker("picture display extension"));
            }
            frame_centre_offsets.push(FrameCentreOffset {
                horizontal_offset,
                vertical_offset,
            });
        }
        Ok(Self {
            frame_centre_offsets,
        })
    }
}

/// The picture spatial scalable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureSpatialScalableExtension {
    /// Temporal reference of the lower layer picture used for
    /// prediction.
    pub lower_layer_temporal_reference: u16,
    /// Horizontal offset of the upsampled lower layer.
    pub lower_layer_horizontal_offset: u16,
    /// Vertical offset of the upsampled lower layer.
    pub lower_layer_vertical_offset: u16,
    /// Index into the spatial temporal weight code table.
    pub spatial_temporal_weight_code_table_index: u8,
    /// Whether the lower layer picture is progressive.
    pub lower_layer_progressive_frame: bool,
    /// Which lower layer field feeds the deinterlacing.
    pub lower_layer_deinterlaced_field_select: bool,
}

impl PictureSpatialScalableExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let lower_layer_temporal_reference = bits.read(10)? as u16;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("picture spatial scalable extension"));
        }
        let lower_layer_horizontal_offset = bits.read(15)? as u16;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("picture spatial scalable extension"));
        }
        let lower_layer_vertical_offset = bits.read(15)? as u16;
        Ok(Self {
            lower_layer_temporal_reference,
            lower_layer_horizontal_offset,
            lower_layer_vertical_offset,
            spatial_temporal_weight_code_table_index: bits.read(2)? as u8,
            lower_layer_progressive_frame: bits.read_flag()?,
            lower_layer_deinterlaced_field_select: bits.read_flag()?,
        })
    }
}

/// The picture temporal scalable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureTemporalScalableExtension {
    /// Which layers supply the reference pictures.
    pub reference_select_code: u8,
    /// Temporal reference of the forward reference.
    pub forward_temporal_reference: u16,
    /// Temporal reference of the backward reference.
    pub backward_temporal_reference: u16,
}

impl PictureTemporalScalableExtension {
    fn parse<R: Read>(reader: &mut R) -> Result<Self, DemuxError> {
        let mut bits = BitReader::new(reader);
        bits.read(4)?;
        let reference_select_code = bits.read(2)? as u8;
        let forward_temporal_reference = bits.read(10)? as u16;
        if !bits.read_flag()? {
            return Err(DemuxError::InvalidMarker("picture temporal scalable extension"));
        }
        let backward_temporal_reference = bits.read(10)? as u16;
        Ok(Self {
            reference_select_code,
            forward_temporal_reference,
            backward_temporal_reference,
        })
    }
}

/// One parsed extension structure, whichever kind the id nibble
/// announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionData {
    /// Sequence display extension.
    SequenceDisplay(SequenceDisplayExtension),
    /// Sequence scalable extension.
    SequenceScalable(SequenceScalableExtension),
    /// Quant matrix extension.
    QuantMatrix(QuantMatrixExtension),
    /// Copyright extension.
    Copyright(CopyrightExtension),
    /// Picture display extension.
    PictureDisplay(PictureDisplayExtension),
    /// Picture spatial scalable extension.
    PictureSpatialScalable(PictureSpatialScalableExtension),
    /// Picture temporal scalable extension.
    PictureTemporalScalable(PictureTemporalScalableExtension),
}

impl ExtensionData {
    /// Parse one sequence-level extension (display or scalable),
    /// reader positioned just after the extension start code.
    pub(crate) fn parse_sequence_level<R: Read + Seek>(
        reader: &mut R,
    ) -> Result<Self, DemuxError> {
        let next: [u8; 1] = peek(reader)?;
        match next[0] >> 4 {
            0b0010 => Ok(Self::SequenceDisplay(SequenceDisplayExtension::parse(
                reader,
            )?)),
            0b0101 => Ok(Self::SequenceScalable(SequenceScalableExtension::parse(
                reader,
            )?)),
            _ => Err(DemuxError::InvalidFixedBits(
                "sequence-level extension identifier",
            )),
        }
    }

    /// Parse one picture-level extension, reader positioned just after
    /// the extension start code. `frame_centre_offset_count` supplies
    /// the display extension's element count from the surrounding
    /// picture state.
    pub(crate) fn parse_picture_level<R: Read + Seek>(
        reader: &mut R,
        frame_centre_offset_count: usize,
    ) -> Result<Self, DemuxError> {
        let next: [u8; 1] = peek(reader)?;
        match next[0] >> 4 {
            0b0011 => Ok(Self::QuantMatrix(QuantMatrixExtension::parse(reader)?)),
            0b0100 => Ok(Self::Copyright(CopyrightExtension::parse(reader)?)),
            0b0111 => Ok(Self::PictureDisplay(PictureDisplayExtension::parse(
                reader,
                frame_centre_offset_count,
            )?)),
            0b1001 => Ok(Self::PictureSpatialScalable(
                PictureSpatialScalableExtension::parse(reader)?,
            )),
            0b1010 => Ok(Self::PictureTemporalScalable(
                PictureTemporalScalableExtension::parse(reader)?,
            )),
            _ => Err(DemuxError::InvalidFixedBits(
                "picture-level extension identifier",
            )),
        }
    }
}
