//! The fixed `stream_id` number space of ISO/IEC 13818-1.

/// `program_stream_map` stream id.
pub const PROGRAM_STREAM_MAP: u8 = 0xBC;
/// `private_stream_1` stream id (DVD AC-3, PS2 PCM and friends).
pub const PRIVATE_STREAM_1: u8 = 0xBD;
/// `padding_stream` stream id.
pub const PADDING_STREAM: u8 = 0xBE;
/// `private_stream_2` stream id.
pub const PRIVATE_STREAM_2: u8 = 0xBF;
/// `ECM_stream` stream id.
pub const ECM_STREAM: u8 = 0xF0;
/// `EMM_stream` stream id.
pub const EMM_STREAM: u8 = 0xF1;
/// DSMCC stream id.
pub const DSMCC_STREAM: u8 = 0xF2;
/// Rec. ITU-T H.222.1 type E stream id.
pub const H222_1_TYPE_E: u8 = 0xF8;
/// `program_stream_directory` stream id.
pub const PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

/// The audio stream number of `stream_id`, when it is an audio stream id
/// (`0xC0..=0xDF`).
#[must_use]
pub fn audio_stream_number(stream_id: u8) -> Option<u8> {
    (0xC0..=0xDF)
        .contains(&stream_id)
        .then(|| stream_id & 0b0001_1111)
}

/// The video stream number of `stream_id`, when it is a video stream id
/// (`0xE0..=0xEF`).
#[must_use]
pub fn video_stream_number(stream_id: u8) -> Option<u8> {
    (0xE0..=0xEF)
        .contains(&stream_id)
        .then(|| stream_id & 0b0000_1111)
}

/// The symbolic name of `stream_id`, or `None` for ids outside the PES
/// stream id space.
#[must_use]
pub fn stream_name(stream_id: u8) -> Option<String> {
    if let Some(number) = audio_stream_number(stream_id) {
        return Some(format!("audio stream number {number}"));
    }
    if let Some(number) = video_stream_number(stream_id) {
        return Some(format!("video stream number {number}"));
    }

    let name = match stream_id {
        PROGRAM_STREAM_MAP => "program_stream_map",
        PRIVATE_STREAM_1 => "private_stream_1",
        PADDING_STREAM => "padding_stream",
        PRIVATE_STREAM_2 => "private_stream_2",
        ECM_STREAM => "ECM_stream",
        EMM_STREAM => "EMM_stream",
        DSMCC_STREAM => {
            "Rec. ITU-T H.222.0 | ISO/IEC 13818-1 Annex A or ISO/IEC 13818-6_DSMCC_stream"
        }
        0xF3 => "ISO/IEC_13522_stream",
        0xF4 => "ISO/Rec. ITU-T H.222.1 type A",
        0xF5 => "ISO/Rec. ITU-T H.222.1 type B",
        0xF6 => "ISO/Rec. ITU-T H.222.1 type C",
        0xF7 => "ISO/Rec. ITU-T H.222.1 type D",
        H222_1_TYPE_E => "ISO/Rec. ITU-T H.222.1 type E",
        0xF9 => "ancillary_stream",
        0xFA => "ISO/IEC 14496-1_SL-packetized_stream",
        0xFB => "ISO/IEC 14496-1_FlexMux_stream",
        0xFC => "metadata stream",
        0xFD => "extended_stream_id",
        0xFE => "reserved data stream",
        PROGRAM_STREAM_DIRECTORY => "program_stream_directory",
        _ => return None,
    };
    Some(name.to_owned())
}

/// The stream id carrying the symbolic name `name`, or `None` when no id
/// matches.
#[must_use]
pub fn stream_id_by_name(name: &str) -> Option<u8> {
    (PROGRAM_STREAM_MAP..=PROGRAM_STREAM_DIRECTORY)
        .find(|&id| stream_name(id).as_deref() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        assert_eq!(stream_name(0xBD).as_deref(), Some("private_stream_1"));
        assert_eq!(stream_name(0xC2).as_deref(), Some("audio stream number 2"));
        assert_eq!(stream_name(0xE0).as_deref(), Some("video stream number 0"));
        assert_eq!(stream_name(0x42), None);

        assert_eq!(stream_id_by_name("video stream number 3"), Some(0xE3));
        assert_eq!(stream_id_by_name("audio stream number 31"), Some(0xDF));
        assert_eq!(stream_id_by_name("padding_stream"), Some(0xBE));
        assert_eq!(stream_id_by_name("zzz"), None);
    }

    #[test]
    fn stream_numbers_only_cover_their_ranges() {
        assert_eq!(audio_stream_number(0xC0), Some(0));
        assert_eq!(audio_stream_number(0xDF), Some(31));
        assert_eq!(audio_stream_number(0xE0), None);
        assert_eq!(video_stream_number(0xEF), Some(15));
        assert_eq!(video_stream_number(0xBD), None);
    }
}
