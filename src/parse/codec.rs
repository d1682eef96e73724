//! RFC 6381 codec string mapping.

/// Video codec name for a codec string; `h264` when unrecognized
pub fn parse_video_codec(codecs: &str) -> &'static str {
    if codecs.contains("avc1") {
        "h264"
    } else if codecs.contains("hev1") || codecs.contains("hvc1") {
        "hevc"
    } else if codecs.contains("vp09") {
        "vp9"
    } else if codecs.contains("av01") {
        "av1"
    } else {
        "h264"
    }
}

/// Audio codec name for a codec string; `aac` when unrecognized
pub fn parse_audio_codec(codecs: &str) -> &'static str {
    if codecs.contains("ec-3") {
        "eac3"
    } else {
        "aac"
    }
}

/// Pixel format implied by the codec profile.
///
/// H.264 High 10 (`avc1.640028`, `avc1.640032`), HEVC Main 10 (`*.2.4`) and
/// VP9 profile 2 are 10-bit; everything else is `yuv420p`.
pub fn pixel_format(codecs: &str) -> &'static str {
    let ten_bit = if codecs.contains("avc1") {
        codecs.contains("avc1.640028") || codecs.contains("avc1.640032")
    } else if codecs.contains("hev1") || codecs.contains("hvc1") {
        codecs.contains("hev1.2.4") || codecs.contains("hvc1.2.4")
    } else {
        codecs.contains("vp09.02")
    };

    if ten_bit {
        "yuv420p10le"
    } else {
        "yuv420p"
    }
}
