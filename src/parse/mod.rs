//! Stream extraction from DASH and HLS manifests.
//!
//! Output mirrors ffprobe's stream listing: videos first, then audio, then
//! subtitles, numbered `0:N` with an optional `(lang)` suffix.

mod codec;
mod hls;
mod mpd;

pub use codec::{parse_audio_codec, parse_video_codec, pixel_format};
pub use hls::parse_hls;
pub use mpd::parse_mpd;

use serde::{Deserialize, Serialize};

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
}

/// One stream advertised by a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream_id: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl StreamInfo {
    fn new(stream_type: StreamType, codec: impl Into<String>) -> Self {
        Self {
            stream_id: String::new(),
            stream_type,
            codec: codec.into(),
            pix_fmt: None,
            resolution: None,
            frame_rate: None,
            bit_rate: None,
            channels: None,
            sample_fmt: None,
            sample_rate: None,
            language: None,
        }
    }

    /// Stereo float-planar audio at `sample_rate` Hz
    fn audio(codec: impl Into<String>, sample_rate: &str) -> Self {
        Self {
            channels: Some("stereo".to_string()),
            sample_fmt: Some("fltp".to_string()),
            sample_rate: Some(format!("{} Hz", sample_rate)),
            ..Self::new(StreamType::Audio, codec)
        }
    }
}

/// Streams extracted from one manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutput {
    pub streams: Vec<StreamInfo>,
}

impl ProbeOutput {
    /// Pretty-printed JSON with four-space indentation
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn count(&self, stream_type: StreamType) -> usize {
        self.streams
            .iter()
            .filter(|s| s.stream_type == stream_type)
            .count()
    }
}

/// `"{bandwidth / 1000} kb/s"`, or `None` when `bandwidth` is not an integer
fn bit_rate_kbps(bandwidth: &str) -> Option<String> {
    bandwidth
        .trim()
        .parse::<u64>()
        .ok()
        .map(|bps| format!("{} kb/s", bps / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_rate_kbps() {
        assert_eq!(bit_rate_kbps("128000").as_deref(), Some("128 kb/s"));
        assert_eq!(bit_rate_kbps("999").as_deref(), Some("0 kb/s"));
        assert_eq!(bit_rate_kbps(""), None);
        assert_eq!(bit_rate_kbps("fast"), None);
    }

    #[test]
    fn test_output_json_shape() {
        let mut stream = StreamInfo::audio("aac", "44100");
        stream.stream_id = "0:0(en)".to_string();
        stream.language = Some("en".to_string());
        let output = ProbeOutput {
            streams: vec![stream],
        };

        let json = output.to_json().unwrap();
        assert!(json.starts_with("{\n    \"streams\": ["));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let stream = &value["streams"][0];
        assert_eq!(stream["type"], "Audio");
        assert_eq!(stream["sample_rate"], "44100 Hz");
        assert_eq!(stream["stream_id"], "0:0(en)");
        assert!(stream.get("resolution").is_none());
        assert!(stream.get("pix_fmt").is_none());
    }
}
