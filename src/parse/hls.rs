use super::codec::{parse_audio_codec, parse_video_codec, pixel_format};
use super::{bit_rate_kbps, ProbeOutput, StreamInfo, StreamType};
use crate::error::{ProbeError, Result};
use regex::Regex;
use std::collections::HashMap;

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

/// `NAME=value` or `NAME="quoted, value"` pairs of an attribute list
const ATTRIBUTE_PATTERN: &str = r#"([A-Z0-9-]+)=("[^"]*"|[^,]*)"#;

fn attributes<'a>(pattern: &Regex, list: &'a str) -> HashMap<&'a str, &'a str> {
    pattern
        .captures_iter(list)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str().trim().trim_matches('"');
            Some((name, value))
        })
        .collect()
}

/// Extract streams from an HLS master playlist.
///
/// Each `#EXT-X-STREAM-INF` variant yields a video stream when it declares a
/// `RESOLUTION`, followed by one audio stream.
pub fn parse_hls(content: &str, url: &str) -> Result<ProbeOutput> {
    let pattern = Regex::new(ATTRIBUTE_PATTERN)
        .map_err(|e| ProbeError::parsing(url, "HLS", e.to_string()))?;

    let mut streams = Vec::new();

    for line in content.lines() {
        let Some(list) = line.trim().strip_prefix(STREAM_INF) else {
            continue;
        };
        let attrs = attributes(&pattern, list);
        let attr = |name: &str| attrs.get(name).copied().filter(|v| !v.is_empty());
        let codecs = attr("CODECS").unwrap_or_default();

        if let Some(resolution) = attr("RESOLUTION") {
            streams.push(StreamInfo {
                stream_id: format!("0:{}", streams.len()),
                pix_fmt: Some(pixel_format(codecs).to_string()),
                resolution: Some(resolution.to_string()),
                frame_rate: Some(attr("FRAME-RATE").unwrap_or("30").to_string()),
                bit_rate: attr("BANDWIDTH").and_then(bit_rate_kbps),
                ..StreamInfo::new(StreamType::Video, parse_video_codec(codecs))
            });
        }

        streams.push(StreamInfo {
            stream_id: format!("0:{}", streams.len()),
            ..StreamInfo::audio(parse_audio_codec(codecs), "48000")
        });
    }

    Ok(ProbeOutput { streams })
}
