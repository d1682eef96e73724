use super::codec::{parse_audio_codec, parse_video_codec, pixel_format};
use super::{bit_rate_kbps, ProbeOutput, StreamInfo, StreamType};
use crate::error::{ProbeError, Result};
use roxmltree::{Document, Node};

const TRICK_MODE_SCHEME: &str = "http://dashif.org/guidelines/trickmode";

/// Missing attributes read as empty strings
fn attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or_default()
}

/// Element match on local name, ignoring the MPD namespace
fn is_element(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn is_trick_mode(set: Node) -> bool {
    set.children()
        .filter(|n| is_element(*n, "EssentialProperty"))
        .any(|prop| attr(prop, "schemeIdUri") == TRICK_MODE_SCHEME)
}

fn classify(set: Node) -> Option<StreamType> {
    let content_type = attr(set, "contentType");
    let mime_type = attr(set, "mimeType");

    if content_type == "video" || mime_type.contains("video") {
        Some(StreamType::Video)
    } else if content_type == "audio" || mime_type.contains("audio") {
        Some(StreamType::Audio)
    } else if content_type == "text" || mime_type.contains("application") {
        Some(StreamType::Subtitle)
    } else {
        None
    }
}

/// Representation codecs, falling back to the adaptation set's
fn codecs<'a>(set: Node<'a, '_>, rep: Node<'a, '_>) -> &'a str {
    match attr(rep, "codecs") {
        "" => attr(set, "codecs"),
        codecs => codecs,
    }
}

/// Representation, then set `frameRate`, then `maxFrameRate`, else 25;
/// a `/1`-style denominator is dropped
fn frame_rate(set: Node, rep: Node) -> String {
    let rate = [
        attr(rep, "frameRate"),
        attr(set, "frameRate"),
        attr(set, "maxFrameRate"),
    ]
    .into_iter()
    .find(|r| !r.is_empty())
    .unwrap_or("25");

    rate.split('/').next().unwrap_or(rate).to_string()
}

fn video_stream(set: Node, rep: Node) -> StreamInfo {
    let codecs = codecs(set, rep);
    let (width, height) = (attr(rep, "width"), attr(rep, "height"));

    StreamInfo {
        pix_fmt: Some(pixel_format(codecs).to_string()),
        resolution: (!width.is_empty() && !height.is_empty())
            .then(|| format!("{}x{}", width, height)),
        frame_rate: Some(frame_rate(set, rep)),
        ..StreamInfo::new(StreamType::Video, parse_video_codec(codecs))
    }
}

fn audio_stream(set: Node, rep: Node) -> StreamInfo {
    let sample_rate = match attr(rep, "audioSamplingRate") {
        "" => "48000",
        rate => rate,
    };

    StreamInfo {
        bit_rate: bit_rate_kbps(attr(rep, "bandwidth")),
        language: non_empty(attr(set, "lang")),
        ..StreamInfo::audio(parse_audio_codec(codecs(set, rep)), sample_rate)
    }
}

fn subtitle_stream(set: Node, rep: Node) -> StreamInfo {
    let codec = if attr(rep, "codecs").contains("wvtt") {
        "webvtt"
    } else {
        "stpp"
    };

    StreamInfo {
        bit_rate: bit_rate_kbps(attr(rep, "bandwidth")),
        language: non_empty(attr(set, "lang")),
        ..StreamInfo::new(StreamType::Subtitle, codec)
    }
}

/// Extract streams from a DASH MPD.
///
/// Trick-play adaptation sets are skipped. Malformed XML or a root element
/// other than `MPD` is a `Parsing` error.
pub fn parse_mpd(content: &str, url: &str) -> Result<ProbeOutput> {
    let doc = Document::parse(content).map_err(|e| ProbeError::parsing(url, "MPD", e.to_string()))?;

    let root = doc.root_element();
    if !is_element(root, "MPD") {
        return Err(ProbeError::parsing(
            url,
            "MPD",
            format!("expected <MPD> root element, found <{}>", root.tag_name().name()),
        ));
    }

    let mut video = Vec::new();
    let mut audio = Vec::new();
    let mut subtitles = Vec::new();

    let sets = root
        .children()
        .filter(|n| is_element(*n, "Period"))
        .flat_map(|period| period.children().filter(|n| is_element(*n, "AdaptationSet")))
        .filter(|set| !is_trick_mode(*set));

    for set in sets {
        let Some(stream_type) = classify(set) else {
            continue;
        };
        for rep in set.children().filter(|n| is_element(*n, "Representation")) {
            match stream_type {
                StreamType::Video => video.push(video_stream(set, rep)),
                StreamType::Audio => audio.push(audio_stream(set, rep)),
                StreamType::Subtitle => subtitles.push(subtitle_stream(set, rep)),
            }
        }
    }

    let mut streams: Vec<StreamInfo> = video.into_iter().chain(audio).chain(subtitles).collect();
    for (index, stream) in streams.iter_mut().enumerate() {
        stream.stream_id = match &stream.language {
            Some(lang) => format!("0:{}({})", index, lang),
            None => format!("0:{}", index),
        };
    }

    Ok(ProbeOutput { streams })
}
