// src/embed.rs
//! Resolves raw video links into URLs the video host lets us embed.

const VIDEO_ID_LEN: usize = 11;
const EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// Length of the video-id marker starting at byte `i`, if any.
///
/// Recognized markers: `youtu.be/` (any character in place of the dot),
/// `v/`, `u/<word char>/`, `embed/`, `watch?v=` and `&v=`.
fn marker_len_at(bytes: &[u8], i: usize) -> Option<usize> {
    let rest = &bytes[i..];
    if rest.len() >= 9 && rest.starts_with(b"youtu") && &rest[6..9] == b"be/" {
        return Some(9);
    }
    if rest.starts_with(b"v/") {
        return Some(2);
    }
    if rest.len() >= 4
        && rest.starts_with(b"u/")
        && (rest[2].is_ascii_alphanumeric() || rest[2] == b'_')
        && rest[3] == b'/'
    {
        return Some(4);
    }
    ["embed/", "watch?v=", "&v="]
        .iter()
        .find(|marker| rest.starts_with(marker.as_bytes()))
        .map(|marker| marker.len())
}

/// Extracts the 11-character video id from a video URL.
///
/// The last marker in the URL wins. The id runs up to the next `#`, `&` or `?`.
pub fn extract_video_id(url: &str) -> Option<&str> {
    let bytes = url.as_bytes();
    let id_start = (0..bytes.len())
        .rev()
        .find_map(|i| marker_len_at(bytes, i).map(|len| i + len))?;
    let tail = &url[id_start..];
    let id_end = tail.find(['#', '&', '?']).unwrap_or(tail.len());
    let id = &tail[..id_end];
    (id.chars().count() == VIDEO_ID_LEN).then_some(id)
}

/// Turns a video link into an embeddable player URL for `origin`, with autoplay off.
///
/// Links that carry no recognizable video id are returned unchanged.
pub fn resolve_embed_url(url: &str, origin: &str) -> String {
    match extract_video_id(url) {
        Some(id) => format!("{EMBED_BASE}{id}?autoplay=0&origin={origin}"),
        None => {
            tracing::debug!("No video id found in '{}', using it as is", url);
            url.to_string()
        }
    }
}
