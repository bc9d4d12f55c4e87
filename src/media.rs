//! Object naming and content-type handling for photos.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Final component of a client-supplied file name; directories are dropped.
pub fn base_file_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or_default()
}

/// Build the object name for an upload: the client's file name followed by a unique id.
pub fn object_key(file_name: &str, id: &uuid::Uuid) -> String {
    format!("{file_name}{id}")
}

/// Whether a declared content type is an image (`image/*`).
pub fn is_image(content_type: &str) -> bool {
    content_type
        .split('/')
        .next()
        .map(|primary| primary.trim().eq_ignore_ascii_case("image"))
        .unwrap_or(false)
}

/// Percent-escaped `/<bucket>/<name>` path returned to clients after an upload.
pub fn escaped_pathname(bucket: &str, name: &str) -> String {
    format!(
        "/{}/{}",
        utf8_percent_encode(bucket, PATH_SEGMENT),
        utf8_percent_encode(name, PATH_SEGMENT)
    )
}

/// Detect a content type from the leading bytes of a file.
pub fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 8 && data[0..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }
    if data.len() >= 3 && data[0..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if data.starts_with(b"BM") && data.len() >= 14 {
        return Some("image/bmp");
    }
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return Some("image/tiff");
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some("image/x-icon");
    }
    if data.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }

    // SVG is text; look for the root element near the start
    let head = &data[..data.len().min(512)];
    if let Ok(text) = std::str::from_utf8(head) {
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            return Some("image/svg+xml");
        }
    }

    None
}

/// Pick the content type to serve an object with.
///
/// Order: the type stored with the object (unless empty or generic), the sniffed
/// type, a guess from the name's extension, then `application/octet-stream`.
pub fn resolve_content_type(stored: Option<&str>, key: &str, data: &[u8]) -> String {
    stored
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && !ct.eq_ignore_ascii_case(OCTET_STREAM))
        .map(|ct| ct.to_string())
        .or_else(|| sniff_content_type(data).map(|ct| ct.to_string()))
        .or_else(|| mime_guess::from_path(key).first().map(|m| m.to_string()))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
