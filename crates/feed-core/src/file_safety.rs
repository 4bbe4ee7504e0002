//! Filename sanitization and content-type detection for stored assets.
//!
//! Filenames end up inside managed URLs (`/api/files/uploads/<id>/<file>`)
//! and on disk, so they are reduced to a conservative character set.
//! Content types are taken from magic bytes first, extensions second.

use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9._-]").expect("static filename pattern is valid")
});

const MAX_FILENAME_LEN: usize = 255;

/// Reduce a filename to `[a-zA-Z0-9._-]`.
///
/// Path components are removed, whitespace becomes `_`, every other
/// character outside the safe set is dropped, and leading dots are stripped
/// so the result can never be hidden or refer to a parent directory.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let spaced: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&spaced, "");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "unnamed_file".to_string();
    }

    // Truncate if too long (preserve extension)
    if cleaned.len() > MAX_FILENAME_LEN {
        if let Some(dot_pos) = cleaned.rfind('.') {
            let ext = &cleaned[dot_pos..];
            if ext.len() < MAX_FILENAME_LEN {
                let stem = &cleaned[..MAX_FILENAME_LEN - ext.len()];
                return format!("{}{}", stem, ext);
            }
        }
        return cleaned[..MAX_FILENAME_LEN].to_string();
    }

    cleaned.to_string()
}

/// Whether the filename carries a non-empty extension.
pub fn has_extension(filename: &str) -> bool {
    matches!(filename.rsplit_once('.'), Some((stem, ext)) if !stem.is_empty() && !ext.is_empty())
}

/// File extension for the media types remote servers commonly send.
///
/// Parameters such as `; charset=binary` are ignored.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}

/// File extension guessed from magic bytes.
pub fn sniff_extension(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.extension())
}

/// Detect the content type to serve a stored file with.
///
/// Priority: magic bytes, then the filename extension, then the claimed type,
/// then `application/octet-stream`.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: Option<&str>) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if let Some((_, ext)) = filename.rsplit_once('.') {
        if let Some(mime) = mime_from_extension(ext) {
            return mime.to_string();
        }
    }

    match claimed.map(str::trim) {
        Some(claimed) if !claimed.is_empty() => claimed.to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

/// Text formats have no magic bytes and are trusted by extension.
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "txt" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "svg" => Some("image/svg+xml"),
        "json" => Some("application/json"),
        "csv" => Some("text/csv"),
        _ => None,
    }
}
