//! Extension-based MIME lookup
//!
//! A small table covering the types the static handler and `send_file`
//! are realistically asked for; everything else is served as an opaque
//! byte stream.

use std::path::Path;

/// MIME type for a file path, from its extension
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    from_extension(ext.as_deref().unwrap_or(""))
}

/// MIME type for a bare extension (no dot)
pub fn from_extension(ext: &str) -> &'static str {
    match ext {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(from_extension("html"), "text/html; charset=utf-8");
        assert_eq!(from_extension("png"), "image/png");
    }

    #[test]
    fn extension_case_is_ignored() {
        assert_eq!(from_path(Path::new("LOGO.PNG")), "image/png");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(from_path(Path::new("data.bin")), "application/octet-stream");
        assert_eq!(from_path(Path::new("no_extension")), "application/octet-stream");
    }
}
