//! Static file fallback
//!
//! When a static root is configured, unmatched routes fall through to
//! this handler before the final 404. Three knobs: directory listing,
//! symlink following, and jailing resolved paths to the root.

use crate::mime;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::debug;

/// A directory served below unmatched routes
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
    list_directories: bool,
    follow_symlinks: bool,
    jail_to_root: bool,
}

impl StaticDir {
    /// Serve files under `root` with listing off, symlinks refused and
    /// the jail on
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            list_directories: false,
            follow_symlinks: false,
            jail_to_root: true,
        }
    }

    /// Render directory listings instead of missing
    pub fn list_directories(mut self, enabled: bool) -> Self {
        self.list_directories = enabled;
        self
    }

    /// Follow symbolic links below the root
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = enabled;
        self
    }

    /// Refuse paths that resolve outside the root
    pub fn jail_to_root(mut self, enabled: bool) -> Self {
        self.jail_to_root = enabled;
        self
    }

    /// Serve a request path. `None` means the caller should 404.
    pub async fn serve(&self, request_path: &str) -> Option<Response> {
        let target = self.resolve(request_path).await?;

        let metadata = tokio::fs::metadata(&target).await.ok()?;
        if metadata.is_dir() {
            if !self.list_directories {
                return None;
            }
            return self.render_listing(request_path, &target).await;
        }

        let file = tokio::fs::File::open(&target).await.ok()?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static(mime::from_path(&target)),
            )
            .header(header::CONTENT_LENGTH, metadata.len())
            .body(Body::from_stream(ReaderStream::new(file)))
            .ok()?;
        Some(response)
    }

    /// Map a request path onto the filesystem, applying the symlink and
    /// jail knobs. Rejections resolve to `None`, indistinguishable from
    /// a missing file.
    async fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let mut target = self.root.clone();
        for segment in request_path.split('/').filter(|s| !s.is_empty()) {
            // Never let a path component climb out of the tree.
            if segment == ".." || segment.contains('\\') {
                return None;
            }
            target.push(segment);
        }

        if !self.follow_symlinks {
            let link_meta = tokio::fs::symlink_metadata(&target).await.ok()?;
            if link_meta.file_type().is_symlink() {
                debug!(path = %target.display(), "refusing symlink");
                return None;
            }
        }

        if self.jail_to_root {
            let canonical_root = tokio::fs::canonicalize(&self.root).await.ok()?;
            let canonical_target = tokio::fs::canonicalize(&target).await.ok()?;
            if !canonical_target.starts_with(&canonical_root) {
                debug!(path = %canonical_target.display(), "path escapes static root");
                return None;
            }
        }

        Some(target)
    }

    async fn render_listing(&self, request_path: &str, dir: &Path) -> Option<Response> {
        let mut entries = tokio::fs::read_dir(dir).await.ok()?;
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        // File names and the request path are attacker-influenced; they
        // must not reach the markup unescaped.
        let title = escape_html(request_path);
        let base = escape_html(request_path.trim_end_matches('/'));
        let items: String = names
            .iter()
            .map(|name| {
                let name = escape_html(name);
                format!("<li><a href=\"{base}/{name}\">{name}</a></li>")
            })
            .collect();
        let markup = format!(
            "<!DOCTYPE html><html><head><title>Index of {title}</title></head>\
             <body><h1>Index of {title}</h1><ul>{items}</ul></body></html>"
        );

        Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            )
            .body(Body::from(markup))
            .ok()
    }
}

/// Minimal HTML escape for listing markup: `&`, `<`, `>` and `"` (the
/// latter because names land inside an `href` attribute)
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
