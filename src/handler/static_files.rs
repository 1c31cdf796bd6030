//! Static file serving module
//!
//! A mount maps the URL prefix consumed by routing onto a directory. The
//! unconsumed segments are cleaned lexically, joined under the mount root and
//! canonicalized; anything that resolves outside the canonical root is
//! refused. Missing files, and directories without an index file, fall back
//! to the mount root.

use crate::http::{self, mime};
use crate::logger;
use crate::routing::RequestContext;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory served under one route prefix
#[derive(Debug, Clone)]
pub struct StaticMount {
    root: PathBuf,
    index_files: Vec<String>,
}

impl StaticMount {
    pub fn new(root: impl Into<PathBuf>, index_files: Vec<String>) -> Self {
        Self {
            root: root.into(),
            index_files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn serve(&self, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        let root = match fs::canonicalize(&self.root).await {
            Ok(root) => root,
            Err(e) => {
                logger::log_warning(&format!(
                    "Mount directory not found or inaccessible '{}': {e}",
                    self.root.display()
                ));
                return http::build_404_response();
            }
        };

        let Some(decoded) = decode_segments(ctx.remaining()) else {
            logger::log_warning(&format!("Rejected undecodable path: {}", ctx.path()));
            return http::build_404_response();
        };
        let relative = clean_relative(&decoded);
        let target = match fs::canonicalize(root.join(&relative)).await {
            Ok(path) if path.starts_with(&root) => path,
            Ok(path) => {
                logger::log_warning(&format!(
                    "Path traversal attempt blocked: {} -> {}",
                    ctx.path(),
                    path.display()
                ));
                return http::build_404_response();
            }
            // Missing resources fall back to the mount root
            Err(_) => root.clone(),
        };

        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => serve_file(&target, ctx.is_head).await,
            Ok(meta) if meta.is_dir() => match self.find_index(&target).await {
                Some(index) => serve_file(&index, ctx.is_head).await,
                None if target == root => serve_listing(&root, ctx).await,
                None => self.serve_root(&root, ctx).await,
            },
            _ => self.serve_root(&root, ctx).await,
        }
    }

    async fn serve_root(&self, root: &Path, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        match self.find_index(root).await {
            Some(index) => serve_file(&index, ctx.is_head).await,
            None => serve_listing(root, ctx).await,
        }
    }

    async fn find_index(&self, dir: &Path) -> Option<PathBuf> {
        for name in &self.index_files {
            let candidate = dir.join(name);
            if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                return Some(candidate);
            }
        }
        None
    }
}

async fn serve_file(path: &Path, is_head: bool) -> Response<Full<Bytes>> {
    match fs::read(path).await {
        Ok(content) => http::build_file_response(content, mime::content_type_for(path), is_head),
        Err(e) => {
            logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
            http::build_500_response("500 Internal Server Error")
        }
    }
}

async fn serve_listing(dir: &Path, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
    match read_listing(dir).await {
        Ok(entries) => http::build_html_response(render_listing(ctx.base_path(), &entries), ctx.is_head),
        Err(e) => {
            logger::log_error(&format!("Failed to list directory '{}': {e}", dir.display()));
            http::build_500_response("500 Internal Server Error")
        }
    }
}

/// Percent-decode each segment. A segment that is not UTF-8, or that decodes
/// to a separator or NUL, fails the whole path.
fn decode_segments(segments: &[&str]) -> Option<Vec<String>> {
    segments
        .iter()
        .map(|segment| {
            let decoded = urlencoding::decode(segment).ok()?;
            if decoded.contains(['/', '\\', '\0']) {
                return None;
            }
            Some(decoded.into_owned())
        })
        .collect()
}

/// Resolve `.` and `..` without touching the filesystem; `..` never climbs
/// above the mount root
fn clean_relative<S: AsRef<str>>(segments: &[S]) -> PathBuf {
    let mut parts: Vec<&str> = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment.as_ref() {
            "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.iter().collect()
}

/// Entry names, directories suffixed with `/`, sorted
async fn read_listing(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut reader = fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();
    Ok(entries)
}

fn render_listing(base_path: &str, entries: &[String]) -> String {
    let title = escape_html(&format!("{base_path}/"));
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<pre>\n"
    );
    for name in entries {
        let (stem, slash) = name.strip_suffix('/').map_or((name.as_str(), ""), |s| (s, "/"));
        let _ = writeln!(
            html,
            "<a href=\"{}/{}{slash}\">{}</a>",
            escape_html(base_path),
            urlencoding::encode(stem),
            escape_html(name)
        );
    }
    html.push_str("</pre>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
