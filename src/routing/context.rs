//! Per-request routing state

use super::segments::split_segments;
use hyper::header::HeaderName;
use hyper::http::request::Parts;
use hyper::Method;
use std::net::SocketAddr;

/// Request context encapsulating information needed for request processing.
///
/// Routing consumes `segments` head-first; every consumed segment is
/// appended to `base_path` so leaf handlers know where they are mounted.
#[derive(Debug)]
pub struct RequestContext<'a> {
    pub parts: &'a Parts,
    pub remote_addr: SocketAddr,
    pub is_head: bool,
    base_path: String,
    segments: Vec<&'a str>,
    consumed: usize,
}

impl<'a> RequestContext<'a> {
    pub fn new(parts: &'a Parts, remote_addr: SocketAddr) -> Self {
        Self {
            parts,
            remote_addr,
            is_head: parts.method == Method::HEAD,
            base_path: String::new(),
            segments: split_segments(parts.uri.path()),
            consumed: 0,
        }
    }

    pub fn path(&self) -> &'a str {
        self.parts.uri.path()
    }

    /// Prefix consumed by routing so far, e.g. `/user`
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Segments not yet consumed by routing
    pub fn remaining(&self) -> &[&'a str] {
        &self.segments[self.consumed..]
    }

    pub fn head(&self) -> Option<&'a str> {
        self.segments.get(self.consumed).copied()
    }

    /// Move the head segment into the consumed prefix
    pub(crate) fn advance(&mut self) {
        if let Some(head) = self.head() {
            self.base_path.push('/');
            self.base_path.push_str(head);
            self.consumed += 1;
        }
    }

    /// Header value as text; values that are not visible ASCII read as absent
    pub fn header(&self, name: &HeaderName) -> Option<&'a str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
