//! Path segment splitting

/// Split a request path into its non-empty `/`-separated segments.
///
/// Leading, trailing and repeated separators produce no segments, so `/`
/// yields an empty list and `/a//b/` yields `[a, b]`.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
