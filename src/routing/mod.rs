//! Routing module
//!
//! Segment-based dispatch:
//! - Split the request path into non-empty segments
//! - Match the head segment against an ordered table by exact equality
//! - Descend into nested tables until a handler is reached

mod context;
mod segments;
mod table;

pub use context::RequestContext;
pub use table::RouteTable;
