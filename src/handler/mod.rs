//! Request handler module
//!
//! Leaf handlers reached through the route table, plus the dispatcher that
//! fronts them.

pub mod router;
pub mod static_files;
pub mod user_info;

use crate::routing::RequestContext;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

pub use router::{handle_request, Dispatcher};
pub use static_files::StaticMount;
pub use user_info::{AuthenticatedAccount, UserInfo};

/// Terminal route targets
#[derive(Debug)]
pub enum Handler {
    Mount(StaticMount),
    UserInfo(UserInfo),
}

impl Handler {
    pub async fn serve(&self, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        match self {
            Self::Mount(mount) => mount.serve(ctx).await,
            Self::UserInfo(user_info) => user_info.serve(ctx),
        }
    }
}
