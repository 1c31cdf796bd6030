//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method
//! validation, route table descent and access logging.

use super::{AuthenticatedAccount, Handler, StaticMount, UserInfo};
use crate::auth::{Authorizer, IdentityResolver};
use crate::config::{Config, LoggingConfig};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing::{RequestContext, RouteTable};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Route table plus the per-request concerns around it
#[derive(Debug)]
pub struct Dispatcher {
    routes: RouteTable,
    logging: LoggingConfig,
}

impl Dispatcher {
    pub fn new(routes: RouteTable, logging: LoggingConfig) -> Self {
        Self { routes, logging }
    }

    /// One mount per configured directory, then `/user/info`
    pub fn from_config(
        config: &Config,
        resolver: Arc<IdentityResolver>,
        gate: Arc<dyn Authorizer>,
    ) -> Self {
        let mut routes = RouteTable::new();
        for mount in &config.routes.mounts {
            routes.register(
                mount.name.clone(),
                Handler::Mount(StaticMount::new(
                    &mount.path,
                    config.routes.index_files.clone(),
                )),
            );
        }

        let mut user = RouteTable::new();
        user.register("info", Handler::UserInfo(UserInfo::new(resolver, gate)));
        routes.register("user", user);
        tracing::debug!(routes = routes.len(), "Route table built");

        Self::new(routes, config.logging.clone())
    }

    pub async fn dispatch(&self, parts: &Parts, remote_addr: SocketAddr) -> Response<Full<Bytes>> {
        let started = Instant::now();
        let response = self.respond(parts, remote_addr).await;
        if self.logging.access_log {
            log_access(parts, remote_addr, &response, started, &self.logging);
        }
        response
    }

    async fn respond(&self, parts: &Parts, remote_addr: SocketAddr) -> Response<Full<Bytes>> {
        if let Some(response) = check_http_method(&parts.method) {
            return response;
        }

        let mut ctx = RequestContext::new(parts, remote_addr);
        match self.routes.route(&mut ctx) {
            Some(handler) => handler.serve(&ctx).await,
            None => http::build_404_response(),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, _) = req.into_parts();
    Ok(dispatcher.dispatch(&parts, remote_addr).await)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn log_access(
    parts: &Parts,
    remote_addr: SocketAddr,
    response: &Response<Full<Bytes>>,
    started: Instant,
    logging: &LoggingConfig,
) {
    let header = |name: &HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header(&REFERER);
    entry.user_agent = header(&USER_AGENT);
    entry.remote_user = response
        .extensions()
        .get::<AuthenticatedAccount>()
        .map(|account| account.0.clone());
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, logging.access_log_format);
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
