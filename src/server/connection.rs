// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use crate::config::PerformanceConfig;
use crate::handler::{self, Dispatcher};
use crate::logger;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;

/// Accept and process a connection, checking limits and logging.
///
/// The connection is registered with `graceful` so shutdown can wait for it.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: &Arc<Dispatcher>,
    performance: &PerformanceConfig,
    conn_counter: &Arc<AtomicUsize>,
    graceful: &GracefulShutdown,
) {
    // Increment first, then check, so concurrent accepts cannot overshoot
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    if let Some(max_conn) = performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    let mut builder = http1::Builder::new();
    builder.keep_alive(performance.keep_alive);

    let dispatcher = Arc::clone(dispatcher);
    let conn = builder.serve_connection(
        TokioIo::new(stream),
        service_fn(move |req| handler::handle_request(req, peer_addr, Arc::clone(&dispatcher))),
    );
    let conn = graceful.watch(conn);

    let timeout = performance.connection_timeout();
    let conn_counter = Arc::clone(conn_counter);
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                timeout.as_secs()
            )),
        }
        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
