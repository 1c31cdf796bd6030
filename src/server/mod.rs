// Server module entry point
// Accept loop, graceful drain and background maintenance tasks

pub mod connection;
pub mod listener;
pub mod signal;

pub use listener::create_reusable_listener;

use crate::auth::IdentityResolver;
use crate::config::Config;
use crate::handler::Dispatcher;
use crate::logger;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve until SIGINT/SIGTERM, then drain
pub async fn run(listener: TcpListener, dispatcher: Arc<Dispatcher>, config: &Config) {
    run_until(listener, dispatcher, config, signal::shutdown_signal()).await;
}

/// Serve until `shutdown` resolves. The listener closes first, then open
/// connections get `server.shutdown_grace_secs` to finish.
pub async fn run_until(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    config: &Config,
    shutdown: impl Future<Output = ()>,
) {
    let graceful = GracefulShutdown::new();
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => connection::accept_connection(
                    stream,
                    peer_addr,
                    &dispatcher,
                    &config.performance,
                    &active_connections,
                    &graceful,
                ),
                Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
            },
            () = &mut shutdown => break,
        }
    }

    drop(listener);
    let grace = config.server.shutdown_grace();
    logger::log_shutdown_started(grace);
    if tokio::time::timeout(grace, graceful.shutdown()).await.is_ok() {
        tracing::info!("All connections closed");
    } else {
        logger::log_warning(&format!(
            "Grace period elapsed with {} connection(s) still open",
            active_connections.load(Ordering::SeqCst)
        ));
    }
}

/// Periodically drop handshakes whose client never came back
pub fn spawn_handshake_sweeper(resolver: Arc<IdentityResolver>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = resolver.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "Swept expired NTLM handshakes");
            }
        }
    })
}
