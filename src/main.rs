use std::sync::Arc;

mod auth;
mod config;
mod handler;
mod http;
mod logger;
mod routing;
mod server;

use auth::ntlm::ServerCredentials;
use auth::IdentityResolver;
use handler::Dispatcher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let cfg = config::Config::load()?;
    logger::init(&cfg.logging)?;

    // Bad account entries are fatal before anything is bound
    let credentials = Arc::new(ServerCredentials::acquire(&cfg.auth).inspect_err(|e| {
        logger::log_error(&format!("Failed to acquire NTLM server credentials: {e}"));
    })?);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!(workers, "Using configured worker threads");
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg, credentials))
}

async fn async_main(cfg: config::Config, credentials: Arc<ServerCredentials>) -> Result<(), BoxError> {
    let addr = cfg.socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let resolver = Arc::new(IdentityResolver::new(credentials, cfg.auth.handshake_ttl()));
    let gate = auth::authorizer_from_config(&cfg.auth);
    let dispatcher = Arc::new(Dispatcher::from_config(&cfg, Arc::clone(&resolver), gate));
    let sweeper = server::spawn_handshake_sweeper(resolver, cfg.auth.sweep_interval());

    logger::log_server_start(&addr, &cfg);
    server::run(listener, dispatcher, &cfg).await;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}
