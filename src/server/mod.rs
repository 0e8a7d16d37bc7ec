//! Server orchestration.
//!
//! Acceptor tasks publish connections to a bounded inbound queue; a
//! fixed-size pool of workers drains it, acquiring an admission token per
//! connection before running the pipeline. The queue applies natural
//! backpressure: when it is full, acceptors wait for capacity.

pub mod limiter;
pub mod listener;
pub mod tls;

pub use limiter::Limiter;
pub use listener::{Inbound, Transport};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, timeout_at};

use crate::config::Config;
use crate::gzip::GzipPolicy;
use crate::http::connection::Connection;
use crate::logging::LogChannel;

/// Everything a worker needs, bundled once at startup and shared by
/// reference into every task. Read-only after construction.
pub struct ServerContext {
    pub config: Config,
    /// Canonicalized web root, the boundary every served path is checked
    /// against.
    pub web_root: PathBuf,
    pub gzip: GzipPolicy,
    pub limiter: Limiter,
    pub log: LogChannel,
}

impl ServerContext {
    pub fn new(config: Config, log: LogChannel) -> anyhow::Result<Self> {
        let web_root = std::fs::canonicalize(&config.server.web_root)
            .with_context(|| format!("web root {} cannot be resolved", config.server.web_root))?;
        let gzip = GzipPolicy::from_config(&config)?;
        let limiter = Limiter::from_rate(config.connections.max_connections);
        Ok(Self { config, web_root, gzip, limiter, log })
    }
}

/// Binds the listeners, spawns the acceptors and the worker pool, and
/// serves until every acceptor has stopped and the queue has drained.
/// Transport-setup errors abort startup before any connection is accepted.
pub async fn run(context: Arc<ServerContext>) -> anyhow::Result<()> {
    let log = context.log.clone();

    let plain = TcpListener::bind(context.config.bind_addr())
        .await
        .with_context(|| {
            format!("error when trying to listen at {}", context.config.bind_addr())
        })?;
    log.debug(
        "server started",
        vec![
            ("address", context.config.server.address.clone()),
            ("port", context.config.server.port.to_string()),
            ("root", context.config.server.web_root.clone()),
        ],
    );

    let (queue_tx, queue_rx) = mpsc::channel(context.config.connections.queue_depth.max(1));

    if context.config.tls.enabled {
        let acceptor = tls::build_acceptor(&context.config.tls)
            .context("fatal error while loading the x509 keypair")?;
        let tls_listener = TcpListener::bind(context.config.tls_bind_addr())
            .await
            .with_context(|| {
                format!("error when trying to listen at {}", context.config.tls_bind_addr())
            })?;
        log.debug(
            "serving with TLS enabled",
            vec![
                ("address", context.config.server.address.clone()),
                ("port", context.config.tls_bind_addr()),
            ],
        );
        tokio::spawn(listener::accept_loop(
            tls_listener,
            Transport::Tls,
            Some(acceptor),
            queue_tx.clone(),
            log.clone(),
        ));
    }

    tokio::spawn(listener::accept_loop(
        plain,
        Transport::Plain,
        None,
        queue_tx,
        log.clone(),
    ));

    let queue_rx = Arc::new(Mutex::new(queue_rx));
    let mut workers = Vec::with_capacity(context.config.worker_count());
    for _ in 0..context.config.worker_count() {
        workers.push(tokio::spawn(worker_loop(context.clone(), queue_rx.clone())));
    }
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}

/// One worker: dequeue, acquire an admission token, run the pipeline,
/// repeat. A failed connection never takes the worker down with it.
async fn worker_loop(context: Arc<ServerContext>, queue: Arc<Mutex<mpsc::Receiver<Inbound>>>) {
    loop {
        let inbound = queue.lock().await.recv().await;
        let Some(inbound) = inbound else {
            return;
        };

        context.limiter.take().await;
        handle(context.clone(), inbound).await;
    }
}

/// Completes the TLS handshake when the transport requires one, then hands
/// the stream to the pipeline. The handshake runs under the connection's
/// read deadline; its failure is a contained per-connection error.
async fn handle(context: Arc<ServerContext>, inbound: Inbound) {
    let Inbound { stream, peer, transport, tls } = inbound;

    match tls {
        None => Connection::new(stream, peer, transport, context).run().await,
        Some(acceptor) => {
            let deadline =
                Instant::now() + Duration::from_secs(context.config.connections.read_timeout);
            match timeout_at(deadline, acceptor.accept(stream)).await {
                Ok(Ok(stream)) => {
                    Connection::new(stream, peer, transport, context).run().await
                }
                Ok(Err(e)) => context.log.error("TLS handshake failed", &e),
                Err(e) => context.log.error("TLS handshake failed", &e),
            }
        }
    }
}
