//! Connection acceptors.
//!
//! One acceptor task runs per configured transport, publishing accepted
//! connections to the shared inbound queue. TLS handshakes are deferred to
//! the worker so they run under the connection's read deadline and a slow
//! handshake cannot stall the accept loop.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use crate::logging::LogChannel;

/// Transport a connection arrived on. Carried explicitly alongside the
/// stream so nothing downstream has to inspect stream types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Plain => "tcp",
            Transport::Tls => "tls",
        }
    }
}

/// A connection as published to the inbound queue. For TLS transports the
/// handshake has not happened yet; the worker drives it.
pub struct Inbound {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub transport: Transport,
    pub tls: Option<TlsAcceptor>,
}

/// Accepts connections until the listener fails, publishing each to the
/// queue. On accept failure the error is logged and the loop exits without
/// retrying; dropping its queue sender is the acceptor's end-of-stream
/// marker (workers observe queue closure once every acceptor is gone).
pub async fn accept_loop(
    listener: TcpListener,
    transport: Transport,
    tls: Option<TlsAcceptor>,
    queue: mpsc::Sender<Inbound>,
    log: LogChannel,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let inbound = Inbound { stream, peer, transport, tls: tls.clone() };
                if queue.send(inbound).await.is_err() {
                    // All workers are gone; nothing left to serve.
                    return;
                }
            }
            Err(e) => {
                log.error("error accepting connection", &e);
                return;
            }
        }
    }
}
