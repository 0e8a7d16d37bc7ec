use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};

use crate::files::{self, FileError};
use crate::http::parser::{ParseError, parse_request_head};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::logging::RequestSummary;
use crate::server::{ServerContext, Transport};

const SERVER_NAME: &str = "granite";
const CACHE_CONTROL: &str = "max-age=120";

/// One client connection, exclusively owned by the worker running it.
///
/// Generic over the stream so plain TCP and TLS connections share the
/// entire pipeline; the transport is an explicit tag used only for the log
/// summary.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    transport: Transport,
    context: Arc<ServerContext>,
    buffer: Vec<u8>,
}

/// What a finished pipeline looked like, for the per-connection summary.
struct Outcome {
    method: Option<Method>,
    uri: Option<String>,
    /// 0 when the connection was aborted before any response.
    status: u16,
}

impl Outcome {
    fn aborted() -> Self {
        Self { method: None, uri: None, status: 0 }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(
        stream: S,
        peer: SocketAddr,
        transport: Transport,
        context: Arc<ServerContext>,
    ) -> Self {
        Self {
            stream,
            peer,
            transport,
            context,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Runs the pipeline to completion. Every failure is contained here:
    /// logged, summarized, and the connection closed. Nothing propagates to
    /// the worker.
    pub async fn run(mut self) {
        let start = std::time::Instant::now();

        // Deadlines are fixed before any I/O; expiry aborts the connection.
        let timeouts = &self.context.config.connections;
        let read_deadline = Instant::now() + Duration::from_secs(timeouts.read_timeout);
        let write_deadline = Instant::now() + Duration::from_secs(timeouts.write_timeout);

        let outcome = self.process(read_deadline, write_deadline).await;

        self.context.log.request(RequestSummary {
            method: outcome
                .method
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()),
            uri: outcome.uri.unwrap_or_else(|| "-".to_string()),
            status: outcome.status,
            duration: start.elapsed(),
            remote: self.peer.to_string(),
            transport: self.transport.as_str(),
        });

        // Flush what the peer can still receive; dropping the stream closes
        // the socket on every exit path.
        let _ = self.stream.shutdown().await;
    }

    async fn process(&mut self, read_deadline: Instant, write_deadline: Instant) -> Outcome {
        let request = match self.read_request(read_deadline).await {
            Ok(request) => request,
            Err(e) => {
                self.context.log.error("error reading request", &e);
                return Outcome::aborted();
            }
        };

        let method = request.method.clone();
        let uri = request.target.clone();

        let status = if method != Method::GET {
            // The filesystem is never touched for a rejected method.
            self.send(&Response::method_not_allowed(), write_deadline).await;
            405
        } else {
            self.serve_file(&request, write_deadline).await
        };

        Outcome { method: Some(method), uri: Some(uri), status }
    }

    /// Reads exactly one request head from buffered input.
    async fn read_request(&mut self, deadline: Instant) -> anyhow::Result<Request> {
        loop {
            match parse_request_head(&self.buffer) {
                Ok((request, _)) => return Ok(request),
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }

            let mut chunk = [0u8; 1024];
            let n = timeout_at(deadline, self.stream.read(&mut chunk))
                .await
                .context("read deadline exceeded")?
                .context("read failed")?;
            if n == 0 {
                anyhow::bail!("connection closed before a complete request");
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Resolves the target under the web root and streams the file back.
    /// Returns the response status for the summary; 0 means the connection
    /// was aborted before headers were committed.
    async fn serve_file(&mut self, request: &Request, write_deadline: Instant) -> u16 {
        let context = self.context.clone();

        let resource = match files::open(&context.web_root, &request.target).await {
            Ok(resource) => resource,
            Err(e @ FileError::NotFound) => {
                context.log.error("file not found", &e);
                self.send(&Response::not_found(), write_deadline).await;
                return 404;
            }
            Err(e @ FileError::Stat(_)) => {
                context.log.error("error during file stat", &e);
                self.send(&Response::internal_server_error(), write_deadline).await;
                return 500;
            }
        };

        let size = resource.metadata.len();
        let eligible = context.gzip.eligible(
            request.accepts_gzip(),
            size,
            files::file_name(&resource.path),
        );

        let modified = resource
            .metadata
            .modified()
            .unwrap_or_else(|_| SystemTime::now());
        let head = Response::builder()
            .status(StatusCode::Ok)
            .header("Content-Type", files::mime_type(&resource.path))
            .header("Cache-Control", CACHE_CONTROL)
            .header("Connection", "close")
            .header("Last-Modified", httpdate::fmt_http_date(modified))
            .header("Date", httpdate::fmt_http_date(SystemTime::now()))
            .header("Server", SERVER_NAME);

        let mut file = resource.file;

        if eligible {
            // The whole file is compressed up front: Content-Length must be
            // known before the header block is flushed, and there is no
            // chunked fallback. A failure here happens before any header is
            // committed, so the connection is closed without a response.
            let mut raw = Vec::with_capacity(size as usize);
            if let Err(e) = file.read_to_end(&mut raw).await {
                context.log.error("error reading file", &e);
                return 0;
            }
            let compressed = match context.gzip.compress(&raw) {
                Ok(compressed) => compressed,
                Err(e) => {
                    context.log.error("error during gzip compression", &e);
                    return 0;
                }
            };

            let response = head
                .header("Content-Encoding", "gzip")
                .header("Content-Length", compressed.len().to_string())
                .build();
            if self.write_all(&response.head_bytes(), write_deadline).await.is_ok() {
                let _ = self.write_all(&compressed, write_deadline).await;
            }
        } else {
            let response = head
                .header("Content-Encoding", "identity")
                .header("Content-Length", size.to_string())
                .build();
            // Headers first, then the body is streamed straight from the
            // file without buffering it.
            if self.write_all(&response.head_bytes(), write_deadline).await.is_ok() {
                match timeout_at(write_deadline, tokio::io::copy(&mut file, &mut self.stream))
                    .await
                {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => context.log.error("error writing response", &e),
                    Err(e) => context.log.error("error writing response", &e),
                }
            }
        }

        200
    }

    /// Serializes and writes a complete response.
    async fn send(&mut self, response: &Response, write_deadline: Instant) {
        let _ = self.write_all(&response.to_bytes(), write_deadline).await;
    }

    async fn write_all(&mut self, buf: &[u8], deadline: Instant) -> Result<(), ()> {
        match timeout_at(deadline, self.stream.write_all(buf)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.context.log.error("error writing response", &e);
                Err(())
            }
            Err(e) => {
                self.context.log.error("error writing response", &e);
                Err(())
            }
        }
    }
}
