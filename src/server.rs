use crate::api::{self, ApiResponse};
use crate::storage::BoxedStore;
use anyhow::{Context, Result, anyhow};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server};

/// Largest request body accepted; anything bigger is answered with 413.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// HTTP front end. Worker threads share the listening socket; each one owns
/// its own store connection, so the store itself needs no locking.
pub struct ApiServer {
    server: Arc<Server>,
}

impl ApiServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| anyhow!("binding {addr}: {e}"))?;
        Ok(Self {
            server: Arc::new(server),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serves until the listener fails. `connect` is called once per worker
    /// before it starts accepting requests, and again whenever that worker's
    /// store reports an unhealthy connection.
    pub fn run<F>(self, workers: usize, connect: F) -> Result<()>
    where
        F: Fn() -> Result<BoxedStore> + Send + Sync + 'static,
    {
        let connect = Arc::new(connect);
        let mut handles = Vec::with_capacity(workers.max(1));

        for worker in 0..workers.max(1) {
            let server = Arc::clone(&self.server);
            let connect = Arc::clone(&connect);
            let handle = thread::Builder::new()
                .name(format!("http-worker-{worker}"))
                .spawn(move || -> Result<()> {
                    let mut store =
                        connect().with_context(|| format!("worker {worker}: opening store"))?;
                    tracing::debug!(worker, "worker ready");
                    serve_requests(&server, &mut store, &*connect);
                    Ok(())
                })
                .context("Spawning HTTP worker")?;
            handles.push(handle);
        }

        if let Some(addr) = self.local_addr() {
            tracing::info!(%addr, workers = handles.len(), "listening");
        }

        let mut first_err = None;
        for handle in handles {
            let outcome = handle
                .join()
                .map_err(|_| anyhow!("HTTP worker panicked"))
                .and_then(|r| r);
            if let Err(e) = outcome {
                tracing::error!(err = %e, "worker stopped");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn serve_requests<F>(server: &Server, store: &mut BoxedStore, connect: &F)
where
    F: Fn() -> Result<BoxedStore>,
{
    loop {
        let request = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(err = %e, "accept failed; worker exiting");
                return;
            }
        };
        ensure_connected(store, connect);
        respond(request, store);
    }
}

/// Swaps in a fresh store when the current one lost its connection. A failed
/// reconnect keeps the old store; the request then fails with a 500 and the
/// next request tries again.
fn ensure_connected<F>(store: &mut BoxedStore, connect: &F)
where
    F: Fn() -> Result<BoxedStore>,
{
    if store.is_healthy() {
        return;
    }
    match connect() {
        Ok(fresh) => {
            *store = fresh;
            tracing::warn!("store connection lost; reconnected");
        }
        Err(e) => tracing::error!(err = %format!("{e:#}"), "store reconnect failed"),
    }
}

/// Reads at most `limit` bytes. `None` means the body is larger than that.
fn read_body(reader: impl Read, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(body))
}

fn respond(mut request: Request, store: &mut BoxedStore) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = match read_body(request.as_reader(), MAX_BODY_BYTES) {
        Ok(Some(body)) => api::handle(store, &method, &url, &body),
        Ok(None) => ApiResponse {
            status: 413,
            content_type: "text/plain; charset=utf-8",
            body: b"request body too large".to_vec(),
        },
        Err(e) => {
            tracing::warn!(err = %e, "failed to read request body");
            ApiResponse {
                status: 400,
                content_type: "text/plain; charset=utf-8",
                body: b"unreadable request body".to_vec(),
            }
        }
    };

    let status = reply.status;
    let mut response = Response::from_data(reply.body).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
        response.add_header(header);
    }

    if let Err(e) = request.respond(response) {
        tracing::warn!(err = %e, "failed to write response");
    }

    tracing::info!(
        %method,
        path = %url,
        status,
        elapsed_ms = started.elapsed().as_millis(),
        "request"
    );
}
