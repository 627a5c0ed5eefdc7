//! Keep-alive HTTP endpoint.
//!
//! hyper on a private current-thread tokio runtime, hosted by the
//! `fxsignal-health` thread so the rest of the bot stays blocking.

use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

pub const ROOT_TEXT: &str = "Forex signal bot is running";

/// A fully determined response for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

/// Route a request. Pure, so tests need no socket.
pub fn route(method: &Method, path: &str) -> Reply {
    match (method, path) {
        (&Method::GET, "/") => Reply {
            status: StatusCode::OK,
            content_type: "text/plain; charset=utf-8",
            body: ROOT_TEXT.to_string(),
        },
        (&Method::GET, "/health") => Reply {
            status: StatusCode::OK,
            content_type: "application/json",
            body: json!({ "status": "active", "message": "Bot is healthy" }).to_string(),
        },
        _ => Reply {
            status: StatusCode::NOT_FOUND,
            content_type: "text/plain; charset=utf-8",
            body: "Not found".to_string(),
        },
    }
}

async fn handle_request(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), path = req.uri().path(), "health request");
    let reply = route(req.method(), req.uri().path());
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(reply.content_type),
    );
    Ok(response)
}

/// Running keep-alive server.
pub struct HealthHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl HealthHandle {
    /// Bound address (the real port when started on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Graceful shutdown, then wait for the thread.
    pub fn stop(self) -> thread::Result<()> {
        let _ = self.shutdown.send(());
        self.thread.join()
    }
}

/// Bind `0.0.0.0:port` and serve until the handle is stopped.
///
/// Bind failures are returned here rather than logged on the server thread.
pub fn spawn_health_server(port: u16) -> io::Result<HealthHandle> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (ready_tx, ready_rx) = mpsc::channel::<io::Result<SocketAddr>>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = thread::Builder::new()
        .name("fxsignal-health".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            runtime.block_on(async move {
                let builder = match Server::try_bind(&addr) {
                    Ok(builder) => builder,
                    Err(e) => {
                        let _ = ready_tx.send(Err(io::Error::new(io::ErrorKind::AddrInUse, e)));
                        return;
                    }
                };
                let make_svc = make_service_fn(|_conn| async {
                    Ok::<_, Infallible>(service_fn(handle_request))
                });
                let server = builder.serve(make_svc);
                let _ = ready_tx.send(Ok(server.local_addr()));
                info!(addr = %server.local_addr(), "health server listening");

                let graceful = server.with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
                if let Err(e) = graceful.await {
                    error!(error = %e, "health server error");
                }
                info!("health server stopped");
            });
        })?;

    let addr = ready_rx
        .recv()
        .map_err(|_| io::Error::other("health thread exited before binding"))??;

    Ok(HealthHandle {
        addr,
        shutdown: shutdown_tx,
        thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_plain_text() {
        let reply = route(&Method::GET, "/");
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, ROOT_TEXT);
    }

    #[test]
    fn health_is_json() {
        let reply = route(&Method::GET, "/health");
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.content_type, "application/json");
        let v: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(v["status"], "active");
        assert_eq!(v["message"], "Bot is healthy");
    }

    #[test]
    fn unknown_routes_are_not_found() {
        assert_eq!(route(&Method::GET, "/metrics").status, StatusCode::NOT_FOUND);
        assert_eq!(route(&Method::POST, "/health").status, StatusCode::NOT_FOUND);
    }
}
