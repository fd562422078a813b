//! HTTP server setup and accept loop.
//!
//! # Responsibilities
//! - Build the axum router: one fallback handler feeding the dispatcher
//! - Wire up middleware (request ID, tracing, timeout)
//! - Accept connections from the bounded listener and serve HTTP/1.1 and
//!   HTTP/2 on each
//! - Run dispatch on the blocking pool, one worker per request
//! - Stop accepting on shutdown and drain in-flight connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::DispatcherConfig;
use crate::dispatch::Dispatcher;
use crate::http::context::{ContextSettings, HttpContext};
use crate::http::request::{self, UuidRequestId};
use crate::http::response;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept so a persistent error does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher<HttpContext>>,
    settings: Arc<ContextSettings>,
}

/// HTTP front end for a [`Dispatcher`].
pub struct HttpServer {
    config: DispatcherConfig,
    dispatcher: Arc<Dispatcher<HttpContext>>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: DispatcherConfig, dispatcher: Arc<Dispatcher<HttpContext>>) -> Self {
        Self {
            config,
            dispatcher,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Tracker for this server's connections.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, local_addr: SocketAddr) -> Router {
        let settings = ContextSettings {
            secure: self.config.listener.secure,
            fallback_host: self
                .config
                .listener
                .public_host
                .clone()
                .unwrap_or_else(|| local_addr.to_string()),
            max_body_bytes: self.config.limits.max_body_bytes,
        };
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            settings: Arc::new(settings),
        };

        let request_timeout = Duration::from_secs(self.config.limits.request_timeout_secs);
        Router::new().fallback(dispatch_request).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let request_id = request::request_id(req.headers()).unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    /// Run the server until `shutdown` fires, then drain.
    ///
    /// Accept errors that arrive once shutdown has been requested are the
    /// expected abort of the pending accept and end the loop quietly; other
    /// accept errors are logged and the loop carries on.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        let router = self.build_router(local_addr);

        tracing::info!(
            address = %local_addr,
            routes = self.dispatcher.routes().len(),
            responders = self.dispatcher.responder_count(),
            "HTTP server starting"
        );

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit, router.clone()),
                Err(ListenerError::Closed) => {
                    tracing::debug!("Listener closed");
                    break;
                }
                Err(e) if shutdown_requested(&mut shutdown) => {
                    tracing::debug!(error = %e, "Accept aborted by shutdown");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        listener.close();
        drop(listener);
        self.drain().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn drain(&self) {
        self.tracker.begin_drain();
        let active = self.tracker.active_count();
        if active == 0 {
            return;
        }

        let timeout = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        tracing::info!(active, timeout_secs = timeout.as_secs(), "Draining connections");
        if self.tracker.wait_for_idle(timeout).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed, abandoning remaining connections"
            );
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit, router: Router) {
        let guard = self.tracker.track();
        let mut drain = self.tracker.drain_receiver();

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            tracing::trace!(connection_id = %connection_id, peer_addr = %peer, "Serving connection");

            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
            tokio::pin!(conn);

            let mut draining = *drain.borrow();
            if draining {
                conn.as_mut().graceful_shutdown();
            }

            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(
                                connection_id = %connection_id,
                                peer_addr = %peer,
                                error = %e,
                                "Connection ended with error"
                            );
                        }
                        break;
                    }
                    _ = drain.changed(), if !draining => {
                        // Either draining started or the tracker is gone; both mean stop.
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }

            drop(guard);
        });
    }
}

/// Whether a shutdown signal is pending (or can never arrive).
fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

/// Hand one request to the dispatcher on a blocking worker.
async fn dispatch_request(State(state): State<AppState>, request: Request<Body>) -> Response {
    let ctx = HttpContext::new(request, Arc::clone(&state.settings), Handle::current());
    let dispatcher = Arc::clone(&state.dispatcher);
    let span = tracing::Span::current();

    let worker = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut ctx = ctx;
        let outcome = dispatcher.dispatch(&mut ctx);
        tracing::debug!(outcome = outcome.as_str(), status = %ctx.status(), "Request dispatched");
        ctx.into_response()
    });

    match worker.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Dispatch worker failed");
            response::internal_error()
        }
    }
}
