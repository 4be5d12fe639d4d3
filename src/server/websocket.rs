//! WebSocket server implementation
//!
//! Serves the relay endpoint (`/` and `/ws`) and the status query on one
//! port. Each connection gets a reader loop that routes frames in order and
//! a writer task that drains its outbound queue.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Json, Response};
use axum::routing::get;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::status::StatusResponse;
use crate::config::RelayConfig;
use crate::relay::{ConnectionId, Lifecycle, RelayState, Router, Session};

/// How long shutdown waits for sessions to finish their teardown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared with the axum handlers
#[derive(Clone)]
struct AppState {
    state: Arc<RelayState>,
    router: Router,
    lifecycle: Lifecycle,
    write_timeout: Duration,
    max_message_size: usize,
}

/// Relay server for browser clients
pub struct RelayServer {
    config: RelayConfig,
    state: Arc<RelayState>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a new relay server
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: Arc::new(RelayState::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Shared registry and room directory
    #[allow(dead_code)]
    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Trigger server shutdown
    ///
    /// Stops accepting and closes every live connection, each of which runs
    /// its normal teardown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Build the HTTP application
    pub fn app(&self) -> axum::Router {
        let app_state = AppState {
            state: Arc::clone(&self.state),
            router: Router::new(Arc::clone(&self.state)),
            lifecycle: Lifecycle::new(
                Arc::clone(&self.state),
                self.shutdown.clone(),
                self.config.outbound_queue_capacity,
            ),
            write_timeout: self.config.write_timeout(),
            max_message_size: self.config.max_message_size,
        };

        axum::Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/api/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Relay listening on ws://{}", addr);
        info!("Status available at http://{}/api/status", addr);

        let token = self.shutdown.clone();
        axum::serve(listener, self.app())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        // Sessions tear down on their own once their tokens fire
        let active = self.state.stats().await.active_users;
        if active > 0 {
            info!("Waiting for {} active connections to close...", active);
            let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                while self.state.stats().await.active_users > 0 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            if drained.is_err() {
                warn!("Connections still open after {:?}", DRAIN_TIMEOUT);
            }
        }

        Ok(())
    }
}

/// GET /api/status
async fn status_handler(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(app.state.stats().await))
}

/// GET / and /ws: WebSocket upgrade
async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    let max_message_size = app.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_connection(socket, app))
}

/// Handle a single WebSocket connection from upgrade to teardown
async fn handle_connection(socket: WebSocket, app: AppState) {
    let Session {
        id,
        handle,
        outbound,
    } = app.lifecycle.connect().await;
    let token = handle.closed_token();

    let (ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(write_frames(
        ws_sender,
        outbound,
        token.clone(),
        app.write_timeout,
        id,
    ));

    // Message handling loop
    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        app.router.route(id, &text).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(conn_id = %id, len = data.len(), "Received binary message, ignoring");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pings are answered by the WebSocket layer
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(conn_id = %id, "Client requested close");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(conn_id = %id, error = %e, "WebSocket read error");
                        break;
                    }
                    None => {
                        debug!(conn_id = %id, "Connection closed by peer");
                        break;
                    }
                }
            }
            _ = token.cancelled() => {
                debug!(conn_id = %id, "Connection closed by relay");
                break;
            }
        }
    }

    token.cancel();
    app.lifecycle.disconnect(id).await;
    let _ = writer.await;
}

/// Drain the outbound queue onto the socket, one bounded write at a time
async fn write_frames(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    token: CancellationToken,
    write_timeout: Duration,
    id: ConnectionId,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                let write = ws_sender.send(Message::Text(frame.to_string()));
                match tokio::time::timeout(write_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(conn_id = %id, error = %e, "WebSocket write error");
                        break;
                    }
                    Err(_) => {
                        warn!(conn_id = %id, "WebSocket write timed out after {:?}", write_timeout);
                        break;
                    }
                }
            }
            _ = token.cancelled() => {
                let _ = tokio::time::timeout(write_timeout, ws_sender.send(Message::Close(None))).await;
                return;
            }
        }
    }

    // A dead writer ends the session
    token.cancel();
}
