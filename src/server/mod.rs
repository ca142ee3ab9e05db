//! Event server.
//!
//! Routes:
//! - `GET /`   health probe, answers `alive`
//! - `GET /ws` WebSocket upgrade speaking the JSON call/ack/event protocol
//!   defined in [`protocol`]

pub mod commands;
pub mod connection;
pub mod protocol;

use crate::bridge::Bridge;
use crate::config::DeviceConfig;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use commands::{dispatch, Command, UnknownCommand};
pub use connection::AckSender;
pub use protocol::{ClientMessage, CommandResult, PushEvent, ServerMessage};

/// State shared by every connection handler.
#[derive(Clone)]
pub struct ServerContext {
    pub bridge: Bridge,
    pub device: Arc<DeviceConfig>,
}

impl ServerContext {
    pub fn new(bridge: Bridge, device: DeviceConfig) -> Self {
        Self {
            bridge,
            device: Arc::new(device),
        }
    }
}

pub fn router(ctx: ServerContext) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_handler))
        .with_state(ctx)
}

/// Serve on an already bound listener until `shutdown` turns true.
///
/// Open client connections are not drained.
pub async fn serve(
    listener: TcpListener,
    ctx: ServerContext,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = router(ctx);
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result,
        _ = shutdown.wait_for(|stop| *stop) => {
            info!("Event server stopped");
            Ok(())
        }
    }
}

async fn health() -> &'static str {
    "alive"
}

async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<ServerContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, ctx))
}
