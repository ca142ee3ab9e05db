//! Per-client WebSocket session.
//!
//! Each client gets the current device presence first, then a merge of its
//! own command traffic and the shared event stream.

use super::commands::dispatch;
use super::protocol::{ClientMessage, CommandResult, PushEvent, ServerMessage};
use super::ServerContext;
use crate::bridge::{AgentEvent, Subscription};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

type WsSink = SplitSink<WebSocket, Message>;

/// Reply handle for one call. Consumed by `reply`, so a call is acknowledged
/// at most once.
#[derive(Debug)]
pub struct AckSender {
    id: u64,
}

impl AckSender {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn reply(self, result: CommandResult) -> ServerMessage {
        ServerMessage::Ack {
            ack: self.id,
            data: result,
        }
    }
}

pub(super) async fn handle_socket(socket: WebSocket, ctx: ServerContext) {
    let (mut sender, mut receiver) = socket.split();
    let client_id = Uuid::new_v4();
    let Subscription {
        initial,
        mut events,
    } = ctx.bridge.subscribe();

    info!(client = %client_id, "Client connected");

    let hello = ServerMessage::Event(PushEvent::DeviceConnected((&initial).into()));
    if let Err(e) = send_message(&mut sender, &hello).await {
        warn!(client = %client_id, "Failed to send initial status: {}", e);
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_message(text.as_str(), &ctx, client_id) {
                            if let Err(e) = send_message(&mut sender, &reply).await {
                                warn!(client = %client_id, "Failed to send reply: {}", e);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(client = %client_id, "Close frame received");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            warn!(client = %client_id, "Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Binary and Pong frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        warn!(client = %client_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            event = events.next() => {
                let Some(event) = event else {
                    debug!(client = %client_id, "Event stream closed");
                    break;
                };
                if let Some(msg) = outgoing_event(&ctx, event, client_id) {
                    if let Err(e) = send_message(&mut sender, &msg).await {
                        warn!(client = %client_id, "Failed to push event: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!(client = %client_id, "Client disconnected");
}

/// Turn one item of the shared event stream into the frame for this client.
///
/// A lagging client may have lost presence transitions along with readings,
/// so it is resent the current presence.
fn outgoing_event(
    ctx: &ServerContext,
    event: Result<AgentEvent, BroadcastStreamRecvError>,
    client_id: Uuid,
) -> Option<ServerMessage> {
    match event {
        Ok(event) => should_deliver(ctx, &event).then(|| ServerMessage::Event(PushEvent::from(&event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(client = %client_id, skipped, "Client lagging, oldest events dropped");
            let presence = ctx.bridge.state().presence();
            Some(ServerMessage::Event(PushEvent::DeviceConnected((&presence).into())))
        }
    }
}

/// Readings queued before a `stop-snappy` are not delivered after it.
fn should_deliver(ctx: &ServerContext, event: &AgentEvent) -> bool {
    match event {
        AgentEvent::Device(_) => true,
        AgentEvent::Reading { .. } => ctx.bridge.state().collection().is_running(),
    }
}

/// Returns the frame to send back, if any.
fn handle_client_message(text: &str, ctx: &ServerContext, client_id: Uuid) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(client = %client_id, "Unparseable frame: {}", e);
            return Some(ServerMessage::Error {
                message: format!("Invalid message: {e}"),
            });
        }
    };

    match message {
        ClientMessage::Call { event, ack } => {
            let result = dispatch(ctx, &event);
            debug!(
                client = %client_id,
                command = %event,
                success = result.success,
                "Command handled"
            );
            ack.map(|id| AckSender::new(id).reply(result))
        }
    }
}

async fn send_message(sender: &mut WsSink, msg: &ServerMessage) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
