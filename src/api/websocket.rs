//! WebSocket stream of draw events.
//!
//! `GET /ws/draws/:draw_id` sends a snapshot of the draw, then every
//! `DrawEvent` for that draw as JSON until the client goes away or the draw
//! finishes. Clients that fall behind get a fresh snapshot instead of the
//! events they missed.

use super::handlers::AppState;
use crate::bingo::types::{Draw, DrawEvent};
use crate::engine::DrawEngine;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Messages pushed to room clients
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage<'a> {
    Snapshot { draw: &'a Draw },
    Event { event: &'a DrawEvent },
    Error { message: String },
}

/// GET /ws/draws/:draw_id
pub async fn draw_websocket_handler(
    ws: WebSocketUpgrade,
    Path(draw_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let engine = state.engine.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, engine, draw_id))
}

async fn send_json(sender: &mut futures_util::stream::SplitSink<WebSocket, Message>, message: &WsMessage<'_>) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize websocket message: {}", e);
            true
        }
    }
}

async fn send_snapshot(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    engine: &DrawEngine,
    draw_id: &str,
) -> bool {
    match engine.load_draw(draw_id) {
        Ok(draw) => send_json(sender, &WsMessage::Snapshot { draw: &draw }).await,
        Err(e) => {
            let _ = send_json(sender, &WsMessage::Error { message: e.to_string() }).await;
            false
        }
    }
}

async fn handle_connection(socket: WebSocket, engine: DrawEngine, draw_id: String) {
    // Subscribe before the snapshot so nothing falls between the two
    let mut rx = engine.events().subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!(%draw_id, "WebSocket client connected");

    if !send_snapshot(&mut sender, &engine, &draw_id).await {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%draw_id, "WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) if event.draw_id() == draw_id => {
                        let finished = matches!(event, DrawEvent::DrawFinished { .. });
                        if !send_json(&mut sender, &WsMessage::Event { event: &event }).await {
                            break;
                        }
                        if finished {
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%draw_id, skipped, "WebSocket client lagged; resending snapshot");
                        if !send_snapshot(&mut sender, &engine, &draw_id).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%draw_id, "WebSocket client disconnected");
}
