use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    Engine,
    runtime::{SubscribeOptions, SubscriptionHandle},
};

use super::protocol::{ClientFrame, ServerFrame};

/// Handles one WebSocket client until it disconnects.
///
/// Bus handlers run on the publishing thread, so they only queue the encoded
/// frame; a writer task drains the queue into the socket.
pub async fn handle_connection(
    ws: WebSocket,
    engine: Arc<Engine>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<String, SubscriptionHandle> = HashMap::new();
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "websocket read error");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_frame(&engine, frame, &mut subscriptions, &out_tx),
                Err(e) => send(&out_tx, &ServerFrame::error(None, format!("invalid frame: {}", e))),
            },
            Message::Ping(data) => {
                let _ = out_tx.send(Message::Pong(data));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    for (_, handle) in subscriptions.drain() {
        engine.unsubscribe(handle);
    }
    drop(out_tx);
    let _ = writer.await;
}

fn handle_frame(
    engine: &Engine,
    frame: ClientFrame,
    subscriptions: &mut HashMap<String, SubscriptionHandle>,
    out_tx: &mpsc::UnboundedSender<Message>,
) {
    match frame {
        ClientFrame::Subscribe {
            execution_id,
        } => {
            if !subscriptions.contains_key(&execution_id) {
                let tx = out_tx.clone();
                let subscribed = engine.subscribe(SubscribeOptions::execution(&execution_id), move |envelope| {
                    if let Ok(json) = serde_json::to_string(envelope) {
                        let _ = tx.send(Message::Text(json.into()));
                    }
                });
                match subscribed {
                    Ok(handle) => {
                        subscriptions.insert(execution_id.clone(), handle);
                    }
                    Err(e) => {
                        send(out_tx, &ServerFrame::error(Some(execution_id), e.to_string()));
                        return;
                    }
                }
            }
            send(out_tx, &ServerFrame::Subscribed {
                execution_id,
            });
        }
        ClientFrame::Unsubscribe {
            execution_id,
        } => {
            if let Some(handle) = subscriptions.remove(&execution_id) {
                engine.unsubscribe(handle);
            }
            send(out_tx, &ServerFrame::Unsubscribed {
                execution_id,
            });
        }
        ClientFrame::UserInput {
            execution_id,
            response,
            node_id,
        } => {
            if let Err(e) = engine.submit_user_input(&execution_id, response, node_id.as_deref()) {
                warn!(execution_id = %execution_id, "rejected user input: {}", e);
                send(out_tx, &ServerFrame::error(Some(execution_id), e.to_string()));
            }
        }
    }
}

fn send<T: Serialize>(
    out_tx: &mpsc::UnboundedSender<Message>,
    frame: &T,
) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = out_tx.send(Message::Text(json.into()));
    }
}
