// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Every client request gets exactly one reply echoing its `request_id`.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use ms_core::protocol::{ClientMessage, ServerMessage};

use crate::state::ServerState;

/// Run the WebSocket server on the given address.
pub async fn run(
    addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub(crate) async fn serve(
    listener: TcpListener,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = handle_client_message(&text, &state).await;
                ws.send(Message::Text(reply.to_json()?.into())).await?;
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                ws.send(Message::Pong(data)).await?;
            }
            Ok(_) => {
                // Ignore other message types (Binary, Pong, Frame)
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client message and build its reply.
pub(crate) async fn handle_client_message(text: &str, state: &ServerState) -> ServerMessage {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Unparseable request: {}", e);
            return ServerMessage::error(None, format!("invalid request: {}", e));
        }
    };
    debug!("Received message: {:?}", msg);

    match msg {
        ClientMessage::Insert {
            request_id,
            table,
            document,
        } => match state.insert(&table, document).await {
            Ok(id) => {
                debug!("Inserted {} into {}", id, table);
                ServerMessage::ack(request_id, Some(id))
            }
            Err(refusal) => ServerMessage::rejected(request_id, refusal.to_string()),
        },

        ClientMessage::Update {
            request_id,
            table,
            id,
            patch,
        } => match state.update(&table, &id, patch).await {
            Ok(()) => ServerMessage::ack(request_id, Some(id)),
            Err(refusal) => ServerMessage::rejected(request_id, refusal.to_string()),
        },

        ClientMessage::Delete {
            request_id,
            table,
            id,
        } => match state.delete(&table, &id).await {
            Ok(removed) => {
                debug!("Delete {} from {} (removed: {})", id, table, removed);
                ServerMessage::ack(request_id, Some(id))
            }
            Err(refusal) => ServerMessage::rejected(request_id, refusal.to_string()),
        },

        ClientMessage::Subscribe { request_id, token } => {
            match state.authorize(token.as_deref()) {
                Ok(()) => ServerMessage::subscribed(request_id),
                Err(refusal) => ServerMessage::channel_error(request_id, refusal.to_string()),
            }
        }

        ClientMessage::Ping { request_id } => {
            debug!("Ping received: {}", request_id);
            ServerMessage::pong(request_id)
        }
    }
}
