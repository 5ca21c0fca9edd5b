// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket implementation of the remote traits using tokio-tungstenite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use ms_core::protocol::{ClientMessage, ServerMessage};
use ms_core::Payload;

use super::{ChannelEvent, RealtimeChannel, RemoteError, RemoteFuture, RemoteResult, RemoteTables};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default time to wait for a channel subscription acknowledgement.
const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote tables and realtime channel over a single WebSocket connection.
///
/// The connection is opened lazily on the first request and re-opened after
/// any transport failure. Requests are serialized over the connection.
pub struct WsRemote {
    url: String,
    token: Option<String>,
    subscribe_timeout: Duration,
    conn: Mutex<Option<WsStream>>,
    next_request_id: AtomicU64,
}

impl WsRemote {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        WsRemote {
            url: url.into(),
            token,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
            conn: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Closes the connection, if open.
    pub async fn disconnect(&self) {
        if let Some(mut ws) = self.conn.lock().await.take() {
            let _ = ws.close(None).await;
        }
    }

    /// Sends one request and waits for the reply carrying its id.
    async fn request(&self, build: impl FnOnce(u64) -> ClientMessage) -> RemoteResult<ServerMessage> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let msg = build(request_id);

        let mut conn = self.conn.lock().await;
        if conn.is_none() {
            let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| RemoteError::Transport(format!("connect to {}: {}", self.url, e)))?;
            debug!(url = %self.url, "websocket connected");
            *conn = Some(ws);
        }

        let ws = conn
            .as_mut()
            .ok_or_else(|| RemoteError::Transport("connection closed".to_string()))?;
        let result = exchange(ws, &msg, request_id).await;
        if matches!(result, Err(RemoteError::Transport(_))) {
            // Connection is broken, clear it
            *conn = None;
        }
        result
    }
}

async fn exchange(ws: &mut WsStream, msg: &ClientMessage, request_id: u64) -> RemoteResult<ServerMessage> {
    let json = msg
        .to_json()
        .map_err(|e| RemoteError::Transport(format!("serialize request: {e}")))?;
    ws.send(Message::Text(json.into()))
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let reply = ServerMessage::from_json(&text)
                    .map_err(|e| RemoteError::Transport(format!("invalid reply: {e}")))?;
                match reply.request_id() {
                    Some(id) if id == request_id => return Ok(reply),
                    None => return Ok(reply),
                    // Late reply to a request that was abandoned on timeout
                    Some(_) => continue,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(RemoteError::Transport("connection closed".to_string()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(RemoteError::Transport(e.to_string())),
        }
    }
}

/// Interprets the reply to a table write.
fn write_reply(reply: ServerMessage) -> RemoteResult<Option<String>> {
    match reply {
        ServerMessage::Ack { id, .. } => Ok(id),
        ServerMessage::Rejected { reason, .. } => Err(RemoteError::Rejected(reason)),
        ServerMessage::Error { message, .. } => Err(RemoteError::Rejected(message)),
        other => Err(RemoteError::Transport(format!("unexpected reply: {other:?}"))),
    }
}

impl RemoteTables for WsRemote {
    fn insert<'a>(
        &'a self,
        table: &'a str,
        document: Payload,
    ) -> RemoteFuture<'a, RemoteResult<Option<String>>> {
        Box::pin(async move {
            let reply = self
                .request(|rid| ClientMessage::insert(rid, table, document))
                .await?;
            write_reply(reply)
        })
    }

    fn update_by_id<'a>(
        &'a self,
        table: &'a str,
        id: &'a str,
        patch: Payload,
    ) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let reply = self
                .request(|rid| ClientMessage::update(rid, table, id, patch))
                .await?;
            write_reply(reply).map(|_| ())
        })
    }

    fn delete_by_id<'a>(&'a self, table: &'a str, id: &'a str) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let reply = self
                .request(|rid| ClientMessage::delete(rid, table, id))
                .await?;
            write_reply(reply).map(|_| ())
        })
    }
}

impl RealtimeChannel for WsRemote {
    fn subscribe(&self) -> RemoteFuture<'_, ChannelEvent> {
        Box::pin(async move {
            let token = self.token.clone();
            let request = self.request(|rid| ClientMessage::subscribe(rid, token));

            match tokio::time::timeout(self.subscribe_timeout, request).await {
                Ok(Ok(ServerMessage::Subscribed { .. })) => ChannelEvent::Subscribed,
                Ok(Ok(ServerMessage::ChannelError { reason, .. })) => ChannelEvent::ChannelError(reason),
                Ok(Ok(ServerMessage::Error { message, .. })) => ChannelEvent::ChannelError(message),
                Ok(Ok(other)) => ChannelEvent::ChannelError(format!("unexpected reply: {other:?}")),
                Ok(Err(RemoteError::Rejected(reason))) => ChannelEvent::ChannelError(reason),
                // Unreachable service looks the same as a silent one
                Ok(Err(e)) => {
                    debug!(error = %e, "channel subscription failed");
                    ChannelEvent::TimedOut
                }
                Err(_) => ChannelEvent::TimedOut,
            }
        })
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
