//! Per-connection handler: hello, then serve requests while forwarding
//! frames and engine events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use appshare_common::UserId;
use appshare_config::AppShareConfig;
use appshare_engine::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::dispatch::ConnectionState;
use crate::protocol::{ClientHello, ServerMessage};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Frames, replies and notices queued for one client.
const OUTBOUND_CAPACITY: usize = 64;

/// Protocol-level replies such as pongs.
const CONTROL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub hello_timeout: Duration,
    /// A client that cannot take a message within this long is dropped.
    pub send_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &AppShareConfig) -> Self {
        Self {
            hello_timeout: config.server.hello_timeout(),
            send_timeout: config.capture.send_timeout(),
        }
    }
}

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    engine: Arc<Engine>,
    settings: ConnectionSettings,
) {
    let (mut sink, mut stream) = ws.split();

    let Some(user) = read_hello(&mut stream, addr, settings.hello_timeout).await else {
        return;
    };

    let welcome = ServerMessage::Welcome {
        user: user.clone(),
        version: env!("CARGO_PKG_VERSION"),
    };
    if !send_message(&mut sink, Message::Text(welcome.to_json().into()), settings.send_timeout).await {
        return;
    }
    tracing::info!(peer = %addr, user = %user, "client connected");

    // The writer drains the outbound queue on its own, so frames keep
    // flowing while a slow request is being served below.
    let (out_tx, out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let (control_tx, control_rx) = mpsc::channel::<Message>(CONTROL_CAPACITY);
    let mut writer = tokio::spawn(write_loop(sink, out_rx, control_rx, addr, settings.send_timeout));

    let mut state = ConnectionState::new(user, out_tx.clone());
    let mut events = engine.events();

    loop {
        tokio::select! {
            _ = &mut writer => break,

            event = events.recv() => match event {
                Ok(event) => {
                    let json = ServerMessage::Event { event }.to_json();
                    if out_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(peer = %addr, skipped, "client fell behind on events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let reply = state.respond(&engine, &text).await;
                    if out_tx.send(reply.to_json()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if control_tx.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(peer = %addr, error = %e, "WS error");
                    break;
                }
                _ => {}
            }
        }
    }

    tracing::info!(peer = %addr, user = %state.user(), "client disconnected");
    state.release(&engine).await;
    drop(out_tx);
    drop(control_tx);
    writer.abort();
}

/// Own the sink: send control replies first, then queued messages, until
/// the queues close or the client stops taking messages.
async fn write_loop(
    mut sink: WsSink,
    mut out_rx: mpsc::Receiver<String>,
    mut control_rx: mpsc::Receiver<Message>,
    addr: SocketAddr,
    timeout: Duration,
) {
    loop {
        let message = tokio::select! {
            biased;
            Some(control) = control_rx.recv() => control,
            json = out_rx.recv() => match json {
                Some(json) => Message::Text(json.into()),
                None => break,
            },
        };
        if !send_message(&mut sink, message, timeout).await {
            tracing::debug!(peer = %addr, "writer stopped");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Read and parse the first message as a hello.
async fn read_hello(stream: &mut WsStream, addr: SocketAddr, timeout: Duration) -> Option<UserId> {
    match tokio::time::timeout(timeout, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientHello>(&text) {
            Ok(ClientHello::Hello { user }) if !user.as_str().trim().is_empty() => Some(user),
            Ok(_) => {
                tracing::warn!(peer = %addr, "hello without a user id");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "invalid hello message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "expected text hello");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, timeout_secs = timeout.as_secs(), "hello timeout");
            None
        }
    }
}

/// Returns `false` once the client is gone or too slow to take the message.
async fn send_message(sink: &mut WsSink, message: Message, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "send failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "send timed out, dropping client");
            false
        }
    }
}
