//! WebSocket bridge for browser subscribers
//!
//! Every WebSocket client gets its own subscriber connection to the
//! distribution service. Each broadcast line is forwarded as one message
//! without its line terminator. When either side goes away the other one is
//! closed too.
//!
//! ```text
//! browser ⇄ WS /  ⇄ proxy ⇄ TCP egress ⇄ distribution service
//! ```

use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Default port web clients connect to.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy)]
struct ProxyState {
    upstream: SocketAddr,
}

/// Router bridging `WS /` to the subscriber port at `upstream`.
pub fn router(upstream: SocketAddr) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .with_state(ProxyState { upstream })
}

/// Serves web clients on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    upstream: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(upstream))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ProxyState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state.upstream))
}

async fn handle_websocket(mut socket: WebSocket, upstream: SocketAddr) {
    info!("web client connected");

    let stream = match TcpStream::connect(upstream).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("failed to connect to distribution service at {upstream}: {e}");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    debug!("subscribed at {upstream}");

    let (tcp_reader, mut tcp_writer) = stream.into_split();
    let (mut sender, mut receiver) = socket.split();

    // Forward broadcast lines to the web client
    let mut send_task = tokio::spawn(async move {
        let mut tcp_reader = BufReader::new(tcp_reader);
        let mut line = Vec::new();

        loop {
            match tcp_reader.read_until(b'\n', &mut line).await {
                Ok(0) => {
                    debug!("distribution service closed the subscriber connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("subscriber connection failed: {e}");
                    break;
                }
            }

            if sender.send(line_message(std::mem::take(&mut line))).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                return;
            }
        }

        let _ = sender.send(Message::Close(None)).await;
    });

    // Nothing is expected from the web client except its close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
        let _ = tcp_writer.shutdown().await;
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("web client disconnected");
}

/// Text message for a UTF-8 line, binary otherwise.
fn line_message(mut line: Vec<u8>) -> Message {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }

    match String::from_utf8(line) {
        Ok(text) => Message::Text(text),
        Err(e) => Message::Binary(e.into_bytes()),
    }
}
