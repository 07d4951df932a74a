//! WebSocket bridge between the subscriber port and web clients

use std::net::SocketAddr;
use std::time::Duration;

use faultline::{Reading, alert::Alert, proxy, supervisor::AlertDispatcher};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::helpers::*;

type WebClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_proxy(upstream: SocketAddr) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(proxy::serve(listener, upstream, std::future::pending()));
    addr
}

async fn connect_web_client(proxy: SocketAddr) -> WebClient {
    let (client, _) = connect_async(format!("ws://{proxy}/")).await.unwrap();
    client
}

/// Whether the bridge closed the WebSocket within two seconds.
async fn web_client_closed(client: &mut WebClient) -> bool {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), client.next()).await {
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return false,
        }
    }
}

#[tokio::test]
async fn test_web_client_receives_broadcast_line() {
    let server = start_server(4).await;
    let proxy = start_proxy(server.handle.egress_addr()).await;

    let mut web = connect_web_client(proxy).await;
    let mut tcp = subscribe_all(&server.handle, 1).await;
    wait_for_stats(&server.handle, |stats| stats.subscribers == 2).await;

    let alert = Alert::critical(&Reading::new("Machine-7", "temp", 95.0, 0), 80.0, 1);
    AlertDispatcher::new(server.handle.ingress_addr())
        .dispatch(&alert)
        .await
        .unwrap();

    let line = next_line(&mut tcp[0]).await.unwrap();
    let message = tokio::time::timeout(Duration::from_secs(2), web.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(message, Message::Text(line.trim_end_matches('\n').to_string()));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_closing_web_client_frees_subscriber_slot() {
    let server = start_server(1).await;
    let proxy = start_proxy(server.handle.egress_addr()).await;

    let mut web = connect_web_client(proxy).await;
    wait_for_stats(&server.handle, |stats| stats.subscribers == 1).await;

    web.close(None).await.unwrap();

    wait_for_stats(&server.handle, |stats| {
        stats.subscribers == 0 && stats.subscribers_dropped == 1
    })
    .await;

    // the single slot is usable again
    subscribe_all(&server.handle, 1).await;

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_server_shutdown_closes_web_client() {
    let server = start_server(2).await;
    let proxy = start_proxy(server.handle.egress_addr()).await;

    let mut web = connect_web_client(proxy).await;
    wait_for_stats(&server.handle, |stats| stats.subscribers == 1).await;

    server.handle.shutdown().await;

    assert!(web_client_closed(&mut web).await);
}

#[tokio::test]
async fn test_unreachable_service_closes_web_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = listener.local_addr().unwrap();
    drop(listener);

    let proxy = start_proxy(upstream).await;
    let mut web = connect_web_client(proxy).await;

    assert!(web_client_closed(&mut web).await);
}
