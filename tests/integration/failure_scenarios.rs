//! Failure handling of the distribution service and the dispatcher

use assert_matches::assert_matches;
use faultline::{
    Reading,
    alert::Alert,
    distribution::ingress::MAX_ALERT_BYTES,
    supervisor::{AlertDispatcher, DispatchError},
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::helpers::*;

#[tokio::test]
async fn test_empty_producer_connection_is_ignored() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 1).await;

    // connect and close without sending anything
    drop(TcpStream::connect(server.handle.ingress_addr()).await.unwrap());
    send_raw(&server.handle, b"real alert\n").await;

    assert_eq!(
        next_line(&mut subscribers[0]).await.as_deref(),
        Some("real alert\n")
    );

    let stats = wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 1).await;
    assert_eq!(stats.alerts_ingested, 1);
    assert_eq!(audit_lines(&server).len(), 1);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_payload_is_relayed_verbatim() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 1).await;

    send_raw(&server.handle, b"not json at all").await;

    assert_eq!(
        next_line(&mut subscribers[0]).await.as_deref(),
        Some("not json at all\n")
    );
    wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 1).await;
    assert!(audit_lines(&server)[0].ends_with("] not json at all"));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_is_relayed_byte_for_byte() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 2).await;

    let payload = b"{\"machine\":\"M\xff\xfe\"}\n";
    send_raw(&server.handle, payload).await;

    for subscriber in &mut subscribers {
        assert_eq!(next_raw_line(subscriber).await.as_deref(), Some(&payload[..]));
    }

    wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 1).await;
    assert!(audit_bytes(&server).ends_with(payload));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_not_blocked_by_unfinished_alert() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 1).await;

    // half an alert, no newline, connection kept open
    let mut producer = TcpStream::connect(server.handle.ingress_addr()).await.unwrap();
    producer.write_all(b"{\"machine\":\"partial").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(3), server.handle.shutdown())
        .await
        .expect("shutdown waited for the stalled producer");

    assert!(is_closed(&mut subscribers[0]).await);
    drop(producer);
}

#[tokio::test]
async fn test_only_first_line_per_connection_counts() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 1).await;

    send_raw(&server.handle, b"first\nsecond\n").await;
    send_raw(&server.handle, b"third\n").await;

    assert_eq!(next_line(&mut subscribers[0]).await.as_deref(), Some("first\n"));
    assert_eq!(next_line(&mut subscribers[0]).await.as_deref(), Some("third\n"));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_oversized_alert_is_truncated() {
    let server = start_server(2).await;
    let mut subscribers = subscribe_all(&server.handle, 1).await;

    let mut payload = vec![b'x'; MAX_ALERT_BYTES + 500];
    payload.push(b'\n');
    send_raw(&server.handle, &payload).await;

    let line = next_line(&mut subscribers[0]).await.unwrap();
    assert_eq!(line.len(), MAX_ALERT_BYTES + 1);
    assert!(line.ends_with('\n'));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_dispatch_to_stopped_service_is_dropped() {
    let server = start_server(2).await;
    let dispatcher = AlertDispatcher::new(server.handle.ingress_addr());
    server.handle.shutdown().await;

    let alert = Alert::critical(&Reading::new("Machine-7", "temp", 95.0, 0), 80.0, 0);
    assert_matches!(
        dispatcher.dispatch(&alert).await,
        Err(DispatchError::Connect(_))
    );
}

#[tokio::test]
async fn test_audit_log_is_written_without_subscribers() {
    let server = start_server(2).await;

    let alert = Alert::critical(&Reading::new("Machine-3", "rpm", 5000.0, 0), 4000.0, 7);
    AlertDispatcher::new(server.handle.ingress_addr())
        .dispatch(&alert)
        .await
        .unwrap();

    wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 1).await;
    let lines = audit_lines(&server);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"machine\":\"Machine-3\""));

    server.handle.shutdown().await;
}
