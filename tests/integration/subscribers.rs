//! Subscriber registry behavior over real sockets

use std::collections::HashSet;
use std::time::Duration;

use faultline::{
    Reading,
    alert::Alert,
    supervisor::AlertDispatcher,
};

use crate::helpers::*;

#[tokio::test]
async fn test_subscriber_beyond_capacity_never_receives() {
    let server = start_server(3).await;
    let mut registered = subscribe_all(&server.handle, 3).await;

    let mut rejected = subscribe(&server.handle).await;
    let stats = wait_for_stats(&server.handle, |stats| stats.subscribers_rejected == 1).await;
    assert_eq!(stats.subscribers, 3);
    assert_eq!(stats.capacity, 3);

    send_raw(&server.handle, b"{\"machine\":\"Machine-1\"}\n").await;

    for subscriber in &mut registered {
        assert_eq!(
            next_line(subscriber).await.as_deref(),
            Some("{\"machine\":\"Machine-1\"}\n")
        );
    }
    assert!(is_closed(&mut rejected).await);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_disconnected_subscriber_frees_its_slot() {
    let server = start_server(1).await;

    let first = subscribe_all(&server.handle, 1).await;
    drop(first);
    let stats = wait_for_stats(&server.handle, |stats| stats.subscribers == 0).await;
    assert_eq!(stats.subscribers_dropped, 1);

    let mut second = subscribe_all(&server.handle, 1).await;
    send_raw(&server.handle, b"after reconnect\n").await;

    assert_eq!(
        next_line(&mut second[0]).await.as_deref(),
        Some("after reconnect\n")
    );
    assert_eq!(server.handle.stats().await.subscribers_rejected, 0);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_remaining_subscribers_keep_receiving() {
    let server = start_server(4).await;
    let mut subscribers = subscribe_all(&server.handle, 3).await;

    drop(subscribers.remove(1));
    wait_for_stats(&server.handle, |stats| stats.subscribers == 2).await;

    send_raw(&server.handle, b"one\n").await;
    send_raw(&server.handle, b"two\n").await;

    for subscriber in &mut subscribers {
        assert_eq!(next_line(subscriber).await.as_deref(), Some("one\n"));
        assert_eq!(next_line(subscriber).await.as_deref(), Some("two\n"));
    }

    let stats = wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 2).await;
    assert_eq!(stats.subscribers_dropped, 1);
    assert_eq!(audit_lines(&server).len(), 2);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_producers_are_all_delivered() {
    let server = start_server(4).await;
    let mut subscribers = subscribe_all(&server.handle, 2).await;
    let dispatcher = AlertDispatcher::new(server.handle.ingress_addr());

    let mut tasks = vec![];
    for i in 0..10 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            let reading = Reading::new(&format!("Machine-{i}"), "temp", 99.0, 0);
            dispatcher.dispatch(&Alert::critical(&reading, 80.0, i)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for subscriber in &mut subscribers {
        let mut machines = HashSet::new();
        for _ in 0..10 {
            let line = next_line(subscriber).await.expect("missing alert");
            machines.insert(Alert::from_wire_line(&line).unwrap().machine_id);
        }
        assert_eq!(machines.len(), 10);
    }

    wait_for_stats(&server.handle, |stats| stats.alerts_ingested == 10).await;
    assert_eq!(audit_lines(&server).len(), 10);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_subscribers() {
    let server = start_server(4).await;
    let mut subscribers = subscribe_all(&server.handle, 2).await;

    server.handle.shutdown().await;

    for subscriber in &mut subscribers {
        assert!(is_closed(subscriber).await);
    }

    // nothing arrives on a quiet but open connection either
    let server = start_server(1).await;
    let mut quiet = subscribe_all(&server.handle, 1).await;
    assert_eq!(
        next_line_within(&mut quiet[0], Duration::from_millis(200)).await,
        None
    );
    server.handle.shutdown().await;
}
