//! Helper functions for integration tests

use std::path::PathBuf;
use std::time::Duration;

use faultline::{
    config::ServerConfig,
    distribution::{DistributionHandle, DistributionServer, ServerStats},
};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub type Subscriber = BufReader<TcpStream>;

pub struct TestServer {
    pub handle: DistributionHandle,
    pub audit_log: PathBuf,
    _dir: TempDir,
}

pub async fn start_server(max_subscribers: usize) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let audit_log = dir.path().join("faultline.log");

    let config = ServerConfig {
        bind: "127.0.0.1".parse().unwrap(),
        egress_port: 0,
        ingress_port: Some(0),
        audit_log: audit_log.clone(),
        max_subscribers,
    };

    let handle = DistributionServer::bind(&config)
        .await
        .unwrap()
        .spawn()
        .unwrap();

    TestServer {
        handle,
        audit_log,
        _dir: dir,
    }
}

/// Polls the server stats until `condition` holds, panicking after 5 seconds.
pub async fn wait_for_stats<F>(handle: &DistributionHandle, condition: F) -> ServerStats
where
    F: Fn(&ServerStats) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    loop {
        let stats = handle.stats().await;
        if condition(&stats) {
            return stats;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last stats: {stats:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn subscribe(handle: &DistributionHandle) -> Subscriber {
    BufReader::new(TcpStream::connect(handle.egress_addr()).await.unwrap())
}

/// Connects `count` subscribers and waits until all of them are registered.
pub async fn subscribe_all(handle: &DistributionHandle, count: usize) -> Vec<Subscriber> {
    let already = handle.stats().await.subscribers;

    let mut subscribers = vec![];
    for _ in 0..count {
        subscribers.push(subscribe(handle).await);
    }

    wait_for_stats(handle, |stats| stats.subscribers == already + count).await;
    subscribers
}

/// Next line including its newline, or `None` on EOF or after `wait`.
pub async fn next_line_within(subscriber: &mut Subscriber, wait: Duration) -> Option<String> {
    let mut line = String::new();
    match tokio::time::timeout(wait, subscriber.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 => Some(line),
        _ => None,
    }
}

pub async fn next_line(subscriber: &mut Subscriber) -> Option<String> {
    next_line_within(subscriber, Duration::from_secs(2)).await
}

/// Next line as raw bytes including its newline, or `None` on EOF or timeout.
pub async fn next_raw_line(subscriber: &mut Subscriber) -> Option<Vec<u8>> {
    let mut line = vec![];
    let read = subscriber.read_until(b'\n', &mut line);
    match tokio::time::timeout(Duration::from_secs(2), read).await {
        Ok(Ok(n)) if n > 0 => Some(line),
        _ => None,
    }
}

/// Whether the server closed the connection (as opposed to just staying silent).
pub async fn is_closed(subscriber: &mut Subscriber) -> bool {
    let mut line = String::new();
    matches!(
        tokio::time::timeout(Duration::from_secs(2), subscriber.read_line(&mut line)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

/// Delivers raw bytes as one producer connection.
pub async fn send_raw(handle: &DistributionHandle, payload: &[u8]) {
    let mut stream = TcpStream::connect(handle.ingress_addr()).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
}

pub fn audit_bytes(server: &TestServer) -> Vec<u8> {
    std::fs::read(&server.audit_log).unwrap()
}

pub fn audit_lines(server: &TestServer) -> Vec<String> {
    std::fs::read_to_string(&server.audit_log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
