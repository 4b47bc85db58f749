#![allow(dead_code)]

use proxy_score::proxy::{CheckerConfig, ProxyChecker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Geolocation URL requested through the mock proxy; never resolved locally
pub const GEO_URL: &str = "http://geo.test/json/";

pub type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A mock HTTP service answering every request with the handler's JSON body
pub struct MockServer {
    pub port: u16,
    /// Request heads received so far
    pub requests: Arc<Mutex<Vec<String>>>,
    /// Highest number of requests handled at the same time
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub async fn spawn_server(handler: Handler, delay: Duration) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let server = MockServer {
        port,
        requests: Arc::clone(&requests),
        max_in_flight: Arc::clone(&max_in_flight),
    };

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                continue;
            };
            let handler = Arc::clone(&handler);
            let requests = Arc::clone(&requests);
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);

            tokio::spawn(async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(current, Ordering::SeqCst);

                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let body = handler(&head);
                requests.lock().unwrap().push(head);

                tokio::time::sleep(delay).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    server
}

/// A mock proxy that answers geolocation requests with a fixed public IP
pub async fn spawn_geo_proxy(public_ip: &str) -> MockServer {
    let body = format!(
        r#"{{"status":"success","query":"{}","city":"Berlin","regionName":"Land Berlin","country":"Germany"}}"#,
        public_ip
    );
    spawn_server(Arc::new(move |_| body.clone()), Duration::ZERO).await
}

/// A mock proxy whose geolocation answer reports failure
pub async fn spawn_rejecting_geo_proxy() -> MockServer {
    spawn_server(
        Arc::new(|_| r#"{"status":"fail","message":"invalid query"}"#.to_string()),
        Duration::ZERO,
    )
    .await
}

/// A mock fraud service keyed by the IP in the request path.
///
/// `10.0.0.1` scores 90, `10.0.0.2` scores 20, `10.0.0.3` is rejected,
/// `10.0.0.4` reports only a score; any other IP scores 50.
pub async fn spawn_fraud_service() -> MockServer {
    spawn_server(
        Arc::new(|head: &str| {
            let target = head.split_whitespace().nth(1).unwrap_or_default();
            let ip = target
                .split('?')
                .next()
                .unwrap_or_default()
                .rsplit('/')
                .next()
                .unwrap_or_default();
            match ip {
                "10.0.0.1" => fraud_body(90),
                "10.0.0.2" => fraud_body(20),
                "10.0.0.3" => r#"{"success":false,"message":"Invalid IP address."}"#.to_string(),
                "10.0.0.4" => r#"{"success":true,"fraud_score":5}"#.to_string(),
                _ => fraud_body(50),
            }
        }),
        Duration::ZERO,
    )
    .await
}

fn fraud_body(score: u8) -> String {
    format!(
        r#"{{"success":true,"fraud_score":{},"ISP":"Mock ISP","proxy":true,"vpn":false,"tor":false,"mobile":false,"recent_abuse":true,"bot_status":false}}"#,
        score
    )
}

/// A localhost port with nothing listening on it
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn checker(fraud_url: &str, concurrency: usize) -> ProxyChecker {
    let config = CheckerConfig::new()
        .with_geo_url(GEO_URL.to_string())
        .with_fraud_url(format!("{}/ip", fraud_url))
        .with_api_key("TESTKEY".to_string())
        .with_timeout(Duration::from_secs(5))
        .with_concurrency(concurrency);
    ProxyChecker::with_config(config).unwrap()
}
