//! Proxy checker module: probes proxies and runs batches concurrently

use crate::config::{
    default_timeout, DEFAULT_CONCURRENCY, DEFAULT_FRAUD_API_URL, DEFAULT_GEO_API_URL,
};
use crate::proxy::aggregate::ResultAggregate;
use crate::proxy::models::{
    FailureReason, ProbeFailure, ProbeOutcome, ProxyCredential, ProxyRow, ProxyType,
};
use crate::proxy::parser::ProxyParser;
use crate::proxy::{fraud, geo};
use crate::Result;
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Semaphore};

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each network call
    pub timeout: Duration,
    /// Number of concurrent probes
    pub concurrency: usize,
    /// Geolocation endpoint, requested through the proxy
    pub geo_url: String,
    /// Fraud service base URL, requested directly
    pub fraud_url: String,
    /// Fraud service API key
    pub api_key: String,
    /// Scheme used to talk to the proxies
    pub proxy_type: ProxyType,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            concurrency: DEFAULT_CONCURRENCY,
            geo_url: DEFAULT_GEO_API_URL.to_string(),
            fraud_url: DEFAULT_FRAUD_API_URL.to_string(),
            api_key: String::new(),
            proxy_type: ProxyType::Http,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Zero is treated as one worker
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_geo_url(mut self, url: String) -> Self {
        self.geo_url = url;
        self
    }

    pub fn with_fraud_url(mut self, url: String) -> Self {
        self.fraud_url = url;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_proxy_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = proxy_type;
        self
    }
}

/// Sent once for every outcome recorded during a batch
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Outcomes recorded so far, including this one
    pub completed: usize,
    /// Number of lines in the batch
    pub total: usize,
    pub outcome: ProbeOutcome,
}

/// Proxy checker for scoring proxies
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    /// Client for the fraud service, never proxied
    direct_client: Client,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let direct_client = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            direct_client,
        })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Probe a single credential.
    ///
    /// Geolocates through the proxy, then scores the discovered public IP.
    /// Every error is turned into a failure outcome.
    pub async fn probe(&self, credential: &ProxyCredential) -> ProbeOutcome {
        let original_input = credential.to_full_string();
        let start = Instant::now();

        let client = match self.create_client(credential) {
            Ok(client) => client,
            Err(e) => {
                return ProbeOutcome::failure(
                    &original_input,
                    FailureReason::GeolocationUnreachable,
                    e.to_string(),
                )
            }
        };

        let location = match geo::locate(&client, &self.config.geo_url).await {
            Ok(location) => location,
            Err(e) => return ProbeOutcome::Failure(e.into_failure(&original_input)),
        };

        let report = match fraud::score(
            &self.direct_client,
            &self.config.fraud_url,
            &self.config.api_key,
            &location.public_ip,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => return ProbeOutcome::Failure(e.into_failure(&original_input)),
        };

        debug!(
            "Probed {} in {}ms: public IP {}, fraud score {}",
            credential,
            start.elapsed().as_millis(),
            location.public_ip,
            report.fraud_score
        );

        ProbeOutcome::Success(ProxyRow {
            proxy_host: credential.host.clone(),
            location: location.location(),
            public_ip: location.public_ip,
            isp: report.isp(),
            fraud_score: report.fraud_score,
            is_proxy: report.proxy,
            is_vpn: report.vpn,
            is_tor: report.tor,
            is_mobile: report.mobile,
            recent_abuse: report.recent_abuse,
            bot_status: report.bot_status,
            credential: credential.clone(),
        })
    }

    /// Parse one raw line and probe it when it is well formed
    pub async fn check_line(&self, line: &str) -> ProbeOutcome {
        match ProxyParser::parse_line(line) {
            Ok(credential) => match self.probe(&credential).await {
                // Keep the line exactly as the user supplied it
                ProbeOutcome::Failure(failure) => ProbeOutcome::Failure(ProbeFailure {
                    original_input: line.to_string(),
                    ..failure
                }),
                success => success,
            },
            Err(err) => ProbeOutcome::Failure(err.into()),
        }
    }

    /// Check every line and wait for all of them
    pub async fn run_batch(&self, lines: Vec<String>) -> ResultAggregate {
        self.run_batch_with_progress(lines, None).await
    }

    /// Check every line with at most `concurrency` probes in flight.
    ///
    /// Every probe runs as its own tokio task; the stream only spawns the
    /// next one when a slot frees up. Each line produces exactly one outcome
    /// in the returned aggregate, which is only handed back after every task
    /// has been joined.
    pub async fn run_batch_with_progress(
        &self,
        lines: Vec<String>,
        progress: Option<mpsc::UnboundedSender<BatchProgress>>,
    ) -> ResultAggregate {
        let total = lines.len();
        let concurrency = self.config.concurrency.max(1);
        info!(
            "Checking {} proxies with {} workers, timeout {}s",
            total,
            concurrency,
            self.config.timeout.as_secs()
        );

        let aggregate = Arc::new(Mutex::new(ResultAggregate::new()));
        let semaphore = Arc::new(Semaphore::new(concurrency));

        stream::iter(lines)
            .map(|line| {
                let sem = Arc::clone(&semaphore);
                let aggregate = Arc::clone(&aggregate);
                let progress = progress.clone();
                let checker = self.clone();
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquiring cannot fail
                    let _permit = sem.acquire().await.ok();
                    let outcome = checker.check_line(&line).await;

                    if let ProbeOutcome::Failure(ref failure) = outcome {
                        debug!("Probe failed: {}", failure);
                    }

                    let mut aggregate = aggregate.lock().await;
                    aggregate.record(outcome.clone());
                    let completed = aggregate.len();
                    drop(aggregate);

                    if let Some(tx) = progress {
                        let _ = tx.send(BatchProgress {
                            completed,
                            total,
                            outcome,
                        });
                    }
                })
            })
            .buffer_unordered(concurrency)
            .for_each(|joined| async move {
                if let Err(e) = joined {
                    error!("Probe task did not complete: {}", e);
                }
            })
            .await;

        let mut aggregate = match Arc::try_unwrap(aggregate) {
            Ok(aggregate) => aggregate.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };
        aggregate.finish();

        info!(
            "Batch complete: {} good ({} high risk), {} failed",
            aggregate.summary.total,
            aggregate.summary.high_risk,
            aggregate.failures.len()
        );

        aggregate
    }

    /// Create a reqwest client that sends both HTTP and HTTPS traffic through the proxy
    fn create_client(&self, credential: &ProxyCredential) -> Result<Client> {
        let proxy_type = self.config.proxy_type;

        let reqwest_proxy = match proxy_type {
            ProxyType::Http | ProxyType::Https => {
                ReqwestProxy::all(credential.endpoint(proxy_type))?
                    .basic_auth(&credential.username, &credential.password)
            }
            ProxyType::Socks5 => ReqwestProxy::all(credential.url(proxy_type)?)?,
        };

        let client = Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.timeout, default_timeout());
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.geo_url, DEFAULT_GEO_API_URL);
        assert_eq!(config.fraud_url, DEFAULT_FRAUD_API_URL);
        assert_eq!(config.proxy_type, ProxyType::Http);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_concurrency(20)
            .with_geo_url("http://geo.test/json/".to_string())
            .with_fraud_url("http://fraud.test/ip".to_string())
            .with_api_key("KEY".to_string())
            .with_proxy_type(ProxyType::Socks5);

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.geo_url, "http://geo.test/json/");
        assert_eq!(config.fraud_url, "http://fraud.test/ip");
        assert_eq!(config.api_key, "KEY");
        assert_eq!(config.proxy_type, ProxyType::Socks5);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = CheckerConfig::new().with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }

    #[tokio::test]
    async fn test_malformed_line_never_touches_network() {
        let checker = ProxyChecker::new().unwrap();
        let outcome = checker.check_line("badline").await;
        match outcome {
            ProbeOutcome::Failure(failure) => {
                assert_eq!(failure.reason, FailureReason::MalformedInput);
                assert_eq!(failure.original_input, "badline");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_socks5_client_accepts_reserved_password_characters() {
        let checker =
            ProxyChecker::with_config(CheckerConfig::new().with_proxy_type(ProxyType::Socks5))
                .unwrap();
        for password in ["p/ss", "p#ss", "p?ss", "p@ss"] {
            let credential = ProxyCredential::new("127.0.0.1", "1080", "user", password);
            assert!(checker.create_client(&credential).is_ok(), "{}", password);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let checker = ProxyChecker::new().unwrap();
        let aggregate = checker.run_batch(Vec::new()).await;
        assert!(aggregate.is_empty());
        assert_eq!(aggregate.summary.total, 0);
        assert!(aggregate.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_batch_of_malformed_lines() {
        let checker = ProxyChecker::with_config(CheckerConfig::new().with_concurrency(3)).unwrap();
        let lines: Vec<String> = (0..25).map(|i| format!("bad{}", i)).collect();
        let aggregate = checker.run_batch(lines).await;
        assert_eq!(aggregate.failures.len(), 25);
        assert!(aggregate.rows.is_empty());
        assert!(aggregate
            .failures
            .iter()
            .all(|f| f.reason == FailureReason::MalformedInput));
    }
}
