//! HTTP endpoint checks

use async_trait::async_trait;
use std::time::{Duration, Instant};

use super::{Monitor, MonitorError};
use crate::config::{WebEndpoint, WebMonitorConfig};
use crate::types::{metrics, HealthRecord};

pub struct WebMonitor {
    config: WebMonitorConfig,
    http: reqwest::Client,
}

impl WebMonitor {
    pub fn new(config: WebMonitorConfig) -> Result<Self, MonitorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("netmon-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    async fn check_endpoint(&self, endpoint: &WebEndpoint) -> HealthRecord {
        let started = Instant::now();
        let result = self
            .http
            .get(&endpoint.url)
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .send()
            .await;
        let elapsed_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        let base = |healthy: bool, message: String| {
            HealthRecord::new(metrics::WEB_ENDPOINT, healthy, message)
                .with("name", endpoint.name.as_str())
                .with("url", endpoint.url.as_str())
                .with("expected_status", endpoint.expected_status)
        };

        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let healthy = status == endpoint.expected_status;
                let message = if healthy {
                    format!("{} responded {status} in {elapsed_ms}ms", endpoint.name)
                } else {
                    format!(
                        "{} returned {status}, expected {}",
                        endpoint.name, endpoint.expected_status
                    )
                };
                base(healthy, message)
                    .with("status_code", status)
                    .with("response_time", elapsed_ms)
            }
            Err(e) if e.is_timeout() => base(false, format!("{} timed out", endpoint.name))
                .with("error", "timeout"),
            Err(e) => base(false, format!("{} is unreachable: {e}", endpoint.name))
                .with("error", e.to_string()),
        }
    }
}

#[async_trait]
impl Monitor for WebMonitor {
    fn name(&self) -> &str {
        "web"
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let checks = self.config.endpoints.iter().map(|e| self.check_endpoint(e));
        Ok(futures::future::join_all(checks).await)
    }
}
