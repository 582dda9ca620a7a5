//! ICMP reachability via the system `ping` binary

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use super::{Monitor, MonitorError};
use crate::config::NetworkMonitorConfig;
use crate::types::{metrics, HealthRecord};

pub struct NetworkMonitor {
    config: NetworkMonitorConfig,
}

impl NetworkMonitor {
    pub fn new(config: NetworkMonitorConfig) -> Self {
        Self { config }
    }

    async fn ping(&self, host: &str) -> HealthRecord {
        let wait = self.config.ping_timeout_secs.max(1);
        let output = tokio::time::timeout(
            Duration::from_secs(wait + 3),
            Command::new("ping")
                .args(["-c", "1", "-W", &wait.to_string(), host])
                .output(),
        )
        .await;

        let record = |healthy: bool, message: String| {
            HealthRecord::new(metrics::NETWORK_PING, healthy, message).with("host", host)
        };

        match output {
            Ok(Ok(out)) => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                match parse_rtt_ms(&stdout) {
                    Some(rtt) if out.status.success() => {
                        record(true, format!("Ping to {host}: {rtt}ms")).with("avg_latency", rtt)
                    }
                    _ if out.status.success() => record(true, format!("Ping to {host}: ok")),
                    _ => record(false, format!("Ping to {host}: 100% loss"))
                        .with("packet_loss", 100),
                }
            }
            Ok(Err(e)) => record(false, format!("Failed to ping {host}: {e}"))
                .with("error", e.to_string()),
            Err(_) => record(false, format!("Ping to {host} timed out")).with("error", "timeout"),
        }
    }
}

#[async_trait]
impl Monitor for NetworkMonitor {
    fn name(&self) -> &str {
        "network"
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let pings = self.config.ping_hosts.iter().map(|h| self.ping(h));
        Ok(futures::future::join_all(pings).await)
    }
}

/// Average round-trip time from ping's summary line.
fn parse_rtt_ms(output: &str) -> Option<f64> {
    static RTT: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = RTT
        .get_or_init(|| Regex::new(r"rtt min/avg/max/mdev = [\d.]+/([\d.]+)/").ok())
        .as_ref()?;
    pattern.captures(output)?.get(1)?.as_str().parse().ok()
}
