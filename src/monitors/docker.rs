//! Local container state via `docker ps`

use async_trait::async_trait;

use super::{Monitor, MonitorError};
use crate::config::{defaults, DockerMonitorConfig};
use crate::remediation::{Cmd, Host};
use crate::types::{metrics, HealthRecord};

const PS_FORMAT: &str = "{{.Names}}|{{.Status}}|{{.State}}";

pub struct DockerMonitor {
    config: DockerMonitorConfig,
    host: Box<dyn Host>,
}

impl DockerMonitor {
    pub fn new(config: DockerMonitorConfig, host: Box<dyn Host>) -> Self {
        Self { config, host }
    }
}

#[async_trait]
impl Monitor for DockerMonitor {
    fn name(&self) -> &str {
        "docker"
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        if !self.host.program_available("docker").await {
            return Ok(vec![runtime_failure("docker not found on PATH")]);
        }

        let cmd = Cmd::new(
            "docker",
            &["ps", "-a", "--format", PS_FORMAT],
            defaults::DOCKER_PS_TIMEOUT_SECS,
        );
        let out = match self.host.run(&cmd).await {
            Ok(out) if out.success => out,
            Ok(out) => return Ok(vec![runtime_failure(&out.stderr)]),
            Err(e) => return Ok(vec![runtime_failure(&e.to_string())]),
        };

        Ok(parse_ps(&out.stdout)
            .into_iter()
            .filter(|c| !self.config.ignore.iter().any(|i| i == c.name))
            .map(ContainerLine::into_record)
            .collect())
    }
}

fn runtime_failure(error: &str) -> HealthRecord {
    HealthRecord::new(
        metrics::DOCKER_CONTAINER,
        false,
        format!("Failed to check local Docker: {error}"),
    )
    .with("host", "local")
    .with("error", error)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContainerLine<'a> {
    name: &'a str,
    status_text: &'a str,
    state: &'a str,
}

impl ContainerLine<'_> {
    /// Health check result embedded in the status text, if the image has one.
    fn health(&self) -> Option<&'static str> {
        if self.status_text.contains("(unhealthy)") {
            Some("unhealthy")
        } else if self.status_text.contains("(health: starting)") {
            Some("starting")
        } else if self.status_text.contains("(healthy)") {
            Some("healthy")
        } else {
            None
        }
    }

    fn into_record(self) -> HealthRecord {
        let health = self.health();
        let healthy = self.state == "running" && health.map_or(true, |h| h == "healthy");
        let message = match health {
            Some(h) => format!("{}: {} ({h})", self.name, self.state),
            None => format!("{}: {}", self.name, self.state),
        };
        let record = HealthRecord::new(metrics::DOCKER_CONTAINER, healthy, message)
            .with("host", "local")
            .with("container", self.name)
            .with("status", self.state)
            .with("status_text", self.status_text);
        match health {
            Some(h) => record.with("health", h),
            None => record,
        }
    }
}

fn parse_ps(stdout: &str) -> Vec<ContainerLine<'_>> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(3, '|');
            Some(ContainerLine {
                name: parts.next().filter(|n| !n.is_empty())?,
                status_text: parts.next()?,
                state: parts.next()?,
            })
        })
        .collect()
}
