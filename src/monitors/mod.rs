//! Monitor collaborators
//!
//! Each monitor produces a list of [`HealthRecord`]s per cycle and may fail
//! independently. The cycle engine isolates failures (and panics) per
//! monitor, so a broken check never hides the results of the others.
//!
//! - [`SystemMonitor`]: load, memory, disk, systemd services, mounts
//! - [`NetworkMonitor`]: ICMP reachability via `ping`
//! - [`WebMonitor`]: HTTP endpoint checks
//! - [`HomeAssistantMonitor`]: automations, entities and integrations
//! - [`DockerMonitor`]: local container state

use async_trait::async_trait;

use crate::config::MonitoringConfig;
use crate::remediation::{HostError, SystemHost};
use crate::types::HealthRecord;

mod docker;
mod home_assistant;
mod network;
mod system;
mod web;

pub use docker::DockerMonitor;
pub use home_assistant::HomeAssistantMonitor;
pub use network::NetworkMonitor;
pub use system::SystemMonitor;
pub use web::WebMonitor;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("{0}")]
    Check(String),
}

/// A source of health observations.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run every check this monitor owns.
    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError>;
}

/// Build the enabled monitors from configuration.
pub fn from_config(config: &MonitoringConfig) -> Result<Vec<Box<dyn Monitor>>, MonitorError> {
    let mut monitors: Vec<Box<dyn Monitor>> = Vec::new();
    if config.system.enabled {
        monitors.push(Box::new(SystemMonitor::new(config.system.clone())));
    }
    if config.network.enabled && !config.network.ping_hosts.is_empty() {
        monitors.push(Box::new(NetworkMonitor::new(config.network.clone())));
    }
    if config.web.enabled && !config.web.endpoints.is_empty() {
        monitors.push(Box::new(WebMonitor::new(config.web.clone())?));
    }
    let ha = &config.home_assistant;
    if ha.enabled && !ha.instances.is_empty() {
        monitors.push(Box::new(HomeAssistantMonitor::new(ha.clone())?));
    }
    if config.docker.enabled {
        let host = SystemHost::new()?;
        monitors.push(Box::new(DockerMonitor::new(config.docker.clone(), Box::new(host))));
    }
    Ok(monitors)
}
