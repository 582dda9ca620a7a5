//! HealthRecord: the common shape every monitor emits

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metric names with special meaning to the decision layer.
pub mod metrics {
    pub const CPU_USAGE: &str = "cpu_usage";
    pub const MEMORY_USAGE: &str = "memory_usage";
    pub const DISK_USAGE: &str = "disk_usage";
    pub const SERVICE_STATUS: &str = "service_status";
    pub const MOUNT_STATUS: &str = "mount_status";
    pub const NETWORK_PING: &str = "network_ping";
    pub const WEB_ENDPOINT: &str = "web_endpoint";
    pub const HA_CONNECTION: &str = "ha_connection";
    pub const HA_AUTOMATION: &str = "ha_automation";
    pub const HA_ENTITY: &str = "ha_entity";
    pub const HA_INTEGRATION: &str = "ha_integration";
    pub const DOCKER_CONTAINER: &str = "docker_container";
}

/// Mount issue tags carried in the `issue` field of `mount_status` records.
pub mod mount_issues {
    pub const STALE_MOUNT: &str = "stale_mount";
    pub const NOT_MOUNTED: &str = "not_mounted";
}

/// Issue tags on Home Assistant records.
pub mod ha_issues {
    pub const DISABLED: &str = "disabled";
    pub const INTEGRATION_FAILED: &str = "integration_failed";
}

/// One health observation.
///
/// The three common fields are typed; everything metric-specific (service
/// name, partition, mount config, measured value, issue tag, ...) lives in
/// `details` and is flattened into the same JSON object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub metric: String,
    pub healthy: bool,
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl HealthRecord {
    pub fn new(metric: impl Into<String>, healthy: bool, message: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            healthy,
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Attach a metric-specific field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Service name for `service_status` records.
    pub fn service(&self) -> Option<&str> {
        self.detail_str("service")
    }

    /// Mount point for `disk_usage` records.
    pub fn partition(&self) -> Option<&str> {
        self.detail_str("partition")
    }

    /// Measured value (percentages for usage metrics).
    pub fn value(&self) -> Option<f64> {
        self.details.get("value").and_then(Value::as_f64)
    }

    /// Issue tag (e.g. `stale_mount`).
    pub fn issue(&self) -> Option<&str> {
        self.detail_str("issue")
    }

    /// Mount configuration carried by `mount_status` records.
    pub fn mount_config(&self) -> Option<&Value> {
        self.details.get("config")
    }
}
