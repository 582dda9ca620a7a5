//! Home Assistant automations, entities and integrations over the REST API
//!
//! Records name the instance but never carry its URL or token; remediation
//! resolves those from the same config section.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Monitor, MonitorError};
use crate::config::{defaults, HomeAssistantInstance, HomeAssistantMonitorConfig};
use crate::types::{ha_issues, metrics, HealthRecord};

pub struct HomeAssistantMonitor {
    config: HomeAssistantMonitorConfig,
    http: reqwest::Client,
}

impl HomeAssistantMonitor {
    pub fn new(config: HomeAssistantMonitorConfig) -> Result<Self, MonitorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("netmon-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    async fn get_json(&self, inst: &HomeAssistantInstance, endpoint: &str) -> Result<Value, reqwest::Error> {
        self.http
            .get(format!("{}/api/{endpoint}", inst.url.trim_end_matches('/')))
            .bearer_auth(&inst.token)
            .timeout(Duration::from_secs(defaults::HA_REQUEST_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn check_instance(&self, inst: &HomeAssistantInstance) -> Vec<HealthRecord> {
        let ping = self
            .http
            .get(format!("{}/api/", inst.url.trim_end_matches('/')))
            .bearer_auth(&inst.token)
            .timeout(Duration::from_secs(defaults::HA_CONNECT_TIMEOUT_SECS))
            .send()
            .await;
        match ping {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                return vec![connection_failure(&inst.name, &format!("HTTP {}", resp.status().as_u16()))];
            }
            Err(e) => return vec![connection_failure(&inst.name, &e.to_string())],
        }

        let mut records = vec![HealthRecord::new(
            metrics::HA_CONNECTION,
            true,
            format!("Home Assistant {} is reachable", inst.name),
        )
        .with("instance", inst.name.as_str())];

        if inst.check_automations || inst.check_entities {
            match self.get_json(inst, "states").await {
                Ok(Value::Array(states)) => {
                    if inst.check_automations {
                        records.extend(automation_records(&inst.name, &states));
                    }
                    if inst.check_entities {
                        records.extend(entity_records(&inst.name, &inst.entity_domains, &states));
                    }
                }
                Ok(_) => debug!(instance = %inst.name, "States endpoint returned a non-list"),
                Err(e) => debug!(instance = %inst.name, error = %e, "Skipping state checks"),
            }
        }

        // Needs an admin token on some installs; skipped quietly without one
        if inst.check_integrations {
            match self.get_json(inst, "config/config_entries/entry").await {
                Ok(Value::Array(entries)) => records.extend(integration_records(&inst.name, &entries)),
                Ok(_) => debug!(instance = %inst.name, "Config entries endpoint returned a non-list"),
                Err(e) => debug!(instance = %inst.name, error = %e, "Skipping integration checks"),
            }
        }

        records
    }
}

#[async_trait]
impl Monitor for HomeAssistantMonitor {
    fn name(&self) -> &str {
        "home_assistant"
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let checks = self.config.instances.iter().map(|i| self.check_instance(i));
        Ok(futures::future::join_all(checks).await.into_iter().flatten().collect())
    }
}

fn connection_failure(instance: &str, error: &str) -> HealthRecord {
    HealthRecord::new(
        metrics::HA_CONNECTION,
        false,
        format!("Failed to connect to Home Assistant at {instance}: {error}"),
    )
    .with("instance", instance)
    .with("error", error)
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn friendly_name(state: &Value) -> Option<&str> {
    state.get("attributes").and_then(|a| str_field(a, "friendly_name"))
}

/// Disabled (`off`) automations.
fn automation_records(instance: &str, states: &[Value]) -> Vec<HealthRecord> {
    states
        .iter()
        .filter_map(|s| {
            let entity_id = str_field(s, "entity_id")?;
            if !entity_id.starts_with("automation.") || str_field(s, "state") != Some("off") {
                return None;
            }
            let name = friendly_name(s).unwrap_or(entity_id);
            Some(
                HealthRecord::new(
                    metrics::HA_AUTOMATION,
                    false,
                    format!("Automation \"{name}\" is disabled"),
                )
                .with("instance", instance)
                .with("entity_id", entity_id)
                .with("friendly_name", name)
                .with("state", "off")
                .with("issue", ha_issues::DISABLED),
            )
        })
        .collect()
}

/// Entities in a watched domain reporting `unavailable` or `unknown`.
fn entity_records(instance: &str, domains: &[String], states: &[Value]) -> Vec<HealthRecord> {
    states
        .iter()
        .filter_map(|s| {
            let entity_id = str_field(s, "entity_id")?;
            let (domain, _) = entity_id.split_once('.')?;
            if !domains.iter().any(|d| d == domain) {
                return None;
            }
            let state = str_field(s, "state")?;
            if state != "unavailable" && state != "unknown" {
                return None;
            }
            let name = friendly_name(s).unwrap_or(entity_id);
            Some(
                HealthRecord::new(
                    metrics::HA_ENTITY,
                    false,
                    format!("{} \"{name}\" is {state}", capitalize(domain)),
                )
                .with("instance", instance)
                .with("entity_id", entity_id)
                .with("friendly_name", name)
                .with("domain", domain)
                .with("state", state)
                .with("issue", format!("{state}_state")),
            )
        })
        .collect()
}

/// Config entries in any state other than `loaded` / `not_loaded`.
fn integration_records(instance: &str, entries: &[Value]) -> Vec<HealthRecord> {
    entries
        .iter()
        .filter_map(|e| {
            let state = str_field(e, "state").unwrap_or("unknown");
            if state == "loaded" || state == "not_loaded" {
                return None;
            }
            let entry_id = str_field(e, "entry_id").unwrap_or_default();
            let domain = str_field(e, "domain").unwrap_or("unknown");
            let title = str_field(e, "title").unwrap_or(domain);
            Some(
                HealthRecord::new(
                    metrics::HA_INTEGRATION,
                    false,
                    format!("Integration \"{title}\" ({domain}) is in state: {state}"),
                )
                .with("instance", instance)
                .with("integration_id", entry_id)
                .with("domain", domain)
                .with("title", title)
                .with("state", state)
                .with("issue", ha_issues::INTEGRATION_FAILED),
            )
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn states() -> Vec<Value> {
        vec![
            json!({"entity_id": "automation.porch", "state": "off",
                   "attributes": {"friendly_name": "Porch lights"}}),
            json!({"entity_id": "automation.heating", "state": "on"}),
            json!({"entity_id": "light.kitchen", "state": "unavailable",
                   "attributes": {"friendly_name": "Kitchen"}}),
            json!({"entity_id": "sensor.outside", "state": "unknown"}),
            json!({"entity_id": "media_player.tv", "state": "unavailable"}),
            json!({"entity_id": "switch.fan", "state": "on"}),
        ]
    }

    fn domains() -> Vec<String> {
        defaults::HA_ENTITY_DOMAINS.iter().map(|d| (*d).to_string()).collect()
    }

    #[test]
    fn disabled_automations_are_reported() {
        let records = automation_records("house", &states());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "Automation \"Porch lights\" is disabled");
        assert_eq!(records[0].detail_str("entity_id"), Some("automation.porch"));
        assert_eq!(records[0].detail_str("instance"), Some("house"));
        assert!(records[0].detail("token").is_none());
    }

    #[test]
    fn only_watched_domains_are_checked() {
        let records = entity_records("house", &domains(), &states());
        let ids: Vec<&str> = records.iter().filter_map(|r| r.detail_str("entity_id")).collect();
        assert_eq!(ids, vec!["light.kitchen", "sensor.outside"]);
        assert_eq!(records[0].message, "Light \"Kitchen\" is unavailable");
        assert_eq!(records[1].issue(), Some("unknown_state"));
    }

    #[test]
    fn failed_integrations_are_reported() {
        let entries = vec![
            json!({"entry_id": "a1", "domain": "hue", "title": "Hue Bridge", "state": "setup_retry"}),
            json!({"entry_id": "b2", "domain": "mqtt", "state": "loaded"}),
            json!({"entry_id": "c3", "domain": "zha", "state": "not_loaded"}),
        ];
        let records = integration_records("house", &entries);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].detail_str("integration_id"), Some("a1"));
        assert_eq!(
            records[0].message,
            "Integration \"Hue Bridge\" (hue) is in state: setup_retry"
        );
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn instance(url: String) -> HomeAssistantInstance {
        HomeAssistantInstance {
            name: "house".to_string(),
            url,
            token: "secret".to_string(),
            check_automations: true,
            check_entities: true,
            check_integrations: true,
            entity_domains: domains(),
        }
    }

    #[tokio::test]
    async fn checks_a_live_instance() {
        let app = Router::new()
            .route("/api/", get(|| async { Json(json!({"message": "API running."})) }))
            .route("/api/states", get(|| async { Json(Value::Array(states())) }))
            .route(
                "/api/config/config_entries/entry",
                get(|| async { Json(json!([{"entry_id": "a1", "domain": "hue", "state": "failed_unload"}])) }),
            );
        let url = serve(app).await;
        let monitor = HomeAssistantMonitor::new(HomeAssistantMonitorConfig {
            enabled: true,
            instances: vec![instance(url)],
        })
        .unwrap();

        let records = monitor.run_checks().await.unwrap();
        let metrics_seen: Vec<&str> = records.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(
            metrics_seen,
            vec!["ha_connection", "ha_automation", "ha_entity", "ha_entity", "ha_integration"]
        );
        assert!(records[0].healthy);
    }

    #[tokio::test]
    async fn rejected_token_is_a_connection_failure() {
        let app = Router::new().route(
            "/api/",
            get(|| async { (axum::http::StatusCode::UNAUTHORIZED, "401: Unauthorized") }),
        );
        let url = serve(app).await;
        let monitor = HomeAssistantMonitor::new(HomeAssistantMonitorConfig {
            enabled: true,
            instances: vec![instance(url)],
        })
        .unwrap();

        let records = monitor.run_checks().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric, metrics::HA_CONNECTION);
        assert!(!records[0].healthy);
        assert_eq!(records[0].detail_str("error"), Some("HTTP 401"));
    }
}
