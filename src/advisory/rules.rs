//! Deterministic remediation rules
//!
//! Used when the advisory backend is unreachable, or on its own when
//! `advisory.provider = "rules"`. The first matching rule wins per record.
//!
//! | metric           | condition              | action (if allowed) | severity |
//! |------------------|------------------------|---------------------|----------|
//! | `service_status` |                        | `restart_service`   | high     |
//! | `disk_usage`     | value > 90             | `clear_disk_space`  | high     |
//! | `network_ping`   |                        | `alert_only`        | medium   |
//! | `web_endpoint`   |                        | `alert_only`        | high     |
//! | `mount_status`   | issue = `stale_mount`  | `remount`           | high     |
//! | `mount_status`   | issue = `not_mounted`  | `unmount_remount`   | high     |
//! | `mount_status`   | otherwise              | `alert_only`        | high     |
//!
//! A disallowed service or disk action produces nothing for that record,
//! while a disallowed mount action degrades to `alert_only`.

use async_trait::async_trait;
use serde_json::Value;

use super::{unhealthy, DecisionError, DecisionProvider};
use crate::types::{metrics, mount_issues, Action, ActionKind, ActionParams, HealthRecord, Severity};

/// Disk usage percentage above which space is reclaimed.
const DISK_CLEANUP_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    /// Apply the rule table to already-filtered unhealthy records.
    pub fn decide(&self, issues: &[&HealthRecord], allowed: &[ActionKind]) -> Vec<Action> {
        issues
            .iter()
            .filter_map(|record| rule_for(record, allowed))
            .collect()
    }
}

#[async_trait]
impl DecisionProvider for RuleEngine {
    fn name(&self) -> &str {
        "rules"
    }

    async fn analyze(
        &self,
        records: &[HealthRecord],
        allowed: &[ActionKind],
    ) -> Result<Vec<Action>, DecisionError> {
        Ok(self.decide(&unhealthy(records), allowed))
    }
}

fn rule_for(record: &HealthRecord, allowed: &[ActionKind]) -> Option<Action> {
    let permits = |kind: &ActionKind| allowed.contains(kind);
    let make = |severity, root_cause: &str, action, params, reasoning: &str| Action {
        issue: record.message.clone(),
        severity,
        root_cause: root_cause.to_string(),
        action,
        action_params: params,
        reasoning: reasoning.to_string(),
    };

    match record.metric.as_str() {
        metrics::SERVICE_STATUS if permits(&ActionKind::RestartService) => Some(make(
            Severity::High,
            "Service is not running",
            ActionKind::RestartService,
            params([("service", record.detail("service").cloned().unwrap_or(Value::Null))]),
            "Service is inactive, attempting restart",
        )),
        metrics::DISK_USAGE
            if record.value().unwrap_or(0.0) > DISK_CLEANUP_PERCENT
                && permits(&ActionKind::ClearDiskSpace) =>
        {
            Some(make(
                Severity::High,
                "Disk space critically low",
                ActionKind::ClearDiskSpace,
                params([("partition", record.detail("partition").cloned().unwrap_or(Value::Null))]),
                "Clear temporary files and logs to free disk space",
            ))
        }
        metrics::NETWORK_PING => Some(make(
            Severity::Medium,
            "Network connectivity issue",
            ActionKind::AlertOnly,
            ActionParams::new(),
            "Network issues require investigation",
        )),
        metrics::WEB_ENDPOINT => Some(make(
            Severity::High,
            "Web service not responding",
            ActionKind::AlertOnly,
            ActionParams::new(),
            "Endpoint check required before automated action",
        )),
        metrics::MOUNT_STATUS => {
            let config = || params([("mount_config", record.mount_config().cloned().unwrap_or(Value::Null))]);
            Some(match record.issue() {
                Some(mount_issues::STALE_MOUNT) if permits(&ActionKind::Remount) => make(
                    Severity::High,
                    "Stale or hung mount (common with NFS)",
                    ActionKind::Remount,
                    config(),
                    "Remount to recover stale NFS/network mount",
                ),
                Some(mount_issues::NOT_MOUNTED) if permits(&ActionKind::UnmountRemount) => make(
                    Severity::High,
                    "Mount not active",
                    ActionKind::UnmountRemount,
                    config(),
                    "Unmount and remount to restore mount",
                ),
                _ => make(
                    Severity::High,
                    "Mount issue",
                    ActionKind::AlertOnly,
                    ActionParams::new(),
                    "Mount requires investigation",
                ),
            })
        }
        _ => None,
    }
}

fn params<const N: usize>(pairs: [(&str, Value); N]) -> ActionParams {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
