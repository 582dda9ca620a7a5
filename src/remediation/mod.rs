//! Remediation executor
//!
//! Dispatches an [`Action`] to one concrete operation, gated by a
//! [`CooldownLedger`]. The executor takes `&mut self`: it has exactly one
//! owner (the cycle engine inside the scheduler task), so attempts for the
//! same key can never race past the cooldown check.

use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{HomeAssistantInstance, RemediationConfig};
use crate::types::{Action, ActionKind};

mod cooldown;
mod host;
pub mod operations;

pub use cooldown::{AttemptRecord, CooldownKey, CooldownLedger};
pub use host::{Cmd, CmdOutput, Host, HostError, PostRequest, Signal, SystemHost};
pub use operations::{
    CleanupReport, CleanupStep, HomeAssistantTarget, HomeAssistantTargets, StepOutcome,
};

/// `(success, message)` of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
}

impl ExecutionResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub struct RemediationExecutor {
    host: Box<dyn Host>,
    ledger: CooldownLedger,
    settle_delay: Duration,
    ha_targets: HomeAssistantTargets,
}

impl RemediationExecutor {
    pub fn new(host: Box<dyn Host>, config: &RemediationConfig) -> Self {
        Self {
            host,
            ledger: CooldownLedger::new(config.max_attempts, config.cooldown()),
            settle_delay: config.settle_delay(),
            ha_targets: HomeAssistantTargets::new(),
        }
    }

    /// Home Assistant servers that automation and integration actions may
    /// name through their `instance` param.
    #[must_use]
    pub fn with_home_assistant(mut self, instances: &[HomeAssistantInstance]) -> Self {
        self.ha_targets = instances
            .iter()
            .map(|i| {
                let target = HomeAssistantTarget {
                    url: i.url.clone(),
                    token: i.token.clone(),
                };
                (i.name.clone(), target)
            })
            .collect();
        self
    }

    pub async fn execute(&mut self, action: &Action) -> ExecutionResult {
        self.execute_at(action, Instant::now()).await
    }

    /// Execute with an explicit clock reading for the cooldown ledger.
    pub async fn execute_at(&mut self, action: &Action, now: Instant) -> ExecutionResult {
        let key = action.cooldown_key();
        if self.ledger.is_blocked(&key, now) {
            warn!(action = %action.action, params = %key.1, "Action blocked by cooldown");
            return ExecutionResult::failed(format!("Action {} in cooldown period", action.action));
        }
        self.ledger.record(key, now);

        let result = self.dispatch(action).await;
        info!(
            action = %action.action,
            success = result.success,
            message = %result.message,
            "Remediation executed"
        );
        result
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    async fn dispatch(&self, action: &Action) -> ExecutionResult {
        let host = self.host.as_ref();
        let settle = self.settle_delay;
        let params = &action.action_params;

        match &action.action {
            ActionKind::RestartService => {
                operations::restart_service(host, action.param_str("service"), settle).await
            }
            ActionKind::ClearCache => {
                operations::clear_cache(host, action.param_str("type").unwrap_or("system")).await
            }
            ActionKind::KillHungProcess => {
                operations::kill_hung_process(host, pid_param(params.get("pid")), settle).await
            }
            ActionKind::RestartContainer => {
                let name = action.param_str("container").or_else(|| action.param_str("name"));
                operations::restart_container(host, name).await
            }
            ActionKind::ClearDiskSpace => {
                let report = operations::clear_disk_space(host, action.param_str("partition")).await;
                if report.failed_steps() > 0 {
                    warn!(report = %report, "Disk cleanup finished with failed steps");
                }
                ExecutionResult::succeeded(report.to_string())
            }
            ActionKind::Remount => {
                operations::remount(host, params.get("mount_config"), settle).await
            }
            ActionKind::UnmountRemount => {
                operations::unmount_remount(host, params.get("mount_config"), settle).await
            }
            ActionKind::EnableAutomation => {
                operations::enable_automation(host, params, &self.ha_targets).await
            }
            ActionKind::ReloadIntegration => {
                operations::reload_integration(host, params, &self.ha_targets).await
            }
            ActionKind::AlertOnly => ExecutionResult::succeeded("Alert only - no action taken"),
            ActionKind::Unknown(_) => ExecutionResult::failed("unknown action type"),
        }
    }
}

/// PIDs arrive as numbers or numeric strings.
fn pid_param(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|p| i32::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionParams, Severity};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Records every side effect; commands succeed unless their display
    /// string starts with one of `failing`.
    #[derive(Default)]
    struct FakeHost {
        log: Arc<Mutex<Vec<String>>>,
        failing: Vec<&'static str>,
        stdout: Vec<(&'static str, &'static str)>,
        live_pids: Mutex<HashSet<i32>>,
        ignore_sigterm: bool,
        accessible: bool,
        http_status: u16,
    }

    impl FakeHost {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Host for FakeHost {
        async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, HostError> {
            let line = cmd.to_string();
            self.log.lock().unwrap().push(line.clone());
            let stdout = self
                .stdout
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix))
                .map(|(_, out)| (*out).to_string())
                .unwrap_or_default();
            let success = !self.failing.iter().any(|f| line.starts_with(f));
            Ok(CmdOutput {
                success,
                stdout,
                stderr: if success { String::new() } else { "boom".to_string() },
            })
        }

        async fn program_available(&self, program: &str) -> bool {
            program == "docker"
        }

        fn path_exists(&self, _path: &str) -> bool {
            true
        }

        fn process_exists(&self, pid: i32) -> bool {
            self.live_pids.lock().unwrap().contains(&pid)
        }

        fn signal(&self, pid: i32, signal: Signal) -> Result<(), HostError> {
            self.log.lock().unwrap().push(format!("signal {pid} {signal:?}"));
            if signal == Signal::Kill || !self.ignore_sigterm {
                self.live_pids.lock().unwrap().remove(&pid);
            }
            Ok(())
        }

        async fn path_accessible(&self, path: &str, _timeout: Duration) -> bool {
            self.log.lock().unwrap().push(format!("access {path}"));
            self.accessible
        }

        async fn http_post(&self, request: &PostRequest) -> Result<u16, HostError> {
            self.log.lock().unwrap().push(format!("POST {}", request.url));
            Ok(self.http_status)
        }
    }

    fn config() -> RemediationConfig {
        RemediationConfig {
            settle_delay_secs: 0,
            ..RemediationConfig::default()
        }
    }

    fn action(kind: ActionKind, params: serde_json::Value) -> Action {
        let action_params: ActionParams = match params {
            serde_json::Value::Object(m) => m,
            _ => ActionParams::new(),
        };
        Action {
            issue: "test".to_string(),
            severity: Severity::High,
            root_cause: String::new(),
            action: kind,
            action_params,
            reasoning: String::new(),
        }
    }

    fn executor(host: FakeHost) -> (RemediationExecutor, Arc<Mutex<Vec<String>>>) {
        let log = host.log.clone();
        (RemediationExecutor::new(Box::new(host), &config()), log)
    }

    #[tokio::test]
    async fn fourth_attempt_in_window_is_blocked_without_side_effects() {
        let (mut exec, log) = executor(FakeHost {
            failing: vec!["sh"],
            ..FakeHost::default()
        });
        let a = action(ActionKind::ClearCache, json!({"type": "system"}));
        let t0 = Instant::now();

        for i in 0..3 {
            let r = exec.execute_at(&a, t0 + Duration::from_secs(i)).await;
            assert!(!r.success);
            assert!(r.message.starts_with("Failed to clear cache"));
        }
        let blocked = exec.execute_at(&a, t0 + Duration::from_secs(100)).await;
        assert_eq!(blocked.message, "Action clear_cache in cooldown period");
        assert_eq!(log.lock().unwrap().len(), 3);
        assert_eq!(exec.ledger().get(&a.cooldown_key()).unwrap().consecutive, 3);

        let after = exec.execute_at(&a, t0 + Duration::from_secs(400)).await;
        assert!(after.message.starts_with("Failed to clear cache"));
        assert_eq!(exec.ledger().get(&a.cooldown_key()).unwrap().consecutive, 1);
    }

    #[tokio::test]
    async fn unknown_kind_fails_but_is_recorded() {
        let (mut exec, log) = executor(FakeHost::default());
        let a = action(ActionKind::Unknown("reboot_host".into()), json!({}));
        let r = exec.execute(&a).await;
        assert_eq!(r, ExecutionResult::failed("unknown action type"));
        assert_eq!(exec.ledger().get(&a.cooldown_key()).unwrap().consecutive, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn alert_only_has_no_side_effects() {
        let (mut exec, log) = executor(FakeHost::default());
        let r = exec.execute(&action(ActionKind::AlertOnly, json!({}))).await;
        assert!(r.success);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn restart_service_verifies_active() {
        let host = FakeHost {
            stdout: vec![
                ("systemctl list-unit-files", "nginx.service enabled"),
                ("systemctl is-active", "active\n"),
            ],
            ..FakeHost::default()
        };
        let (mut exec, log) = executor(host);
        let r = exec
            .execute(&action(ActionKind::RestartService, json!({"service": "nginx"})))
            .await;
        assert!(r.success, "{}", r.message);
        assert_eq!(
            log.lock().unwrap().clone(),
            vec![
                "systemctl list-unit-files nginx.service",
                "systemctl restart nginx",
                "systemctl is-active nginx",
            ]
        );
    }

    #[tokio::test]
    async fn restart_service_rejects_unknown_unit() {
        let (mut exec, log) = executor(FakeHost::default());
        let r = exec
            .execute(&action(ActionKind::RestartService, json!({"service": "ghost"})))
            .await;
        assert_eq!(r.message, "Service ghost not found");
        assert_eq!(log.lock().unwrap().len(), 1);

        let r = exec.execute(&action(ActionKind::RestartService, json!({}))).await;
        assert_eq!(r.message, "No service name provided");
    }

    #[tokio::test]
    async fn restart_service_inactive_after_restart_fails() {
        let host = FakeHost {
            stdout: vec![
                ("systemctl list-unit-files", "nginx.service enabled"),
                ("systemctl is-active", "failed"),
            ],
            ..FakeHost::default()
        };
        let (mut exec, _) = executor(host);
        let r = exec
            .execute(&action(ActionKind::RestartService, json!({"service": "nginx"})))
            .await;
        assert!(!r.success);
        assert_eq!(r.message, "Service nginx restarted but not active");
    }

    #[tokio::test]
    async fn unsupported_cache_type_fails() {
        let (mut exec, log) = executor(FakeHost::default());
        let r = exec.execute(&action(ActionKind::ClearCache, json!({"type": "dns"}))).await;
        assert_eq!(r.message, "Unknown cache type: dns");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn kill_escalates_when_sigterm_is_ignored() {
        let host = FakeHost {
            ignore_sigterm: true,
            ..FakeHost::default()
        };
        host.live_pids.lock().unwrap().insert(4242);
        let (mut exec, log) = executor(host);
        let r = exec
            .execute(&action(ActionKind::KillHungProcess, json!({"pid": 4242})))
            .await;
        assert_eq!(r.message, "Force killed process 4242");
        assert_eq!(
            log.lock().unwrap().clone(),
            vec!["signal 4242 Terminate", "signal 4242 Kill"]
        );
    }

    #[tokio::test]
    async fn kill_graceful_and_missing() {
        let host = FakeHost::default();
        host.live_pids.lock().unwrap().insert(77);
        let (mut exec, _) = executor(host);
        let r = exec
            .execute(&action(ActionKind::KillHungProcess, json!({"pid": "77"})))
            .await;
        assert_eq!(r.message, "Successfully terminated process 77");

        let r = exec
            .execute(&action(ActionKind::KillHungProcess, json!({"pid": 78})))
            .await;
        assert_eq!(r.message, "Process 78 not found");

        let r = exec.execute(&action(ActionKind::KillHungProcess, json!({}))).await;
        assert_eq!(r.message, "No PID provided");
    }

    #[tokio::test]
    async fn restart_container_reports_runtime_result() {
        let (mut exec, log) = executor(FakeHost::default());
        let r = exec
            .execute(&action(ActionKind::RestartContainer, json!({"container": "app"})))
            .await;
        assert!(r.success);
        assert_eq!(log.lock().unwrap().clone(), vec!["docker restart app"]);

        let r = exec.execute(&action(ActionKind::RestartContainer, json!({}))).await;
        assert_eq!(r.message, "No container name provided");
    }

    #[tokio::test]
    async fn disk_cleanup_succeeds_even_when_every_step_fails() {
        let host = FakeHost {
            failing: vec!["find", "journalctl", "apt-get"],
            ..FakeHost::default()
        };
        let report = operations::clear_disk_space(&host, Some("/")).await;
        assert_eq!(report.failed_steps(), 5);
        assert_eq!(host.log().len(), 5);

        let (mut exec, _) = executor(host);
        let r = exec
            .execute(&action(ActionKind::ClearDiskSpace, json!({"partition": "/"})))
            .await;
        assert!(r.success);
        assert!(r.message.starts_with("Disk cleanup completed for /"));
        assert!(r.message.contains("journal: failed"));
    }

    #[tokio::test]
    async fn disk_cleanup_scopes_steps_to_partition() {
        let host = FakeHost::default();
        let report = operations::clear_disk_space(&host, Some("/var")).await;
        let ran: Vec<&str> = report
            .steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Done)
            .map(|s| s.name)
            .collect();
        assert_eq!(ran, vec!["journal", "apt_cache", "old_logs"]);

        let report = operations::clear_disk_space(&host, Some("/home")).await;
        assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Skipped));
        assert_eq!(report.to_string(), "Disk cleanup completed for /home");
    }

    #[tokio::test]
    async fn remount_requires_accessible_mount() {
        let (mut exec, log) = executor(FakeHost::default());
        let a = action(ActionKind::Remount, json!({"mount_config": {"path": "/mnt/nfs"}}));
        let r = exec.execute(&a).await;
        assert_eq!(r.message, "Remount command succeeded but /mnt/nfs still not accessible");
        assert_eq!(
            log.lock().unwrap().clone(),
            vec!["mount -o remount /mnt/nfs", "access /mnt/nfs"]
        );

        let (mut exec, _) = executor(FakeHost {
            accessible: true,
            ..FakeHost::default()
        });
        assert!(exec.execute(&a).await.success);

        let r = exec.execute(&action(ActionKind::Remount, json!({}))).await;
        assert_eq!(r.message, "No mount configuration provided");
        let r = exec
            .execute(&action(ActionKind::Remount, json!({"mount_config": {"type": "nfs"}})))
            .await;
        assert_eq!(r.message, "No mount path specified");
    }

    #[tokio::test]
    async fn unmount_failure_is_not_fatal() {
        let host = FakeHost {
            failing: vec!["umount"],
            accessible: true,
            ..FakeHost::default()
        };
        let (mut exec, log) = executor(host);
        let a = action(
            ActionKind::UnmountRemount,
            json!({"mount_config": {"path": "/mnt/nfs", "source": "nas:/export", "type": "nfs", "options": "ro"}}),
        );
        let r = exec.execute(&a).await;
        assert!(r.success, "{}", r.message);
        assert_eq!(
            log.lock().unwrap().clone(),
            vec![
                "umount -f /mnt/nfs",
                "mount -t nfs -o ro nas:/export /mnt/nfs",
                "access /mnt/nfs",
            ]
        );

        let r = exec
            .execute(&action(ActionKind::UnmountRemount, json!({"mount_config": {"path": "/mnt/x"}})))
            .await;
        assert_eq!(r.message, "Mount configuration missing path or source");
    }

    #[tokio::test]
    async fn remote_calls_check_status() {
        let (mut exec, log) = executor(FakeHost {
            http_status: 204,
            ..FakeHost::default()
        });
        let reload = action(
            ActionKind::ReloadIntegration,
            json!({"integration_id": "abc", "url": "http://ha:8123/", "token": "t", "title": "Hue"}),
        );
        let r = exec.execute(&reload).await;
        assert_eq!(r.message, "Successfully reloaded integration 'Hue'");
        assert_eq!(
            log.lock().unwrap().clone(),
            vec!["POST http://ha:8123/api/config/config_entries/entry/abc/reload"]
        );

        let enable = action(
            ActionKind::EnableAutomation,
            json!({"entity_id": "automation.lights", "url": "http://ha:8123", "token": "t"}),
        );
        let r = exec.execute(&enable).await;
        assert_eq!(r.message, "Failed to enable automation: HTTP 204");

        let r = exec
            .execute(&action(ActionKind::EnableAutomation, json!({"entity_id": "x"})))
            .await;
        assert_eq!(r.message, "Missing required parameters (entity_id, instance)");
    }

    #[tokio::test]
    async fn remote_calls_resolve_credentials_by_instance() {
        let host = FakeHost {
            http_status: 200,
            ..FakeHost::default()
        };
        let log = host.log.clone();
        let instance = HomeAssistantInstance {
            name: "house".to_string(),
            url: "http://ha.lan:8123/".to_string(),
            token: "secret".to_string(),
            check_automations: true,
            check_entities: true,
            check_integrations: true,
            entity_domains: Vec::new(),
        };
        let mut exec = RemediationExecutor::new(Box::new(host), &config())
            .with_home_assistant(std::slice::from_ref(&instance));

        let enable = action(
            ActionKind::EnableAutomation,
            json!({"entity_id": "automation.porch", "instance": "house", "friendly_name": "Porch"}),
        );
        let r = exec.execute(&enable).await;
        assert_eq!(r.message, "Successfully enabled automation 'Porch'");
        assert_eq!(
            log.lock().unwrap().clone(),
            vec!["POST http://ha.lan:8123/api/services/automation/turn_on"]
        );

        let unknown = action(
            ActionKind::ReloadIntegration,
            json!({"integration_id": "a1", "instance": "garage"}),
        );
        let r = exec.execute(&unknown).await;
        assert_eq!(r.message, "Missing required parameters (integration_id, instance)");
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
