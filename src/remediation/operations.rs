//! Concrete remediation operations

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::host::{Cmd, Host, PostRequest, Signal};
use super::ExecutionResult;
use crate::config::defaults::{
    CLEANUP_COMMAND_TIMEOUT_SECS, CONTAINER_COMMAND_TIMEOUT_SECS, MOUNT_CHECK_TIMEOUT_SECS,
    QUICK_COMMAND_TIMEOUT_SECS, REMOTE_CALL_TIMEOUT_SECS, SERVICE_COMMAND_TIMEOUT_SECS,
};

fn mount_timeout() -> Duration {
    Duration::from_secs(MOUNT_CHECK_TIMEOUT_SECS)
}

pub async fn restart_service(host: &dyn Host, service: Option<&str>, settle: Duration) -> ExecutionResult {
    let Some(service) = service.filter(|s| !s.is_empty()) else {
        return ExecutionResult::failed("No service name provided");
    };

    let unit = format!("{service}.service");
    let listed = host
        .run(&Cmd::new("systemctl", &["list-unit-files", &unit], QUICK_COMMAND_TIMEOUT_SECS))
        .await;
    match listed {
        Ok(out) if out.stdout.contains(service) => {}
        Ok(_) => return ExecutionResult::failed(format!("Service {service} not found")),
        Err(e) => return ExecutionResult::failed(format!("Error restarting {service}: {e}")),
    }

    let restart = Cmd::new("systemctl", &["restart", service], SERVICE_COMMAND_TIMEOUT_SECS).privileged();
    match host.run(&restart).await {
        Ok(out) if out.success => {}
        Ok(out) => {
            return ExecutionResult::failed(format!("Failed to restart {service}: {}", out.stderr))
        }
        Err(e) => return ExecutionResult::failed(format!("Error restarting {service}: {e}")),
    }

    tokio::time::sleep(settle).await;

    let verify = host
        .run(&Cmd::new("systemctl", &["is-active", service], QUICK_COMMAND_TIMEOUT_SECS))
        .await;
    match verify {
        Ok(out) if out.stdout.trim() == "active" => {
            ExecutionResult::succeeded(format!("Successfully restarted {service}"))
        }
        Ok(_) => ExecutionResult::failed(format!("Service {service} restarted but not active")),
        Err(e) => ExecutionResult::failed(format!("Error verifying {service}: {e}")),
    }
}

pub async fn clear_cache(host: &dyn Host, cache_type: &str) -> ExecutionResult {
    if cache_type != "system" {
        return ExecutionResult::failed(format!("Unknown cache type: {cache_type}"));
    }
    let cmd = Cmd::new(
        "sh",
        &["-c", "sync; echo 3 > /proc/sys/vm/drop_caches"],
        QUICK_COMMAND_TIMEOUT_SECS * 2,
    )
    .privileged();
    match host.run(&cmd).await {
        Ok(out) if out.success => ExecutionResult::succeeded("System cache cleared successfully"),
        Ok(out) => ExecutionResult::failed(format!("Failed to clear cache: {}", out.stderr)),
        Err(e) => ExecutionResult::failed(format!("Error clearing cache: {e}")),
    }
}

pub async fn kill_hung_process(host: &dyn Host, pid: Option<i32>, settle: Duration) -> ExecutionResult {
    let Some(pid) = pid.filter(|p| *p > 0) else {
        return ExecutionResult::failed("No PID provided");
    };
    if !host.process_exists(pid) {
        return ExecutionResult::failed(format!("Process {pid} not found"));
    }

    if let Err(e) = host.signal(pid, Signal::Terminate) {
        debug!(pid, error = %e, "SIGTERM failed, escalating");
    }
    tokio::time::sleep(settle).await;
    if !host.process_exists(pid) {
        return ExecutionResult::succeeded(format!("Successfully terminated process {pid}"));
    }

    match host.signal(pid, Signal::Kill) {
        Ok(()) => ExecutionResult::succeeded(format!("Force killed process {pid}")),
        Err(e) => ExecutionResult::failed(format!("Failed to kill process {pid}: {e}")),
    }
}

pub async fn restart_container(host: &dyn Host, container: Option<&str>) -> ExecutionResult {
    let Some(container) = container.filter(|c| !c.is_empty()) else {
        return ExecutionResult::failed("No container name provided");
    };
    if !host.program_available("docker").await {
        return ExecutionResult::failed("Docker not found on system");
    }
    let cmd = Cmd::new("docker", &["restart", container], CONTAINER_COMMAND_TIMEOUT_SECS);
    match host.run(&cmd).await {
        Ok(out) if out.success => {
            ExecutionResult::succeeded(format!("Successfully restarted container {container}"))
        }
        Ok(out) => ExecutionResult::failed(format!("Failed to restart container: {}", out.stderr)),
        Err(e) => ExecutionResult::failed(format!("Error restarting container {container}: {e}")),
    }
}

// ============================================================================
// Disk cleanup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupStep {
    pub name: &'static str,
    pub outcome: StepOutcome,
}

/// Per-step results of a disk cleanup.
///
/// Cleanup is best effort: individual step failures never fail the
/// operation, but they are reported here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub partition: String,
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
            .count()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Disk cleanup completed for {}", self.partition)?;
        let ran: Vec<String> = self
            .steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Done => Some(format!("{}: ok", s.name)),
                StepOutcome::Failed(e) => Some(format!("{}: failed ({e})", s.name)),
                StepOutcome::Skipped => None,
            })
            .collect();
        if !ran.is_empty() {
            write!(f, " [{}]", ran.join(", "))?;
        }
        Ok(())
    }
}

pub async fn clear_disk_space(host: &dyn Host, partition: Option<&str>) -> CleanupReport {
    let partition = partition.filter(|p| !p.is_empty()).unwrap_or("/");
    let covers_tmp = partition == "/" || partition.starts_with("/tmp");
    let covers_var = partition == "/" || partition.starts_with("/var");

    let steps: [(&'static str, bool, Cmd); 5] = [
        (
            "tmp",
            covers_tmp,
            Cmd::new("find", &["/tmp", "-type", "f", "-atime", "+7", "-delete"], CLEANUP_COMMAND_TIMEOUT_SECS / 2),
        ),
        (
            "var_tmp",
            covers_tmp,
            Cmd::new("find", &["/var/tmp", "-type", "f", "-atime", "+7", "-delete"], CLEANUP_COMMAND_TIMEOUT_SECS / 2),
        ),
        (
            "journal",
            covers_var,
            Cmd::new("journalctl", &["--vacuum-time=7d"], CLEANUP_COMMAND_TIMEOUT_SECS / 2),
        ),
        (
            "apt_cache",
            covers_var && host.path_exists("/usr/bin/apt-get"),
            Cmd::new("apt-get", &["clean"], CLEANUP_COMMAND_TIMEOUT_SECS / 2),
        ),
        (
            "old_logs",
            covers_var,
            Cmd::new(
                "find",
                &["/var/log", "-type", "f", "-name", "*.log.*", "-mtime", "+30", "-delete"],
                CLEANUP_COMMAND_TIMEOUT_SECS,
            ),
        ),
    ];

    let mut report = CleanupReport {
        partition: partition.to_string(),
        steps: Vec::with_capacity(steps.len()),
    };
    for (name, applies, cmd) in steps {
        let outcome = if !applies {
            StepOutcome::Skipped
        } else {
            match host.run(&cmd.privileged()).await {
                Ok(out) if out.success => StepOutcome::Done,
                Ok(out) => StepOutcome::Failed(if out.stderr.is_empty() {
                    "non-zero exit".to_string()
                } else {
                    out.stderr
                }),
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        };
        report.steps.push(CleanupStep { name, outcome });
    }
    report
}

// ============================================================================
// Mounts
// ============================================================================

fn mount_field<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub async fn remount(host: &dyn Host, config: Option<&Value>, settle: Duration) -> ExecutionResult {
    let Some(config) = config.filter(|c| c.is_object()) else {
        return ExecutionResult::failed("No mount configuration provided");
    };
    let Some(path) = mount_field(config, "path") else {
        return ExecutionResult::failed("No mount path specified");
    };

    let cmd = Cmd::new("mount", &["-o", "remount", path], SERVICE_COMMAND_TIMEOUT_SECS).privileged();
    match host.run(&cmd).await {
        Ok(out) if out.success => {}
        Ok(out) => return ExecutionResult::failed(format!("Failed to remount {path}: {}", out.stderr)),
        Err(e) => return ExecutionResult::failed(format!("Error remounting {path}: {e}")),
    }

    tokio::time::sleep(settle).await;
    if host.path_accessible(path, mount_timeout()).await {
        ExecutionResult::succeeded(format!("Successfully remounted {path}"))
    } else {
        ExecutionResult::failed(format!(
            "Remount command succeeded but {path} still not accessible"
        ))
    }
}

pub async fn unmount_remount(host: &dyn Host, config: Option<&Value>, settle: Duration) -> ExecutionResult {
    let Some(config) = config.filter(|c| c.is_object()) else {
        return ExecutionResult::failed("No mount configuration provided");
    };
    let (Some(path), Some(source)) = (mount_field(config, "path"), mount_field(config, "source")) else {
        return ExecutionResult::failed("Mount configuration missing path or source");
    };
    let fs_type = mount_field(config, "type").unwrap_or("auto");
    let options = mount_field(config, "options").unwrap_or("defaults");

    let umount = Cmd::new("umount", &["-f", path], SERVICE_COMMAND_TIMEOUT_SECS).privileged();
    match host.run(&umount).await {
        Ok(out) if !out.success => debug!(path, stderr = %out.stderr, "Unmount failed, remounting anyway"),
        Err(e) => debug!(path, error = %e, "Unmount failed, remounting anyway"),
        Ok(_) => {}
    }

    tokio::time::sleep(settle).await;

    let mut args: Vec<&str> = Vec::new();
    if fs_type != "auto" {
        args.extend(["-t", fs_type]);
    }
    if options != "defaults" {
        args.extend(["-o", options]);
    }
    args.extend([source, path]);

    let mount = Cmd::new("mount", &args, SERVICE_COMMAND_TIMEOUT_SECS).privileged();
    match host.run(&mount).await {
        Ok(out) if out.success => {}
        Ok(out) => return ExecutionResult::failed(format!("Failed to mount {path}: {}", out.stderr)),
        Err(e) => return ExecutionResult::failed(format!("Error unmounting/remounting {path}: {e}")),
    }

    tokio::time::sleep(settle).await;
    if host.path_accessible(path, mount_timeout()).await {
        ExecutionResult::succeeded(format!("Successfully unmounted and remounted {path}"))
    } else {
        ExecutionResult::failed(format!("Mount command succeeded but {path} still not accessible"))
    }
}

// ============================================================================
// Home-automation remote calls
// ============================================================================

fn param<'a>(params: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// URL and token of one Home Assistant server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeAssistantTarget {
    pub url: String,
    pub token: String,
}

/// Configured servers keyed by instance name.
pub type HomeAssistantTargets = HashMap<String, HomeAssistantTarget>;

/// Explicit `url` + `token` params win; otherwise the `instance` param names
/// a configured server.
fn resolve_target(
    params: &serde_json::Map<String, Value>,
    targets: &HomeAssistantTargets,
) -> Option<HomeAssistantTarget> {
    if let (Some(url), Some(token)) = (param(params, "url"), param(params, "token")) {
        return Some(HomeAssistantTarget {
            url: url.to_string(),
            token: token.to_string(),
        });
    }
    param(params, "instance").and_then(|name| targets.get(name)).cloned()
}

pub async fn enable_automation(
    host: &dyn Host,
    params: &serde_json::Map<String, Value>,
    targets: &HomeAssistantTargets,
) -> ExecutionResult {
    let (Some(entity_id), Some(target)) = (param(params, "entity_id"), resolve_target(params, targets))
    else {
        return ExecutionResult::failed("Missing required parameters (entity_id, instance)");
    };
    let name = param(params, "friendly_name").unwrap_or(entity_id);

    let request = PostRequest {
        url: format!("{}/api/services/automation/turn_on", target.url.trim_end_matches('/')),
        bearer_token: target.token,
        body: Some(serde_json::json!({ "entity_id": entity_id })),
        timeout: Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS),
    };
    match host.http_post(&request).await {
        Ok(200) => ExecutionResult::succeeded(format!("Successfully enabled automation '{name}'")),
        Ok(status) => ExecutionResult::failed(format!("Failed to enable automation: HTTP {status}")),
        Err(e) => ExecutionResult::failed(format!("Failed to enable automation: {e}")),
    }
}

pub async fn reload_integration(
    host: &dyn Host,
    params: &serde_json::Map<String, Value>,
    targets: &HomeAssistantTargets,
) -> ExecutionResult {
    let (Some(integration_id), Some(target)) =
        (param(params, "integration_id"), resolve_target(params, targets))
    else {
        return ExecutionResult::failed("Missing required parameters (integration_id, instance)");
    };
    let title = param(params, "title").unwrap_or(integration_id);

    let request = PostRequest {
        url: format!(
            "{}/api/config/config_entries/entry/{integration_id}/reload",
            target.url.trim_end_matches('/')
        ),
        bearer_token: target.token,
        body: None,
        timeout: Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS),
    };
    match host.http_post(&request).await {
        Ok(200 | 204) => ExecutionResult::succeeded(format!("Successfully reloaded integration '{title}'")),
        Ok(status) => ExecutionResult::failed(format!("Failed to reload integration: HTTP {status}")),
        Err(e) => ExecutionResult::failed(format!("Failed to reload integration: {e}")),
    }
}
