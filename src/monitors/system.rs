//! Local resource checks: load, memory, disk, systemd units, mounts

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{Monitor, MonitorError};
use crate::config::{defaults, MountConfig, SystemMonitorConfig};
use crate::types::{metrics, mount_issues, HealthRecord};

/// Filesystem types that never represent real storage.
const PSEUDO_FS: &[&str] = &[
    "proc", "sysfs", "devtmpfs", "devpts", "tmpfs", "cgroup", "cgroup2", "securityfs",
    "pstore", "debugfs", "tracefs", "configfs", "fusectl", "mqueue", "hugetlbfs",
    "bpf", "autofs", "binfmt_misc", "overlay", "squashfs", "nsfs", "rpc_pipefs",
];

/// Network filesystems. `statvfs` on a dead hard mount blocks in the kernel,
/// so these are left to the configured mount checks.
const NETWORK_FS: &[&str] = &[
    "nfs", "nfs4", "cifs", "smb3", "smbfs", "9p", "ceph", "glusterfs", "afs", "fuse.sshfs",
    "fuse.rclone", "davfs",
];

/// Whether a mount table entry is local storage worth a disk usage record.
fn is_local_storage(entry: &MountEntry) -> bool {
    let fs = entry.fs_type.as_str();
    !PSEUDO_FS.contains(&fs) && !NETWORK_FS.contains(&fs) && !entry.mount_point.starts_with("/snap/")
}

pub struct SystemMonitor {
    config: SystemMonitorConfig,
}

impl SystemMonitor {
    pub fn new(config: SystemMonitorConfig) -> Self {
        Self { config }
    }

    async fn check_cpu(&self) -> Result<HealthRecord, MonitorError> {
        let raw = tokio::fs::read_to_string("/proc/loadavg").await?;
        let load = parse_loadavg(&raw)
            .ok_or_else(|| MonitorError::Check("unreadable /proc/loadavg".to_string()))?;
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        let percent = round1(load / cpus as f64 * 100.0);
        Ok(HealthRecord::new(
            metrics::CPU_USAGE,
            percent < self.config.cpu_threshold,
            format!("CPU usage at {percent}%"),
        )
        .with("value", percent)
        .with("threshold", self.config.cpu_threshold))
    }

    async fn check_memory(&self) -> Result<HealthRecord, MonitorError> {
        let raw = tokio::fs::read_to_string("/proc/meminfo").await?;
        let mem = parse_meminfo(&raw)
            .ok_or_else(|| MonitorError::Check("unreadable /proc/meminfo".to_string()))?;
        let percent = round1(mem.used_percent());
        Ok(HealthRecord::new(
            metrics::MEMORY_USAGE,
            percent < self.config.memory_threshold,
            format!(
                "Memory usage at {percent}% ({}GB / {}GB)",
                mem.used_kb() / 1_048_576,
                mem.total_kb / 1_048_576
            ),
        )
        .with("value", percent)
        .with("threshold", self.config.memory_threshold))
    }

    async fn check_disks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let raw = tokio::fs::read_to_string("/proc/mounts").await?;
        let statvfs_timeout = Duration::from_secs(defaults::STATVFS_TIMEOUT_SECS);
        let mut records = Vec::new();
        for entry in parse_mount_table(&raw) {
            if !is_local_storage(&entry) {
                continue;
            }
            let usage = match disk_usage_within(&entry.mount_point, statvfs_timeout).await {
                Ok(u) => u,
                Err(e) => {
                    debug!(partition = %entry.mount_point, error = %e, "Skipping disk");
                    continue;
                }
            };
            let percent = round1(usage.used_percent());
            let healthy = percent < self.config.disk_threshold;
            if healthy && entry.mount_point != "/" {
                continue;
            }
            records.push(
                HealthRecord::new(
                    metrics::DISK_USAGE,
                    healthy,
                    format!(
                        "Disk {} at {percent}% ({}GB / {}GB)",
                        entry.mount_point,
                        usage.used_bytes() / 1_073_741_824,
                        usage.total_bytes / 1_073_741_824
                    ),
                )
                .with("partition", entry.mount_point.as_str())
                .with("value", percent)
                .with("threshold", self.config.disk_threshold),
            );
        }
        Ok(records)
    }

    async fn check_service(&self, service: &str) -> HealthRecord {
        let output = tokio::time::timeout(
            Duration::from_secs(defaults::QUICK_COMMAND_TIMEOUT_SECS),
            Command::new("systemctl").args(["is-active", service]).output(),
        )
        .await;
        match output {
            Ok(Ok(out)) => {
                let status = String::from_utf8_lossy(&out.stdout).trim().to_string();
                HealthRecord::new(
                    metrics::SERVICE_STATUS,
                    status == "active",
                    format!("Service {service} is {status}"),
                )
                .with("service", service)
                .with("status", status)
            }
            Ok(Err(e)) => service_error(service, &e.to_string()),
            Err(_) => service_error(service, "timed out"),
        }
    }

    async fn check_mount(&self, mount: &MountConfig, table: &[MountEntry]) -> HealthRecord {
        let config = serde_json::to_value(mount).unwrap_or_default();
        let fs_type = mount.fs_type.as_deref().unwrap_or("unknown");
        let base = |healthy: bool, message: String| {
            HealthRecord::new(metrics::MOUNT_STATUS, healthy, message)
                .with("mount", mount.path.as_str())
                .with("type", fs_type)
        };

        let mount_timeout = Duration::from_secs(defaults::MOUNT_CHECK_TIMEOUT_SECS);
        match tokio::time::timeout(mount_timeout, tokio::fs::try_exists(&mount.path)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false) | Err(_)) => {
                return base(false, format!("Mount point {} does not exist", mount.path))
                    .with("issue", "mount_point_missing")
                    .with("config", config);
            }
            Err(_) => {
                return base(false, format!("Timeout checking mount {} (may be hung)", mount.path))
                    .with("issue", mount_issues::STALE_MOUNT)
                    .with("config", config);
            }
        }

        if !table.iter().any(|e| e.mount_point == mount.path) {
            return base(false, format!("Mount {} ({fs_type}) is not mounted", mount.path))
                .with("issue", mount_issues::NOT_MOUNTED)
                .with("config", config);
        }

        let listing = tokio::time::timeout(mount_timeout, tokio::fs::read_dir(&mount.path)).await;
        match listing {
            Ok(Ok(_)) => base(true, format!("Mount {} is accessible", mount.path)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => base(
                false,
                format!("Mount {} exists but is not accessible (permission denied)", mount.path),
            )
            .with("issue", "permission_denied")
            .with("config", config),
            Ok(Err(e)) => base(
                false,
                format!("Mount {} appears stale or disconnected: {e}", mount.path),
            )
            .with("issue", mount_issues::STALE_MOUNT)
            .with("config", config),
            Err(_) => base(false, format!("Timeout checking mount {} (may be hung)", mount.path))
                .with("issue", mount_issues::STALE_MOUNT)
                .with("config", config),
        }
    }
}

#[async_trait]
impl Monitor for SystemMonitor {
    fn name(&self) -> &str {
        "system"
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let mut records = vec![self.check_cpu().await?, self.check_memory().await?];
        records.extend(self.check_disks().await?);

        for service in &self.config.check_services {
            records.push(self.check_service(service).await);
        }

        if !self.config.check_mounts.is_empty() {
            let table = parse_mount_table(&tokio::fs::read_to_string("/proc/mounts").await?);
            for mount in &self.config.check_mounts {
                records.push(self.check_mount(mount, &table).await);
            }
        }

        Ok(records)
    }
}

fn service_error(service: &str, error: &str) -> HealthRecord {
    HealthRecord::new(
        metrics::SERVICE_STATUS,
        false,
        format!("Failed to check service {service}: {error}"),
    )
    .with("service", service)
    .with("error", error)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ============================================================================
// /proc parsing
// ============================================================================

/// One-minute load average.
fn parse_loadavg(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MemInfo {
    total_kb: u64,
    available_kb: u64,
}

impl MemInfo {
    fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        self.used_kb() as f64 / self.total_kb as f64 * 100.0
    }
}

fn parse_meminfo(raw: &str) -> Option<MemInfo> {
    let field = |name: &str| {
        raw.lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
    };
    Some(MemInfo {
        total_kb: field("MemTotal:")?,
        available_kb: field("MemAvailable:")?,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct MountEntry {
    mount_point: String,
    fs_type: String,
}

/// Parse `/proc/mounts`, unescaping octal sequences in mount points.
fn parse_mount_table(raw: &str) -> Vec<MountEntry> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _source = fields.next()?;
            let mount_point = fields.next()?.replace("\\040", " ");
            let fs_type = fields.next()?.to_string();
            Some(MountEntry { mount_point, fs_type })
        })
        .collect()
}

struct DiskUsage {
    total_bytes: u64,
    free_bytes: u64,
}

impl DiskUsage {
    fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }
}

/// `statvfs` on a blocking thread, abandoned after `limit`.
async fn disk_usage_within(path: &str, limit: Duration) -> Result<DiskUsage, String> {
    let owned = path.to_string();
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(move || disk_usage(&owned))).await {
        Ok(Ok(usage)) => usage,
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("statvfs timed out after {limit:?}")),
    }
}

fn disk_usage(path: &str) -> Result<DiskUsage, String> {
    use std::mem::MaybeUninit;

    let c_path = std::ffi::CString::new(path).map_err(|e| e.to_string())?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };

    if result == 0 {
        let stat = unsafe { stat.assume_init() };
        let frsize = stat.f_frsize as u64;
        Ok(DiskUsage {
            total_bytes: stat.f_blocks as u64 * frsize,
            free_bytes: stat.f_bfree as u64 * frsize,
        })
    } else {
        Err(format!("statvfs failed for {}", path))
    }
}
