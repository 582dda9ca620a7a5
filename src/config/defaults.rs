//! System-wide default constants.
//!
//! Centralises the magic numbers used by config defaults and the runtime.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Scheduler
// ============================================================================

/// Seconds between periodic monitoring cycles.
pub const MONITOR_INTERVAL_SECS: u64 = 60;

/// Capacity of the in-memory (issues, actions) history ring.
pub const HISTORY_CAPACITY: usize = 100;

/// Period of the daily summary rollup (seconds). 86 400 = 24 hours.
pub const DAILY_ROLLUP_SECS: u64 = 86_400;

/// Upper bound on one monitor's `run_checks` before it counts as failed.
pub const MONITOR_TIMEOUT_SECS: u64 = 45;

/// Buffer size of the control command channel into the scheduler task.
pub const CONTROL_CHANNEL_BUFFER: usize = 16;

// ============================================================================
// System monitor thresholds (percent)
// ============================================================================

pub const CPU_THRESHOLD_PERCENT: f64 = 80.0;
pub const MEMORY_THRESHOLD_PERCENT: f64 = 85.0;
pub const DISK_THRESHOLD_PERCENT: f64 = 90.0;

/// Timeout for a mount accessibility check before it is considered stale.
pub const MOUNT_CHECK_TIMEOUT_SECS: u64 = 5;

/// Timeout for a single `statvfs` call during the disk sweep.
pub const STATVFS_TIMEOUT_SECS: u64 = 3;

// ============================================================================
// Network / web monitors
// ============================================================================

pub const PING_TIMEOUT_SECS: u64 = 2;
pub const WEB_TIMEOUT_SECS: u64 = 10;
pub const WEB_EXPECTED_STATUS: u16 = 200;

// ============================================================================
// Home Assistant / Docker monitors
// ============================================================================

/// Timeout of the `/api/` reachability check.
pub const HA_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Timeout of the states and config-entry queries.
pub const HA_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Entity domains checked for `unavailable` / `unknown` states.
pub const HA_ENTITY_DOMAINS: [&str; 7] =
    ["light", "switch", "climate", "binary_sensor", "sensor", "lock", "cover"];

pub const DOCKER_PS_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// Advisory backend
// ============================================================================

pub const ADVISORY_PROVIDER: &str = "anthropic";
pub const ADVISORY_MODEL: &str = "claude-sonnet-4-5";
pub const ADVISORY_TIMEOUT_SECS: u64 = 60;
pub const ADVISORY_MAX_TOKENS: u32 = 2_000;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

// ============================================================================
// Remediation
// ============================================================================

/// Consecutive attempts allowed per action key inside one cooldown window.
pub const MAX_ATTEMPTS: u32 = 3;

/// Cooldown window per action key (seconds).
pub const COOLDOWN_SECS: u64 = 300;

/// Wait between a remediation command and its verification check (seconds).
pub const SETTLE_DELAY_SECS: u64 = 2;

/// Timeouts for individual remediation commands (seconds).
pub const QUICK_COMMAND_TIMEOUT_SECS: u64 = 5;
pub const SERVICE_COMMAND_TIMEOUT_SECS: u64 = 30;
pub const CONTAINER_COMMAND_TIMEOUT_SECS: u64 = 60;
pub const CLEANUP_COMMAND_TIMEOUT_SECS: u64 = 60;
pub const REMOTE_CALL_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Control surface
// ============================================================================

pub const SERVER_ADDR: &str = "127.0.0.1:8085";

/// Bounds for `recent_issues(limit)`.
pub const MIN_ISSUES_LIMIT: usize = 1;
pub const MAX_ISSUES_LIMIT: usize = 20;
pub const DEFAULT_ISSUES_LIMIT: usize = 5;

// ============================================================================
// Notifications
// ============================================================================

pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;
pub const NOTIFICATION_FOOTER: &str = "Network Monitor Agent";
