//! Agent Configuration - every tunable as a TOML value
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a missing section yields a working agent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::types::ActionKind;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "NETMON_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "agent_config.toml";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    #[serde(default)]
    pub remediation: RemediationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    EnvVar(PathBuf),
    Local(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit(p) => write!(f, "{}", p.display()),
            Self::EnvVar(p) => write!(f, "{} (from {CONFIG_ENV_VAR})", p.display()),
            Self::Local(p) => write!(f, "./{}", p.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// A loaded configuration plus the notes gathered while finding it.
///
/// Loading happens before the tracing subscriber exists, so the caller logs
/// these once logging is up.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AgentConfig,
    pub source: ConfigSource,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn log(&self) {
        for warning in &self.warnings {
            warn!("{warning}");
        }
        info!(source = %self.source, "Loaded agent config");
    }
}

impl AgentConfig {
    /// Load configuration using the standard search order.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::load_from_sources(explicit, env_path.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    /// Resolve the first candidate that exists and load it.
    ///
    /// A candidate that exists but fails to read, parse or validate is an
    /// error; only absent files fall through to the next source.
    pub fn load_from_sources(
        explicit: Option<&Path>,
        env_path: Option<&Path>,
        local: &Path,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut warnings = Vec::new();

        if let Some(path) = explicit {
            return Ok(LoadedConfig {
                config: Self::load_from_file(path)?,
                source: ConfigSource::Explicit(path.to_path_buf()),
                warnings,
            });
        }

        if let Some(path) = env_path {
            if path.exists() {
                return Ok(LoadedConfig {
                    config: Self::load_from_file(path)?,
                    source: ConfigSource::EnvVar(path.to_path_buf()),
                    warnings,
                });
            }
            warnings.push(format!(
                "{CONFIG_ENV_VAR} points to non-existent file {}, falling back",
                path.display()
            ));
        }

        if local.exists() {
            return Ok(LoadedConfig {
                config: Self::load_from_file(local)?,
                source: ConfigSource::Local(local.to_path_buf()),
                warnings,
            });
        }

        let mut config = Self::default();
        config.apply_env_fallbacks();
        Ok(LoadedConfig {
            config,
            source: ConfigSource::Defaults,
            warnings,
        })
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse, expand `${VAR}` references, apply env fallbacks and validate.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let parse_err = |source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        };
        let raw: toml::Value = contents.parse().map_err(parse_err)?;
        let mut config: Self = expand_env_vars(raw).try_into().map_err(parse_err)?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Fill secrets that were not set in the file from well-known env vars.
    fn apply_env_fallbacks(&mut self) {
        if self.advisory.api_key.is_none() {
            let var = match self.advisory.provider.as_str() {
                "openai" => Some("OPENAI_API_KEY"),
                "anthropic" => Some("ANTHROPIC_API_KEY"),
                _ => None,
            };
            self.advisory.api_key = var.and_then(|v| std::env::var(v).ok());
        }
        if self.notifications.slack.webhook_url.is_none() {
            self.notifications.slack.webhook_url = std::env::var("SLACK_WEBHOOK_URL").ok();
        }
        if self.notifications.discord.webhook_url.is_none() {
            self.notifications.discord.webhook_url = std::env::var("DISCORD_WEBHOOK_URL").ok();
        }
    }

    /// Validate the configuration for internal consistency.
    ///
    /// All problems are collected and reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.monitoring.interval_secs == 0 {
            errors.push("monitoring.interval_secs must be > 0".to_string());
        }
        if self.monitoring.check_timeout_secs == 0 {
            errors.push("monitoring.check_timeout_secs must be > 0".to_string());
        }

        let sys = &self.monitoring.system;
        for (name, value) in [
            ("cpu_threshold", sys.cpu_threshold),
            ("memory_threshold", sys.memory_threshold),
            ("disk_threshold", sys.disk_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("monitoring.system.{name} must be within 0-100, got {value}"));
            }
        }
        for mount in &sys.check_mounts {
            if mount.path.trim().is_empty() {
                errors.push("monitoring.system.check_mounts entries need a path".to_string());
            }
        }

        let ha = &self.monitoring.home_assistant;
        if ha.enabled {
            for inst in &ha.instances {
                if inst.url.trim().is_empty() || inst.token.trim().is_empty() {
                    errors.push(format!(
                        "monitoring.home_assistant instance '{}' needs a url and a token",
                        inst.name
                    ));
                }
            }
        }

        if self.remediation.max_attempts == 0 {
            errors.push("remediation.max_attempts must be > 0".to_string());
        }
        for tag in &self.remediation.allowed_actions {
            if !ActionKind::from(tag.as_str()).is_known() {
                errors.push(format!("remediation.allowed_actions contains unknown action '{tag}'"));
            }
        }

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!("server.addr '{}' is not a valid socket address", self.server.addr));
        }

        let n = &self.notifications;
        if n.slack.enabled && n.slack.webhook_url.as_deref().unwrap_or("").is_empty() {
            errors.push("notifications.slack is enabled but has no webhook_url".to_string());
        }
        if n.discord.enabled && n.discord.webhook_url.as_deref().unwrap_or("").is_empty() {
            errors.push("notifications.discord is enabled but has no webhook_url".to_string());
        }
        for event in &n.discord.notify_on {
            if !DISCORD_EVENTS.contains(&event.as_str()) {
                errors.push(format!("notifications.discord.notify_on contains unknown event '{event}'"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Environment expansion
// ============================================================================

fn env_ref_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Recursively replace `${VAR}` references in string values.
///
/// References to unset variables are left verbatim.
pub fn expand_env_vars(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::String(s) => toml::Value::String(expand_str(&s)),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(expand_env_vars).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(k, v)| (k, expand_env_vars(v)))
                .collect(),
        ),
        other => other,
    }
}

fn expand_str(s: &str) -> String {
    let Some(pattern) = env_ref_pattern() else {
        return s.to_string();
    };
    pattern
        .replace_all(s, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

// ============================================================================
// Monitoring
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between periodic cycles
    pub interval_secs: u64,
    /// Seconds one monitor may spend in `run_checks`
    pub check_timeout_secs: u64,
    pub system: SystemMonitorConfig,
    pub network: NetworkMonitorConfig,
    pub web: WebMonitorConfig,
    pub home_assistant: HomeAssistantMonitorConfig,
    pub docker: DockerMonitorConfig,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::MONITOR_INTERVAL_SECS,
            check_timeout_secs: defaults::MONITOR_TIMEOUT_SECS,
            system: SystemMonitorConfig::default(),
            network: NetworkMonitorConfig::default(),
            web: WebMonitorConfig::default(),
            home_assistant: HomeAssistantMonitorConfig::default(),
            docker: DockerMonitorConfig::default(),
        }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMonitorConfig {
    pub enabled: bool,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub disk_threshold: f64,
    /// systemd units checked with `systemctl is-active`
    pub check_services: Vec<String>,
    pub check_mounts: Vec<MountConfig>,
}

impl Default for SystemMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_threshold: defaults::CPU_THRESHOLD_PERCENT,
            memory_threshold: defaults::MEMORY_THRESHOLD_PERCENT,
            disk_threshold: defaults::DISK_THRESHOLD_PERCENT,
            check_services: Vec::new(),
            check_mounts: Vec::new(),
        }
    }
}

/// A mount the agent watches and may repair.
///
/// Serialised verbatim into `mount_status` records and from there into the
/// `mount_config` parameter of remount actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMonitorConfig {
    pub enabled: bool,
    pub ping_hosts: Vec<String>,
    pub ping_timeout_secs: u64,
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_hosts: vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()],
            ping_timeout_secs: defaults::PING_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebMonitorConfig {
    pub enabled: bool,
    pub endpoints: Vec<WebEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantMonitorConfig {
    pub enabled: bool,
    pub instances: Vec<HomeAssistantInstance>,
}

/// One Home Assistant server. The token never leaves the agent: records
/// carry the instance name and remediation looks the credentials up here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantInstance {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(default = "default_true")]
    pub check_automations: bool,
    #[serde(default = "default_true")]
    pub check_entities: bool,
    #[serde(default = "default_true")]
    pub check_integrations: bool,
    #[serde(default = "default_entity_domains")]
    pub entity_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerMonitorConfig {
    pub enabled: bool,
    /// Containers that are expected to be stopped
    pub ignore: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_entity_domains() -> Vec<String> {
    defaults::HA_ENTITY_DOMAINS.iter().map(|d| (*d).to_string()).collect()
}

fn default_expected_status() -> u16 {
    defaults::WEB_EXPECTED_STATUS
}

fn default_web_timeout() -> u64 {
    defaults::WEB_TIMEOUT_SECS
}

// ============================================================================
// Advisory
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// `anthropic`, `openai`, `ollama` or `rules`
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            provider: defaults::ADVISORY_PROVIDER.to_string(),
            model: defaults::ADVISORY_MODEL.to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: defaults::ADVISORY_TIMEOUT_SECS,
            max_tokens: defaults::ADVISORY_MAX_TOKENS,
        }
    }
}

// ============================================================================
// Remediation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Initial value of the runtime auto-fix flag
    pub auto_fix: bool,
    pub allowed_actions: Vec<String>,
    pub max_attempts: u32,
    pub cooldown_secs: u64,
    pub settle_delay_secs: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            auto_fix: true,
            allowed_actions: [
                ActionKind::RestartService,
                ActionKind::ClearCache,
                ActionKind::ClearDiskSpace,
                ActionKind::Remount,
                ActionKind::UnmountRemount,
            ]
            .iter()
            .map(|k| k.as_str().to_string())
            .collect(),
            max_attempts: defaults::MAX_ATTEMPTS,
            cooldown_secs: defaults::COOLDOWN_SECS,
            settle_delay_secs: defaults::SETTLE_DELAY_SECS,
        }
    }
}

impl RemediationConfig {
    pub fn allowed_kinds(&self) -> Vec<ActionKind> {
        self.allowed_actions
            .iter()
            .map(|tag| ActionKind::from(tag.as_str()))
            .collect()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Events that may be listed in `notifications.discord.notify_on`.
pub const DISCORD_EVENTS: [&str; 3] = ["actions_taken", "critical_issues", "daily_summary"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub slack: SlackConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub notify_on: Vec<String>,
}

// ============================================================================
// Server / Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}
