//! Remediation actions proposed by the decision layer

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Free-form action parameters.
///
/// `serde_json::Map` is key-ordered, so serialising it yields a canonical
/// string usable as a cooldown key.
pub type ActionParams = Map<String, Value>;

/// Closed set of remediation kinds.
///
/// Anything outside the known set deserialises into `Unknown` carrying the
/// original tag, so a malformed or novel recommendation still flows through
/// the executor (and its cooldown ledger) instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    RestartService,
    ClearCache,
    KillHungProcess,
    RestartContainer,
    ClearDiskSpace,
    Remount,
    UnmountRemount,
    EnableAutomation,
    ReloadIntegration,
    AlertOnly,
    Unknown(String),
}

impl ActionKind {
    /// Every known kind, in a stable order.
    pub const KNOWN: [ActionKind; 10] = [
        ActionKind::RestartService,
        ActionKind::ClearCache,
        ActionKind::KillHungProcess,
        ActionKind::RestartContainer,
        ActionKind::ClearDiskSpace,
        ActionKind::Remount,
        ActionKind::UnmountRemount,
        ActionKind::EnableAutomation,
        ActionKind::ReloadIntegration,
        ActionKind::AlertOnly,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::RestartService => "restart_service",
            ActionKind::ClearCache => "clear_cache",
            ActionKind::KillHungProcess => "kill_hung_process",
            ActionKind::RestartContainer => "restart_container",
            ActionKind::ClearDiskSpace => "clear_disk_space",
            ActionKind::Remount => "remount",
            ActionKind::UnmountRemount => "unmount_remount",
            ActionKind::EnableAutomation => "enable_automation",
            ActionKind::ReloadIntegration => "reload_integration",
            ActionKind::AlertOnly => "alert_only",
            ActionKind::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ActionKind::Unknown(_))
    }
}

impl From<&str> for ActionKind {
    fn from(tag: &str) -> Self {
        match tag {
            "restart_service" => ActionKind::RestartService,
            "clear_cache" => ActionKind::ClearCache,
            "kill_hung_process" => ActionKind::KillHungProcess,
            "restart_container" => ActionKind::RestartContainer,
            "clear_disk_space" => ActionKind::ClearDiskSpace,
            "remount" => ActionKind::Remount,
            "unmount_remount" => ActionKind::UnmountRemount,
            "enable_automation" => ActionKind::EnableAutomation,
            "reload_integration" => ActionKind::ReloadIntegration,
            "alert_only" => ActionKind::AlertOnly,
            other => ActionKind::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(tag: String) -> Self {
        ActionKind::from(tag.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity as judged by the decision layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }

    /// Critical and high issues are escalated to chat channels.
    pub fn is_urgent(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model output often spells an absent field as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A proposed remediation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub root_cause: String,
    pub action: ActionKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action_params: ActionParams,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
}

impl Action {
    /// Canonical `(kind, params)` key used by the cooldown ledger.
    pub fn cooldown_key(&self) -> (String, String) {
        let params = serde_json::to_string(&self.action_params).unwrap_or_default();
        (self.action.as_str().to_string(), params)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.action_params.get(key).and_then(Value::as_str)
    }
}
