//! Advisory request text

use crate::types::{ActionKind, HealthRecord};

/// Build the analysis prompt for a set of unhealthy records.
pub fn analysis_prompt(issues: &[&HealthRecord], allowed: &[ActionKind]) -> String {
    let issues_json = serde_json::to_string_pretty(issues).unwrap_or_else(|_| "[]".to_string());
    let allowed_json = serde_json::to_string_pretty(allowed).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a system administrator AI agent analyzing server and network issues.

MONITORING ISSUES DETECTED:
{issues_json}

ALLOWED REMEDIATION ACTIONS:
{allowed_json}

Your task:
1. Analyze each issue and determine its severity (critical, high, medium, low)
2. Identify the root cause if possible
3. Recommend specific remediation actions from the allowed actions list
4. If the issue requires human intervention, set action to "alert_only"

Respond with a JSON array of action objects. Each action should have:
{{
  "issue": "description of the issue",
  "severity": "critical|high|medium|low",
  "root_cause": "identified or suspected root cause",
  "action": "action to take from allowed list or alert_only",
  "action_params": {{}},
  "reasoning": "why this action is recommended"
}}

Examples of action_params:
- restart_service: {{"service": "nginx"}}
- kill_hung_process: {{"pid": 1234}}
- clear_disk_space: {{"partition": "/"}}
- restart_container: {{"container": "app"}}
- clear_cache: {{"type": "system"}}
- remount: {{"mount_config": {{"path": "/mnt/share"}}}}
- unmount_remount: {{"mount_config": {{"path": "/mnt/share", "source": "nas:/export"}}}}
- enable_automation: {{"instance": "home", "entity_id": "automation.porch_lights"}}
- reload_integration: {{"instance": "home", "integration_id": "3f2a9c"}}

Respond ONLY with the JSON array, no other text."#
    )
}
