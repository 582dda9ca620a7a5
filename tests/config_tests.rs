//! Config file loading and validation through the public API

use std::io::Write;
use std::path::Path;

use netmon_agent::config::{AgentConfig, ConfigError, ConfigSource, CONFIG_ENV_VAR};
use netmon_agent::types::ActionKind;

const FULL_CONFIG: &str = r#"
[monitoring]
interval_secs = 30

[monitoring.system]
cpu_threshold = 75.0
check_services = ["nginx", "sshd"]

[[monitoring.system.check_mounts]]
path = "/mnt/media"
source = "nas.lan:/volume1/media"
type = "nfs"
options = "rw,soft"

[monitoring.network]
ping_hosts = ["10.0.0.1"]

[[monitoring.web.endpoints]]
name = "grafana"
url = "http://10.0.0.5:3000/api/health"

[advisory]
provider = "rules"

[remediation]
auto_fix = false
allowed_actions = ["restart_service", "remount", "alert_only"]
cooldown_secs = 600

[notifications.discord]
enabled = true
webhook_url = "https://discord.example/hook"
notify_on = ["critical_issues"]

[server]
addr = "0.0.0.0:9090"
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn explicit_file_is_loaded() {
    let file = write_config(FULL_CONFIG);
    let loaded = AgentConfig::load(Some(file.path())).unwrap();
    assert_eq!(loaded.source, ConfigSource::Explicit(file.path().to_path_buf()));
    let config = loaded.config;

    assert_eq!(config.monitoring.interval_secs, 30);
    assert_eq!(config.monitoring.system.cpu_threshold, 75.0);
    // Unset thresholds keep their defaults
    assert_eq!(config.monitoring.system.memory_threshold, 85.0);
    assert_eq!(config.monitoring.system.check_services, ["nginx", "sshd"]);
    assert_eq!(
        config.monitoring.system.check_mounts[0].options.as_deref(),
        Some("rw,soft")
    );
    assert_eq!(config.monitoring.web.endpoints[0].expected_status, 200);
    assert!(!config.remediation.auto_fix);
    assert_eq!(config.remediation.cooldown().as_secs(), 600);
    assert_eq!(
        config.remediation.allowed_kinds(),
        vec![ActionKind::RestartService, ActionKind::Remount, ActionKind::AlertOnly]
    );
    assert_eq!(config.notifications.discord.notify_on, ["critical_issues"]);
    assert_eq!(config.server.addr, "0.0.0.0:9090");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = AgentConfig::load(Some(Path::new("/nonexistent/agent_config.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err}");
}

#[test]
fn syntax_errors_name_the_file() {
    let file = write_config("[monitoring\ninterval_secs = 30");
    match AgentConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn enabled_webhook_without_url_is_rejected() {
    let toml_str = r#"
[notifications.slack]
enabled = true
webhook_url = ""
"#;
    match AgentConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("slack")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn env_var_path_is_used_when_no_explicit_file() {
    let file = write_config("[monitoring]\ninterval_secs = 45\n");
    std::env::set_var(CONFIG_ENV_VAR, file.path());
    let loaded = AgentConfig::load(None).unwrap();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(loaded.config.monitoring.interval_secs, 45);
}

#[test]
fn invalid_local_file_is_an_error_not_a_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("agent_config.toml");
    std::fs::write(
        &local,
        "[remediation]\nauto_fix = false\nallowed_actions = [\"restart_servce\"]\n",
    )
    .unwrap();

    match AgentConfig::load_from_sources(None, None, &local) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("restart_servce")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    std::fs::write(&local, "[remediation\nauto_fix = false\n").unwrap();
    let err = AgentConfig::load_from_sources(None, None, &local).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn invalid_env_file_does_not_fall_through_to_local() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("broken.toml");
    std::fs::write(&env_file, "[monitoring]\ninterval_secs = 0\n").unwrap();
    let local = dir.path().join("agent_config.toml");
    std::fs::write(&local, "[monitoring]\ninterval_secs = 20\n").unwrap();

    let err = AgentConfig::load_from_sources(None, Some(&env_file), &local).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "{err}");
}

#[test]
fn absent_candidates_fall_through_with_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let missing_env = dir.path().join("nope.toml");
    let local = dir.path().join("agent_config.toml");

    let loaded = AgentConfig::load_from_sources(None, Some(&missing_env), &local).unwrap();
    assert_eq!(loaded.source, ConfigSource::Defaults);
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.config.remediation.auto_fix);

    std::fs::write(&local, "[monitoring]\ninterval_secs = 20\n").unwrap();
    let loaded = AgentConfig::load_from_sources(None, Some(&missing_env), &local).unwrap();
    assert_eq!(loaded.source, ConfigSource::Local(local.clone()));
    assert_eq!(loaded.config.monitoring.interval_secs, 20);
}

#[test]
fn home_assistant_instances_need_credentials() {
    let toml_str = r#"
[monitoring.home_assistant]
enabled = true

[[monitoring.home_assistant.instances]]
name = "house"
url = "http://ha.lan:8123"
token = ""
"#;
    match AgentConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("'house'")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
