//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use netmon_agent::advisory::{AdvisoryBackend, BackendError, DecisionProvider};
use netmon_agent::agent::{AgentState, CycleEngine};
use netmon_agent::config::RemediationConfig;
use netmon_agent::monitors::{Monitor, MonitorError};
use netmon_agent::agent::Counters;
use netmon_agent::notifications::NotificationSink;
use netmon_agent::remediation::{
    Cmd, CmdOutput, Host, HostError, PostRequest, RemediationExecutor, Signal,
};
use netmon_agent::types::{Action, ActionKind, HealthRecord};

// ============================================================================
// Host
// ============================================================================

/// Well-behaved host: every unit exists, every restart succeeds and leaves
/// the unit active. Records each command line.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, HostError> {
        self.commands.lock().unwrap().push(cmd.to_string());
        let stdout = match cmd.args.first().map(String::as_str) {
            Some("list-unit-files") => cmd.args.get(1).cloned().unwrap_or_default(),
            Some("is-active") => "active\n".to_string(),
            _ => String::new(),
        };
        Ok(CmdOutput {
            success: true,
            stdout,
            stderr: String::new(),
        })
    }

    async fn program_available(&self, _program: &str) -> bool {
        true
    }

    fn path_exists(&self, _path: &str) -> bool {
        true
    }

    fn process_exists(&self, _pid: i32) -> bool {
        false
    }

    fn signal(&self, pid: i32, signal: Signal) -> Result<(), HostError> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("signal {pid} {signal:?}"));
        Ok(())
    }

    async fn path_accessible(&self, _path: &str, _timeout: Duration) -> bool {
        true
    }

    async fn http_post(&self, request: &PostRequest) -> Result<u16, HostError> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("POST {}", request.url));
        Ok(200)
    }
}

// ============================================================================
// Monitors
// ============================================================================

pub enum Script {
    Records(Vec<HealthRecord>),
    Fail,
    Panic,
    /// Never resolves, like a check stuck on a dead mount
    Hang,
}

enum Step {
    Done(Result<Vec<HealthRecord>, MonitorError>),
    Panic,
    Hang,
}

/// Monitor returning a scripted result. The records can be swapped between
/// cycles through the shared handle.
pub struct FakeMonitor {
    pub name: &'static str,
    pub script: Arc<Mutex<Script>>,
}

impl FakeMonitor {
    pub fn new(name: &'static str, script: Script) -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(script));
        (
            Self {
                name,
                script: Arc::clone(&script),
            },
            script,
        )
    }

    pub fn boxed(name: &'static str, script: Script) -> Box<dyn Monitor> {
        Box::new(Self::new(name, script).0)
    }
}

#[async_trait]
impl Monitor for FakeMonitor {
    fn name(&self) -> &str {
        self.name
    }

    async fn run_checks(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        let step = match &*self.script.lock().unwrap() {
            Script::Records(r) => Step::Done(Ok(r.clone())),
            Script::Fail => Step::Done(Err(MonitorError::Check("check exploded".to_string()))),
            Script::Panic => Step::Panic,
            Script::Hang => Step::Hang,
        };
        match step {
            Step::Done(result) => result,
            Step::Panic => panic!("monitor bug"),
            Step::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Advisory backend
// ============================================================================

/// Backend with a fixed answer and a call counter.
pub struct ScriptedBackend {
    pub reply: Result<String, String>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn answering(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: Err("connection refused".to_string()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdvisoryBackend for ScriptedBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(BackendError::Unsupported)
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

// ============================================================================
// Records and wiring
// ============================================================================

// ============================================================================
// Notifications
// ============================================================================

/// One event seen by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Startup,
    Shutdown,
    SystemHealthy,
    IssueDetected(Vec<HealthRecord>),
    ActionTaken { action: Action, success: bool, message: String },
    CriticalIssue(Action),
    DailySummary(Counters),
}

/// Keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify_startup(&self) {
        self.push(NotificationEvent::Startup);
    }

    async fn notify_shutdown(&self) {
        self.push(NotificationEvent::Shutdown);
    }

    async fn notify_system_healthy(&self) {
        self.push(NotificationEvent::SystemHealthy);
    }

    async fn notify_issue_detected(&self, issues: &[HealthRecord]) {
        self.push(NotificationEvent::IssueDetected(issues.to_vec()));
    }

    async fn notify_action_taken(&self, action: &Action, success: bool, message: &str) {
        self.push(NotificationEvent::ActionTaken {
            action: action.clone(),
            success,
            message: message.to_string(),
        });
    }

    async fn notify_critical_issue(&self, action: &Action) {
        self.push(NotificationEvent::CriticalIssue(action.clone()));
    }

    async fn notify_daily_summary(&self, counters: &Counters) {
        self.push(NotificationEvent::DailySummary(*counters));
    }
}

// ============================================================================
// Records
// ============================================================================

pub fn nginx_down() -> HealthRecord {
    HealthRecord::new("service_status", false, "nginx inactive").with("service", "nginx")
}

pub fn cpu_ok() -> HealthRecord {
    HealthRecord::new("cpu_usage", true, "CPU usage: 12.0%").with("value", 12.0)
}

pub fn stale_nfs() -> HealthRecord {
    HealthRecord::new("mount_status", false, "Stale mount /mnt/nfs")
        .with("issue", "stale_mount")
        .with("config", json!({"path": "/mnt/nfs"}))
}

pub fn remediation_config() -> RemediationConfig {
    RemediationConfig {
        settle_delay_secs: 0,
        ..RemediationConfig::default()
    }
}

pub struct Harness {
    pub engine: CycleEngine,
    pub host: FakeHost,
    pub sink: Arc<RecordingSink>,
    pub state: Arc<AgentState>,
    pub started: Instant,
}

pub fn harness(
    monitors: Vec<Box<dyn Monitor>>,
    provider: Box<dyn DecisionProvider>,
    allowed: Vec<ActionKind>,
    auto_fix: bool,
) -> Harness {
    let host = FakeHost::default();
    let sink = Arc::new(RecordingSink::new());
    let started = Instant::now();
    let state = Arc::new(AgentState::new(auto_fix, started));
    let executor = RemediationExecutor::new(Box::new(host.clone()), &remediation_config());
    let engine = CycleEngine::new(
        monitors,
        provider,
        executor,
        sink.clone(),
        Arc::clone(&state),
        allowed,
    );
    Harness {
        engine,
        host,
        sink,
        state,
        started,
    }
}
