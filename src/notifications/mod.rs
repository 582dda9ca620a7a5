//! Notification sinks
//!
//! The cycle engine reports through [`NotificationSink`]. [`Notifier`] logs
//! every event and forwards it to the configured chat webhooks; delivery
//! failures are logged and never reach the caller.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::agent::Counters;
use crate::config::NotificationConfig;
use crate::types::{Action, HealthRecord};

mod webhook;

pub use webhook::{Color, Flavor, Webhook};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_startup(&self);
    async fn notify_shutdown(&self);
    async fn notify_system_healthy(&self);
    async fn notify_issue_detected(&self, issues: &[HealthRecord]);
    async fn notify_action_taken(&self, action: &Action, success: bool, message: &str);
    /// An action that needs a human: `alert_only`, a kind outside the
    /// allow-list, or any action while auto-fix is disabled.
    async fn notify_critical_issue(&self, action: &Action);
    async fn notify_daily_summary(&self, counters: &Counters);
}

/// Discord events that are filtered by `notify_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscordEvent {
    ActionsTaken,
    CriticalIssues,
    DailySummary,
}

impl DiscordEvent {
    fn tag(self) -> &'static str {
        match self {
            DiscordEvent::ActionsTaken => "actions_taken",
            DiscordEvent::CriticalIssues => "critical_issues",
            DiscordEvent::DailySummary => "daily_summary",
        }
    }
}

pub struct Notifier {
    slack: Option<Webhook>,
    discord: Option<Webhook>,
    discord_notify_on: Vec<String>,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().build()?;
        let hook = |enabled: bool, url: &Option<String>, flavor| {
            url.as_deref()
                .filter(|u| enabled && !u.is_empty())
                .map(|u| Webhook::new(http.clone(), u, flavor))
        };
        Ok(Self {
            slack: hook(config.slack.enabled, &config.slack.webhook_url, Flavor::Slack),
            discord: hook(config.discord.enabled, &config.discord.webhook_url, Flavor::Discord),
            discord_notify_on: config.discord.notify_on.clone(),
        })
    }

    fn discord_wants(&self, event: DiscordEvent) -> bool {
        self.discord.is_some() && self.discord_notify_on.iter().any(|e| e == event.tag())
    }

    async fn deliver(hook: Option<&Webhook>, message: &str, color: Color) {
        let Some(hook) = hook else { return };
        if let Err(e) = hook.send(message, color).await {
            error!(webhook = ?hook.flavor(), error = %e, "Failed to send notification");
        }
    }

    async fn slack(&self, message: &str, color: Color) {
        Self::deliver(self.slack.as_ref(), message, color).await;
    }

    async fn discord(&self, message: &str, color: Color) {
        Self::deliver(self.discord.as_ref(), message, color).await;
    }
}

pub fn issues_message(issues: &[HealthRecord]) -> String {
    let mut message = format!("🚨 Detected {} issue(s):\n", issues.len());
    for issue in issues {
        message.push_str(&format!("  • {}\n", issue.message));
    }
    message
}

pub fn summary_message(c: &Counters) -> (String, Color) {
    let mut message = format!(
        "📊 **Daily Health Summary**\n\n\
         **Monitoring Cycles**: {}\n\
         **Issues Detected**: {}\n\
         **Actions Taken**: {}\n\
         **System Health**: {}/{} healthy\n\n",
        c.total_checks, c.issues_found, c.actions_taken, c.systems_healthy, c.systems_total
    );
    let color = if c.issues_found == 0 {
        message.push_str("✅ No issues detected today!");
        Color::Good
    } else if c.actions_taken > 0 {
        message.push_str(&format!("🔧 {} issue(s) automatically resolved", c.actions_taken));
        Color::Good
    } else {
        message.push_str("⚠️ Some issues require attention");
        Color::Warning
    };
    (message, color)
}

#[async_trait]
impl NotificationSink for Notifier {
    async fn notify_startup(&self) {
        let message = "🤖 Network Monitor Agent started";
        info!("{message}");
        self.slack(message, Color::Good).await;
        self.discord(message, Color::Good).await;
    }

    async fn notify_shutdown(&self) {
        let message = "🛑 Network Monitor Agent shutting down";
        info!("{message}");
        self.slack(message, Color::Warning).await;
        self.discord(message, Color::Warning).await;
    }

    async fn notify_system_healthy(&self) {
        info!("✨ All systems healthy");
    }

    async fn notify_issue_detected(&self, issues: &[HealthRecord]) {
        if issues.is_empty() {
            return;
        }
        let message = issues_message(issues);
        warn!(count = issues.len(), "{}", message.trim_end());
        self.slack(&message, Color::Warning).await;
    }

    async fn notify_action_taken(&self, action: &Action, success: bool, result: &str) {
        if success {
            let message = format!(
                "✅ Successfully executed {}\n  Issue: {}\n  Result: {result}",
                action.action, action.issue
            );
            info!(action = %action.action, "{message}");
            self.slack(&message, Color::Good).await;
            if self.discord_wants(DiscordEvent::ActionsTaken) {
                self.discord(&message, Color::Good).await;
            }
        } else {
            let message = format!(
                "❌ Failed to execute {}\n  Issue: {}\n  Severity: {}\n  Error: {result}",
                action.action, action.issue, action.severity
            );
            error!(action = %action.action, "{message}");
            self.slack(&message, Color::Danger).await;
            self.discord(&message, Color::Danger).await;
        }
    }

    async fn notify_critical_issue(&self, action: &Action) {
        let message = format!(
            "🔴 CRITICAL ISSUE - Human intervention required\n  Issue: {}\n  Root cause: {}\n  Reasoning: {}",
            action.issue, action.root_cause, action.reasoning
        );
        error!(severity = %action.severity, "{message}");
        self.slack(&message, Color::Danger).await;
        if self.discord_wants(DiscordEvent::CriticalIssues) && action.severity.is_urgent() {
            self.discord(&message, Color::Danger).await;
        }
    }

    async fn notify_daily_summary(&self, counters: &Counters) {
        info!(
            total_checks = counters.total_checks,
            issues_found = counters.issues_found,
            actions_taken = counters.actions_taken,
            "Daily summary"
        );
        if self.discord_wants(DiscordEvent::DailySummary) {
            let (message, color) = summary_message(counters);
            self.discord(&message, color).await;
        }
    }
}
