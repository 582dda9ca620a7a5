//! Scheduler task: periodic cycles, manual cycles, daily rollup
//!
//! A single task owns the [`CycleEngine`]. Periodic ticks and manual
//! requests from the control surface are multiplexed with `select!`, so
//! cycles (and therefore remediation attempts) never overlap.

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cycle::{CycleEngine, CycleOutcome};
use crate::config::defaults;

/// Requests sent into the scheduler task.
#[derive(Debug)]
pub enum ControlCommand {
    /// Run a cycle now and reply with its outcome
    RunCycle { reply: oneshot::Sender<CycleOutcome> },
}

pub fn command_channel() -> (mpsc::Sender<ControlCommand>, mpsc::Receiver<ControlCommand>) {
    mpsc::channel(defaults::CONTROL_CHANNEL_BUFFER)
}

pub struct Scheduler {
    engine: CycleEngine,
    interval: Duration,
    commands: mpsc::Receiver<ControlCommand>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        engine: CycleEngine,
        interval: Duration,
        commands: mpsc::Receiver<ControlCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            interval,
            commands,
            cancel,
        }
    }

    /// Run until cancelled. A cycle already in progress when the token fires
    /// is allowed to finish.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => self.handle(command).await,
                _ = ticker.tick() => {
                    self.engine.run_cycle().await;
                }
            }

            if self.engine.maybe_rollup(Instant::now()).await {
                info!("Daily summary sent, counters reset");
            }
        }

        // Drop queued requests so their callers see the shutdown
        self.commands.close();
        info!("Scheduler stopped");
    }

    async fn handle(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::RunCycle { reply } => {
                info!("Manual cycle requested");
                let outcome = self.engine.run_cycle().await;
                if reply.send(outcome).is_err() {
                    debug!("Manual cycle requester went away");
                }
            }
        }
    }
}
