use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::{ActionSource, ActivityLog, ControlEvent, Result, TaskSpec, VigilError};
use vigil_core::log::ActionOutcome;
use vigil_desktop::{ActionExecutor, ScreenCapture};
use vigil_safety::SafetyGovernor;
use vigil_vision::{Decision, DecisionEngine};

/// Where the autonomy loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyState {
    Idle,
    Running,
    StoppingRequested,
    Stopped,
}

impl std::fmt::Display for AutonomyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutonomyState::Idle => write!(f, "idle"),
            AutonomyState::Running => write!(f, "running"),
            AutonomyState::StoppingRequested => write!(f, "stopping_requested"),
            AutonomyState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Owns the autonomy state machine and the loop task.
///
/// `Idle → Running → {Stopped, StoppingRequested → Stopped}`; a fresh
/// `start` from `Stopped` runs again. Stop signals are honored between
/// iterations, never by aborting an action mid-flight — the executor's
/// device scope decides the atomicity of the action itself.
pub struct AutonomyController {
    executor: Arc<ActionExecutor>,
    capture: Arc<dyn ScreenCapture>,
    engine: Arc<DecisionEngine>,
    governor: Arc<SafetyGovernor>,
    log: Arc<ActivityLog>,
    tick_interval: Duration,
    state: RwLock<AutonomyState>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl AutonomyController {
    pub fn new(
        executor: Arc<ActionExecutor>,
        capture: Arc<dyn ScreenCapture>,
        engine: Arc<DecisionEngine>,
        governor: Arc<SafetyGovernor>,
        log: Arc<ActivityLog>,
    ) -> Self {
        Self {
            executor,
            capture,
            engine,
            governor,
            log,
            tick_interval: Duration::from_secs(2),
            state: RwLock::new(AutonomyState::Idle),
            cancel: Mutex::new(None),
        }
    }

    /// Seconds between loop iterations.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn state(&self) -> AutonomyState {
        *self.state.read()
    }

    /// Begin an autonomy run. Valid from `Idle` or `Stopped` only.
    pub fn start(self: &Arc<Self>, task: TaskSpec) -> Result<()> {
        let token = {
            let mut state = self.state.write();
            match *state {
                AutonomyState::Idle | AutonomyState::Stopped => {}
                other => {
                    return Err(VigilError::InvalidState {
                        operation: "start-autonomy".into(),
                        state: other.to_string(),
                    });
                }
            }
            *state = AutonomyState::Running;
            let token = CancellationToken::new();
            *self.cancel.lock() = Some(token.clone());
            token
        };

        info!(goal = ?task.goal, step_budget = task.step_budget, "autonomy starting");
        self.log.record_control(
            ControlEvent::StartAutonomy {
                goal: task.goal.clone(),
                step_budget: task.step_budget,
            },
            ActionOutcome::Executed,
        );

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run(task, token).await;
        });
        Ok(())
    }

    /// Ask the loop to stop at the next iteration boundary. Valid only
    /// while `Running`.
    pub fn request_stop(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                AutonomyState::Running => {}
                other => {
                    return Err(VigilError::InvalidState {
                        operation: "stop-autonomy".into(),
                        state: other.to_string(),
                    });
                }
            }
            *state = AutonomyState::StoppingRequested;
        }
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
        info!("autonomy stop requested");
        self.log
            .record_control(ControlEvent::StopAutonomy, ActionOutcome::Executed);
        Ok(())
    }

    /// Wake the loop so a freshly latched emergency stop is observed
    /// without waiting out an idle tick. The governor latch itself is what
    /// stops the run; this only shortens the latency.
    pub fn notify_emergency(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
    }

    async fn run(self: Arc<Self>, task: TaskSpec, cancel: CancellationToken) {
        let mut steps = 0u32;

        // `None` means the exit is already covered by an audit record
        // (a Terminate decision, or the stop-request control event).
        let exit_record: Option<String> = loop {
            // Stop signals are only honored here, between iterations.
            if self.governor.is_emergency_stopped() {
                break Some("emergency_stop".into());
            }
            if cancel.is_cancelled() {
                break None;
            }
            if steps >= task.step_budget {
                break Some("step_budget_exhausted".into());
            }
            if task.deadline_passed(Utc::now()) {
                break Some("deadline_expired".into());
            }

            match self.capture.capture().await {
                Err(e) => {
                    // Fatal to this tick only.
                    warn!(error = %e, "capture failed — skipping tick");
                    self.log.record_decision(format!("capture_failed: {e}"));
                }
                Ok(frame) => {
                    let history = self.log.recent(self.engine.history_window());
                    match self.engine.decide(&frame, &task, &history).await {
                        Decision::Act { action, reasoning } => {
                            // Re-checked right before execution; the governor
                            // would veto anyway.
                            if self.governor.is_emergency_stopped() {
                                break Some("emergency_stop".into());
                            }
                            if let Some(reasoning) = &reasoning {
                                debug!(reasoning = %reasoning, "model reasoning");
                            }
                            // The executor records the attempt whatever the
                            // outcome; a device failure does not end the run —
                            // the next tick decides against fresh screen state.
                            if let Err(e) = self
                                .executor
                                .execute(action, ActionSource::Autonomous)
                                .await
                            {
                                debug!(error = %e, "autonomous action did not execute");
                            }
                        }
                        Decision::NoOp { reason } => {
                            self.log.record_decision(match reason {
                                Some(reason) => format!("noop: {reason}"),
                                None => "noop".into(),
                            });
                        }
                        Decision::Terminate { reason } => {
                            self.log.record_decision(match reason {
                                Some(reason) => format!("terminate: {reason}"),
                                None => "terminate".into(),
                            });
                            break None;
                        }
                    }
                }
            }

            steps += 1;
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        };

        if let Some(reason) = exit_record {
            self.log.record_decision(reason.clone());
            info!(reason = %reason, steps, "autonomy loop stopped");
        } else {
            info!(steps, "autonomy loop stopped");
        }
        // Clear the token before publishing Stopped: once Stopped is
        // visible a fresh start may install a new token, which must not be
        // wiped by this run's teardown.
        *self.cancel.lock() = None;
        *self.state.write() = AutonomyState::Stopped;
    }
}
