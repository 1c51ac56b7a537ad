//! The governed action executor — the sole mutual-exclusion point between
//! the autonomy loop and the control surface.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use vigil_core::{
    Action, ActionOutcome, ActionSource, ActivityLog, Result, VigilError, WindowInfo,
};
use vigil_safety::{EvalContext, SafetyGovernor, Verdict};

use crate::backend::DesktopBackend;
use crate::capture::{Frame, ScreenCapture};

/// What a successful execution produced.
#[derive(Debug)]
pub enum ActionOutput {
    Ack,
    Windows(Vec<WindowInfo>),
    Frame(Frame),
}

impl ActionOutput {
    fn audit_data(&self) -> Option<serde_json::Value> {
        match self {
            ActionOutput::Ack => None,
            ActionOutput::Windows(windows) => Some(json!({ "windows": windows })),
            ActionOutput::Frame(frame) => Some(json!({
                "file": frame.file_name.clone(),
                "bytes": frame.len(),
            })),
        }
    }
}

/// Translates validated actions into device operations.
///
/// Holds the single device mutex across evaluate-then-execute, so no two
/// actions — from the loop or the API — are ever evaluated-and-executed
/// interleaved. Every call appends exactly one activity record, whatever
/// the outcome.
pub struct ActionExecutor {
    backend: Arc<dyn DesktopBackend>,
    capture: Arc<dyn ScreenCapture>,
    governor: Arc<SafetyGovernor>,
    log: Arc<ActivityLog>,
    device: Mutex<()>,
}

impl ActionExecutor {
    pub fn new(
        backend: Arc<dyn DesktopBackend>,
        capture: Arc<dyn ScreenCapture>,
        governor: Arc<SafetyGovernor>,
        log: Arc<ActivityLog>,
    ) -> Self {
        Self {
            backend,
            capture,
            governor,
            log,
            device: Mutex::new(()),
        }
    }

    /// Execute one action on behalf of `source`.
    ///
    /// Veto is an expected outcome, returned as `VigilError::Vetoed` and
    /// never retried here. Device failures are `VigilError::Device`; retry
    /// policy belongs to the caller.
    pub async fn execute(&self, action: Action, source: ActionSource) -> Result<ActionOutput> {
        // Screenshots are read-only: no governor, no device lock. They may
        // run concurrently with an in-flight device action.
        if matches!(action, Action::Screenshot) {
            return self.execute_screenshot(source).await;
        }

        let _device = self.device.lock().await;
        debug!(action = action.name(), source = %source, "executing");

        // Window-targeting actions need the resolved title before the
        // forbidden-window check can run. Resolution is a read-only query.
        let mut ctx = EvalContext::new(source);
        if let Action::ActivateWindow { id } = &action {
            let windows = match self.backend.list_windows().await {
                Ok(windows) => windows,
                Err(e) => return self.fail(action, source, e),
            };
            match windows.into_iter().find(|w| w.id == *id) {
                Some(w) => {
                    ctx = ctx.with_window_title(format!("{} {}", w.class, w.title));
                }
                None => {
                    let e = VigilError::Device(format!("window {id} not found"));
                    return self.fail(action, source, e);
                }
            }
        }

        if let Verdict::Veto(reason) = self.governor.evaluate(&action, &ctx) {
            self.log.record_action(
                action,
                source,
                ActionOutcome::Vetoed {
                    reason: reason.clone(),
                },
                None,
            );
            return Err(VigilError::Vetoed { reason });
        }

        match self.dispatch(&action).await {
            Ok(output) => {
                let data = output.audit_data();
                self.log
                    .record_action(action, source, ActionOutcome::Executed, data);
                Ok(output)
            }
            Err(e) => self.fail(action, source, e),
        }
    }

    async fn execute_screenshot(&self, source: ActionSource) -> Result<ActionOutput> {
        match self.capture.capture().await {
            Ok(frame) => {
                let output = ActionOutput::Frame(frame);
                self.log.record_action(
                    Action::Screenshot,
                    source,
                    ActionOutcome::Executed,
                    output.audit_data(),
                );
                Ok(output)
            }
            Err(e) => self.fail(Action::Screenshot, source, e),
        }
    }

    fn fail(
        &self,
        action: Action,
        source: ActionSource,
        error: VigilError,
    ) -> Result<ActionOutput> {
        warn!(action = action.name(), source = %source, error = %error, "action failed");
        self.log.record_action(
            action,
            source,
            ActionOutcome::Failed {
                reason: error.to_string(),
            },
            None,
        );
        Err(error)
    }

    /// Device dispatch for an admitted action — exhaustive over every
    /// action kind.
    async fn dispatch(&self, action: &Action) -> Result<ActionOutput> {
        match action {
            Action::Move { x, y } => {
                self.backend.move_pointer(*x, *y).await?;
                Ok(ActionOutput::Ack)
            }
            Action::Click { button, x, y } => {
                self.backend.click(*button, x.zip(*y)).await?;
                Ok(ActionOutput::Ack)
            }
            Action::TypeText { text } => {
                self.backend.type_text(text).await?;
                Ok(ActionOutput::Ack)
            }
            Action::KeyChord { chord } => {
                self.backend.key_chord(chord).await?;
                Ok(ActionOutput::Ack)
            }
            Action::ListWindows => {
                let windows = self.backend.list_windows().await?;
                Ok(ActionOutput::Windows(windows))
            }
            Action::ActivateWindow { id } => {
                self.backend.activate_window(id).await?;
                Ok(ActionOutput::Ack)
            }
            // Normally short-circuited in `execute`; kept for completeness
            // of the dispatch.
            Action::Screenshot => {
                let frame = self.capture.capture().await?;
                Ok(ActionOutput::Frame(frame))
            }
        }
    }
}
