use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use vigil_config::{RestrictedZone, SafetyConfig};
use vigil_core::{Action, ActionSource};

use crate::rate::RateWindow;

/// Stable veto reason strings, shared with the audit log and tests.
pub const VETO_EMERGENCY_STOP: &str = "emergency_stop";
pub const VETO_RATE_LIMIT: &str = "rate_limit";
pub const VETO_RESTRICTED_ZONE: &str = "restricted_zone";
pub const VETO_FORBIDDEN_WINDOW: &str = "forbidden_window";

/// The governor's answer for a proposed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Action may proceed. Its timestamp has been admitted to the rate
    /// window as a side effect of evaluation.
    Allow,
    /// Action is rejected — with a stable reason string.
    Veto(String),
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Caller-supplied context for an evaluation.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub source: ActionSource,
    /// Resolved title/class of the target window, for window-targeting
    /// actions. The executor resolves it before evaluating.
    pub window_title: Option<String>,
}

impl EvalContext {
    pub fn new(source: ActionSource) -> Self {
        Self {
            source,
            window_title: None,
        }
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }
}

/// Evaluates every proposed action against the safety policy.
///
/// Policy is immutable after construction; the emergency latch and the rate
/// window are the only mutable state. Evaluation and rate-window admission
/// happen under one lock, so no two callers can interleave between the rate
/// check and the admission.
pub struct SafetyGovernor {
    zones: Vec<RestrictedZone>,
    /// Lowercased at construction; matching is case-insensitive.
    forbidden_titles: Vec<String>,
    window: Mutex<RateWindow>,
    emergency: AtomicBool,
}

impl SafetyGovernor {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            zones: config.restricted_zones.clone(),
            forbidden_titles: config
                .forbidden_titles
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            window: Mutex::new(RateWindow::new(
                config.max_actions,
                Duration::from_secs(config.window_secs),
            )),
            emergency: AtomicBool::new(false),
        }
    }

    /// Evaluate a proposed action. Checks run in order and short-circuit on
    /// the first failure: emergency stop, rate limit, restricted zone,
    /// forbidden window. On `Allow` the action has been admitted to the
    /// rate window.
    pub fn evaluate(&self, action: &Action, ctx: &EvalContext) -> Verdict {
        if self.emergency.load(Ordering::SeqCst) {
            warn!(action = action.name(), source = %ctx.source, "vetoed: emergency stop is latched");
            return Verdict::Veto(VETO_EMERGENCY_STOP.into());
        }

        // Hold the window lock across check → remaining checks → admit, so
        // evaluation and admission are atomic with respect to other callers.
        let mut window = self.window.lock();
        let now = Instant::now();

        if !window.would_admit(now) {
            warn!(action = action.name(), source = %ctx.source, "vetoed: rate limit");
            return Verdict::Veto(VETO_RATE_LIMIT.into());
        }

        if let Some((x, y)) = action.coordinates() {
            if self.zones.iter().any(|z| z.contains(x, y)) {
                warn!(action = action.name(), x, y, source = %ctx.source, "vetoed: restricted zone");
                return Verdict::Veto(VETO_RESTRICTED_ZONE.into());
            }
        }

        if matches!(action, Action::ActivateWindow { .. }) {
            if let Some(title) = ctx.window_title.as_deref() {
                let lower = title.to_lowercase();
                if self.forbidden_titles.iter().any(|f| lower.contains(f)) {
                    warn!(action = action.name(), title, source = %ctx.source, "vetoed: forbidden window");
                    return Verdict::Veto(VETO_FORBIDDEN_WINDOW.into());
                }
            }
        }

        window.admit(now);
        Verdict::Allow
    }

    /// Latch the emergency stop. Idempotent; effective for every subsequent
    /// evaluation immediately.
    pub fn trigger_emergency_stop(&self) {
        if !self.emergency.swap(true, Ordering::SeqCst) {
            warn!("emergency stop triggered — all further actions vetoed");
        }
    }

    /// Explicit operator reset of the emergency latch.
    pub fn reset_emergency_stop(&self) {
        if self.emergency.swap(false, Ordering::SeqCst) {
            info!("emergency stop reset by operator");
        }
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    /// Admitted actions currently inside the rate window.
    pub fn rate_occupancy(&self) -> usize {
        self.window.lock().occupancy(Instant::now())
    }
}
