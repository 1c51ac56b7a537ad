use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::action::{Action, ActionSource};

/// A control-surface operation that manipulates runtime state rather than
/// the input device. Logged for audit like every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    StartAutonomy {
        goal: Option<String>,
        step_budget: u32,
    },
    StopAutonomy,
    EmergencyStop,
    ResetEmergencyStop,
}

/// What a single audit record describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoggedOp {
    /// An attempted desktop action and the caller that issued it.
    Action {
        action: Action,
        source: ActionSource,
    },
    /// A control-surface state operation.
    Control { event: ControlEvent },
    /// An autonomy-loop tick that resolved without executing an action
    /// (no-op, terminate, capture failure, decode failure).
    Decision { summary: String },
}

/// How an attempted operation resolved. Exactly one of these per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed,
    Vetoed { reason: String },
    Failed { reason: String },
}

/// An immutable audit entry. Never mutated or reordered after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Monotonic sequence number, unique per process lifetime.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub op: LoggedOp,
    pub outcome: ActionOutcome,
    /// Resulting data, e.g. a window list or a screenshot reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Append-only, timestamp-ordered record of every decision and action.
///
/// Appends are ordered by the monotonic sequence counter and do not contend
/// with the executor's device mutex. Rotation and persistence are external
/// concerns.
#[derive(Debug, Default)]
pub struct ActivityLog {
    seq: AtomicU64,
    records: RwLock<Vec<ActionRecord>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, stamping the sequence number and timestamp.
    /// Returns the assigned sequence number.
    pub fn append(&self, op: LoggedOp, outcome: ActionOutcome, data: Option<Value>) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let record = ActionRecord {
            seq,
            timestamp: Utc::now(),
            op,
            outcome,
            data,
        };
        info!(seq, op = ?record.op, outcome = ?record.outcome, "activity");
        self.records.write().push(record);
        seq
    }

    pub fn record_action(
        &self,
        action: Action,
        source: ActionSource,
        outcome: ActionOutcome,
        data: Option<Value>,
    ) -> u64 {
        self.append(LoggedOp::Action { action, source }, outcome, data)
    }

    pub fn record_control(&self, event: ControlEvent, outcome: ActionOutcome) -> u64 {
        self.append(LoggedOp::Control { event }, outcome, None)
    }

    pub fn record_decision(&self, summary: impl Into<String>) -> u64 {
        self.append(
            LoggedOp::Decision {
                summary: summary.into(),
            },
            ActionOutcome::Executed,
            None,
        )
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// The most recent `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ActionRecord> {
        let records = self.records.read();
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }

    /// A copy of every record, in append order.
    pub fn snapshot(&self) -> Vec<ActionRecord> {
        self.records.read().clone()
    }
}
