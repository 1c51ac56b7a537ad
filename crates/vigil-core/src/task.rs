use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an autonomy run is trying to accomplish, and how long it may try.
///
/// Supplied on start, discarded when the run stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Natural-language goal handed to the vision model. `None` means open
    /// exploration.
    pub goal: Option<String>,
    /// Maximum loop iterations before the run completes normally.
    pub step_budget: u32,
    /// Wall-clock deadline. Expiry completes the run normally.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskSpec {
    pub fn new(goal: impl Into<String>, step_budget: u32) -> Self {
        Self {
            goal: Some(goal.into()),
            step_budget,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}
