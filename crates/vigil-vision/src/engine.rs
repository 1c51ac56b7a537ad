//! Turns a captured frame plus task context into a validated decision.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use vigil_core::{Action, ActionRecord, LoggedOp, TaskSpec};
use vigil_desktop::Frame;

use crate::provider::{VisionProvider, VisionRequest};

const SYSTEM_PROMPT: &str = r#"You are operating a Linux desktop through a narrow action interface.
You are shown a screenshot of the current screen and the recent action history.
Decide the single next action that makes progress on the task.

Reply with exactly one JSON object and nothing else. One of:
{"type": "move", "x": 100, "y": 200}
{"type": "click", "button": 1, "x": 100, "y": 200}
{"type": "type", "text": "text to type"}
{"type": "key", "chord": "ctrl+t"}
{"type": "windows"}
{"type": "activate", "id": "0x01234567"}
{"type": "screenshot"}
{"type": "wait"}           - nothing should happen this tick
{"type": "task_complete"}  - the task is done or cannot be done

You may include a "reasoning" field explaining the choice.
Coordinates are absolute screen pixels. Be precise."#;

/// The engine's validated interpretation of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Execute this action next.
    Act {
        action: Action,
        reasoning: Option<String>,
    },
    /// Nothing to do this tick; the loop idles until the next capture.
    NoOp { reason: Option<String> },
    /// The task is complete or unachievable; the loop stops.
    Terminate { reason: Option<String> },
}

/// Obtains a proposed action from the vision boundary. Owns no device
/// state; everything it returns still passes the safety governor before
/// touching the desktop.
pub struct DecisionEngine {
    provider: Arc<dyn VisionProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    history_window: usize,
}

impl DecisionEngine {
    pub fn new(provider: Arc<dyn VisionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1000,
            temperature: 0.1,
            timeout: Duration::from_secs(30),
            history_window: 10,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// How many recent records the engine wants per tick.
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Ask the vision boundary what to do next.
    ///
    /// Never fails: provider errors, timeouts, and unparsable replies all
    /// degrade to `NoOp` with the reason recorded.
    pub async fn decide(
        &self,
        frame: &Frame,
        task: &TaskSpec,
        history: &[ActionRecord],
    ) -> Decision {
        let request = VisionRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(task, history),
            image_base64: frame.to_base64(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let raw = match tokio::time::timeout(self.timeout, self.provider.complete(&request)).await
        {
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "decision timed out");
                return Decision::NoOp {
                    reason: Some("decision_timeout".into()),
                };
            }
            Ok(Err(e)) => {
                warn!(error = %e, "vision provider failed");
                return Decision::NoOp {
                    reason: Some(format!("vision_error: {e}")),
                };
            }
            Ok(Ok(raw)) => raw,
        };

        match parse_decision(&raw) {
            Ok(decision) => {
                debug!(?decision, "decision parsed");
                decision
            }
            Err(e) => {
                warn!(error = %e, raw = %raw, "unparsable model reply — treating as no-op");
                Decision::NoOp {
                    reason: Some(format!("decode_failure: {e}")),
                }
            }
        }
    }
}

fn build_prompt(task: &TaskSpec, history: &[ActionRecord]) -> String {
    let mut prompt = String::new();
    match &task.goal {
        Some(goal) => prompt.push_str(&format!("Current task: {goal}\n")),
        None => prompt.push_str("Current task: explore the desktop and act usefully.\n"),
    }
    if !history.is_empty() {
        prompt.push_str("\nRecent actions (oldest first):\n");
        for record in history {
            prompt.push_str(&format!("- {}\n", summarize_record(record)));
        }
    }
    prompt.push_str("\nWhat is the single next action? Reply with one JSON object.");
    prompt
}

fn summarize_record(record: &ActionRecord) -> String {
    let what = match &record.op {
        LoggedOp::Action { action, source } => format!("{source} {}", action.name()),
        LoggedOp::Control { event } => format!("control {event:?}"),
        LoggedOp::Decision { summary } => format!("decision {summary}"),
    };
    format!("{} {:?}", what, record.outcome)
}

/// Parse a model reply into a decision.
///
/// Tolerates code fences and surrounding prose: the first JSON object found
/// in the text is used. The original controller's nested
/// `suggested_action` shape is accepted alongside a bare action object.
pub fn parse_decision(raw: &str) -> vigil_core::Result<Decision> {
    let value = extract_json_object(raw)?;
    let object = match value.get("suggested_action") {
        Some(inner) if inner.is_object() => inner,
        _ => &value,
    };

    let kind = object
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| decode("reply has no \"type\" field"))?;

    let reasoning = object
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(String::from);

    let decision = match kind {
        "move" => Decision::Act {
            action: Action::Move {
                x: coord(object, "x")?,
                y: coord(object, "y")?,
            },
            reasoning,
        },
        "click" => Decision::Act {
            action: Action::Click {
                button: object.get("button").and_then(|v| v.as_u64()).unwrap_or(1) as u8,
                x: opt_coord(object, "x")?,
                y: opt_coord(object, "y")?,
            },
            reasoning,
        },
        "type" | "type_text" => Decision::Act {
            action: Action::TypeText {
                text: object
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| decode("type action has no \"text\""))?
                    .to_string(),
            },
            reasoning,
        },
        "key" | "key_press" => {
            let chord = object
                .get("chord")
                .or_else(|| object.get("key"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| decode("key action has no \"chord\""))?;
            Decision::Act {
                action: Action::KeyChord {
                    chord: chord.to_string(),
                },
                reasoning,
            }
        }
        "windows" | "list_windows" => Decision::Act {
            action: Action::ListWindows,
            reasoning,
        },
        "activate" | "activate_window" => Decision::Act {
            action: Action::ActivateWindow {
                id: object
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| decode("activate action has no \"id\""))?
                    .to_string(),
            },
            reasoning,
        },
        "screenshot" => Decision::Act {
            action: Action::Screenshot,
            reasoning,
        },
        "wait" | "noop" => Decision::NoOp { reason: reasoning },
        "task_complete" | "terminate" | "done" => Decision::Terminate { reason: reasoning },
        other => return Err(decode(&format!("unknown action type \"{other}\""))),
    };

    Ok(decision)
}

fn decode(msg: &str) -> vigil_core::VigilError {
    vigil_core::VigilError::Decode(msg.to_string())
}

fn coord(object: &serde_json::Value, key: &str) -> vigil_core::Result<i32> {
    object
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| decode(&format!("missing or invalid \"{key}\" coordinate")))
}

fn opt_coord(object: &serde_json::Value, key: &str) -> vigil_core::Result<Option<i32>> {
    match object.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| decode(&format!("invalid \"{key}\" coordinate"))),
    }
}

/// Find and parse the first JSON object in possibly-noisy model output.
fn extract_json_object(raw: &str) -> vigil_core::Result<serde_json::Value> {
    let trimmed = raw.trim();

    // Fast path: the whole reply is the object.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    // Strip code fences / prose: take the outermost brace span.
    let start = trimmed.find('{').ok_or_else(|| decode("no JSON object in reply"))?;
    let end = trimmed.rfind('}').ok_or_else(|| decode("no JSON object in reply"))?;
    if end <= start {
        return Err(decode("no JSON object in reply"));
    }
    let candidate = &trimmed[start..=end];
    let value: serde_json::Value =
        serde_json::from_str(candidate).map_err(|e| decode(&format!("bad JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(decode("reply JSON is not an object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use chrono::Utc;

    fn frame() -> Frame {
        Frame {
            png: vec![0x89, b'P', b'N', b'G'],
            captured_at: Utc::now(),
            file_name: None,
        }
    }

    fn task() -> TaskSpec {
        TaskSpec::new("open terminal", 3)
    }

    // ── Parser ─────────────────────────────────────────────────

    #[test]
    fn test_parse_bare_action() {
        let decision = parse_decision(r#"{"type":"move","x":100,"y":200}"#).unwrap();
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::Move { x: 100, y: 200 },
                reasoning: None
            }
        );
    }

    #[test]
    fn test_parse_click_without_coordinates() {
        let decision = parse_decision(r#"{"type":"click"}"#).unwrap();
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::Click {
                    button: 1,
                    x: None,
                    y: None
                },
                reasoning: None
            }
        );
    }

    #[test]
    fn test_parse_fenced_reply() {
        let raw = "Here is my decision:\n```json\n{\"type\": \"key\", \"chord\": \"ctrl+t\"}\n```\nDone.";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::KeyChord {
                    chord: "ctrl+t".into()
                },
                reasoning: None
            }
        );
    }

    #[test]
    fn test_parse_suggested_action_wrapper() {
        let raw = r#"{"analysis":"a desktop","suggested_action":{"type":"click","x":10,"y":20,"reasoning":"button there"}}"#;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::Click {
                    button: 1,
                    x: Some(10),
                    y: Some(20)
                },
                reasoning: Some("button there".into())
            }
        );
    }

    #[test]
    fn test_parse_key_field_alias() {
        let decision = parse_decision(r#"{"type":"key_press","key":"Return"}"#).unwrap();
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::KeyChord {
                    chord: "Return".into()
                },
                reasoning: None
            }
        );
    }

    #[test]
    fn test_parse_wait_and_complete() {
        assert_eq!(
            parse_decision(r#"{"type":"wait"}"#).unwrap(),
            Decision::NoOp { reason: None }
        );
        assert_eq!(
            parse_decision(r#"{"type":"task_complete","reasoning":"all done"}"#).unwrap(),
            Decision::Terminate {
                reason: Some("all done".into())
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_decision("I cannot help with that.").is_err());
        assert!(parse_decision("").is_err());
        assert!(parse_decision(r#"{"type":"explode"}"#).is_err());
        assert!(parse_decision(r#"{"type":"move","x":"left"}"#).is_err());
        assert!(parse_decision(r#"{"type":"move","x":1}"#).is_err());
        assert!(parse_decision(r#"[1,2,3]"#).is_err());
    }

    // ── Engine degradation ─────────────────────────────────────

    #[tokio::test]
    async fn test_decide_parses_action() {
        let provider = Arc::new(MockProvider::new().with_response(r#"{"type":"windows"}"#));
        let engine = DecisionEngine::new(provider, "mock");
        let decision = engine.decide(&frame(), &task(), &[]).await;
        assert_eq!(
            decision,
            Decision::Act {
                action: Action::ListWindows,
                reasoning: None
            }
        );
    }

    #[tokio::test]
    async fn test_decide_degrades_on_malformed_reply() {
        let provider = Arc::new(MockProvider::new().with_response("not json"));
        let engine = DecisionEngine::new(provider, "mock");
        match engine.decide(&frame(), &task(), &[]).await {
            Decision::NoOp { reason: Some(reason) } => {
                assert!(reason.starts_with("decode_failure"))
            }
            other => panic!("expected NoOp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decide_degrades_on_provider_error() {
        let provider = Arc::new(MockProvider::new().with_error("boundary unreachable"));
        let engine = DecisionEngine::new(provider, "mock");
        match engine.decide(&frame(), &task(), &[]).await {
            Decision::NoOp { reason: Some(reason) } => {
                assert!(reason.starts_with("vision_error"))
            }
            other => panic!("expected NoOp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decide_sends_goal_and_history() {
        let provider = Arc::new(MockProvider::new().with_response(r#"{"type":"wait"}"#));
        let engine = DecisionEngine::new(provider.clone(), "mock");

        let log = vigil_core::ActivityLog::new();
        log.record_decision("warmup tick");
        let history = log.recent(10);

        let _ = engine.decide(&frame(), &task(), &history).await;
        let requests = provider.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("open terminal"));
        assert!(requests[0].prompt.contains("warmup tick"));
        assert!(!requests[0].image_base64.is_empty());
    }

    #[tokio::test]
    async fn test_decide_times_out() {
        struct StallingProvider;

        #[async_trait::async_trait]
        impl crate::provider::VisionProvider for StallingProvider {
            fn name(&self) -> &str {
                "stalling"
            }
            async fn complete(&self, _request: &VisionRequest) -> vigil_core::Result<String> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }

        let engine = DecisionEngine::new(Arc::new(StallingProvider), "mock")
            .with_timeout(std::time::Duration::from_millis(20));
        match engine.decide(&frame(), &task(), &[]).await {
            Decision::NoOp { reason: Some(reason) } => assert_eq!(reason, "decision_timeout"),
            other => panic!("expected NoOp, got {other:?}"),
        }
    }
}
