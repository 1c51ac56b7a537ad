use serde::{Deserialize, Serialize};

fn default_button() -> u8 {
    1
}

/// A single discrete desktop-input or query operation.
///
/// Immutable once constructed. Adding a variant is a compile-time-checked
/// change everywhere it must be handled (executor dispatch, governor
/// coordinate check, audit log).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Move the pointer to absolute screen coordinates.
    Move { x: i32, y: i32 },
    /// Click a pointer button, optionally moving to coordinates first.
    Click {
        #[serde(default = "default_button")]
        button: u8,
        #[serde(default)]
        x: Option<i32>,
        #[serde(default)]
        y: Option<i32>,
    },
    /// Inject a string of text via keyboard synthesis.
    TypeText { text: String },
    /// Press a key chord, e.g. "Return" or "ctrl+shift+t".
    KeyChord { chord: String },
    /// Enumerate the desktop's windows.
    ListWindows,
    /// Raise and focus a window by id.
    ActivateWindow { id: String },
    /// Capture the current screen. Read-only; never touches the input device.
    Screenshot,
}

impl Action {
    /// Short stable name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::TypeText { .. } => "type",
            Action::KeyChord { .. } => "key",
            Action::ListWindows => "windows",
            Action::ActivateWindow { .. } => "activate",
            Action::Screenshot => "screenshot",
        }
    }

    /// The target coordinates, for pointer actions that carry them.
    ///
    /// A `Click` without coordinates clicks at the current pointer position
    /// and returns `None` here.
    pub fn coordinates(&self) -> Option<(i32, i32)> {
        match self {
            Action::Move { x, y } => Some((*x, *y)),
            Action::Click {
                x: Some(x),
                y: Some(y),
                ..
            } => Some((*x, *y)),
            _ => None,
        }
    }
}

/// Which caller produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    /// The autonomy loop acting on its own tick.
    Autonomous,
    /// An external control-surface request.
    Api,
}

impl std::fmt::Display for ActionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionSource::Autonomous => write!(f, "autonomous"),
            ActionSource::Api => write!(f, "api"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serde_tag() {
        let action = Action::Move { x: 100, y: 200 };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["x"], 100);

        let restored: Action = serde_json::from_value(json).unwrap();
        assert_eq!(restored, action);
    }

    #[test]
    fn test_click_defaults() {
        let action: Action = serde_json::from_str(r#"{"type":"click"}"#).unwrap();
        assert_eq!(
            action,
            Action::Click {
                button: 1,
                x: None,
                y: None
            }
        );
        assert_eq!(action.coordinates(), None);
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(Action::Move { x: 3, y: 4 }.coordinates(), Some((3, 4)));
        assert_eq!(
            Action::Click {
                button: 1,
                x: Some(10),
                y: Some(20)
            }
            .coordinates(),
            Some((10, 20))
        );
        assert_eq!(Action::ListWindows.coordinates(), None);
        assert_eq!(Action::Screenshot.coordinates(), None);
    }
}
