use serde::{Deserialize, Serialize};

/// A top-level window as reported by the window manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Window-manager id, e.g. "0x03200004".
    pub id: String,
    /// Virtual desktop number ("-1" for sticky windows).
    pub desktop: String,
    /// WM_CLASS, e.g. "Navigator.firefox".
    pub class: String,
    pub title: String,
}
