use serde::{Deserialize, Serialize};

use crate::settings::NotepadSettings;

/// Messages pushed from the backend to the overlay. Payloads carry an
/// `action` tag on the wire; the closed enum makes dispatch exhaustive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContentMessage {
    UpdateSettings { settings: NotepadSettings },
    ToggleVisibility { visible: bool },
    InitializeNotepad,
}

impl ContentMessage {
    /// Decodes an incoming payload; an unknown action is reported, not a
    /// crash.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
