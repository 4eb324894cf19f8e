use serde::{Deserialize, Serialize};

use crate::notepad_core::Note;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Yellow,
}

impl Theme {
    pub fn class(self) -> &'static str {
        match self {
            Theme::Light => "sticky-notepad-theme-light",
            Theme::Dark => "sticky-notepad-theme-dark",
            Theme::Yellow => "sticky-notepad-theme-yellow",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Yellow => "yellow",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Sync,
    Drive,
}

impl StorageKind {
    pub fn name(self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Sync => "sync",
            StorageKind::Drive => "drive",
        }
    }
}

/// The singleton display configuration persisted under `notepadSettings`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotepadSettings {
    pub visible: bool,
    pub opacity: f64,
    pub font_size: String,
    pub theme: Theme,
    pub storage_type: StorageKind,
}

impl Default for NotepadSettings {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 0.9,
            font_size: "14px".to_string(),
            theme: Theme::Light,
            storage_type: StorageKind::Local,
        }
    }
}

// The settings applier: pure functions from settings + note state to the
// class/style strings the view renders. Re-applying identical settings
// produces identical strings.

pub fn container_class(settings: &NotepadSettings, note: &Note, is_primary: bool) -> String {
    let mut classes = format!("sticky-notepad-container {}", settings.theme.class());
    if is_primary && !settings.visible {
        classes.push_str(" sticky-notepad-hidden");
    }
    if note.minimized {
        classes.push_str(" sticky-notepad-minimized");
    }
    classes
}

pub fn container_style(settings: &NotepadSettings, note: &Note) -> String {
    let height = if note.minimized {
        "auto".to_string()
    } else {
        format!("{}px", note.size.height)
    };
    format!(
        "position: fixed; top: {}; right: {}; left: {}; bottom: {}; width: {}px; height: {}; opacity: {};",
        note.position.top,
        note.position.right,
        note.position.left,
        note.position.bottom,
        note.size.width,
        height,
        settings.opacity,
    )
}

pub fn textarea_style(settings: &NotepadSettings) -> String {
    format!("font-size: {};", settings.font_size)
}
