use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const PRIMARY_NOTE_ID: &str = "note-1";

pub const DEFAULT_WIDTH: f64 = 300.0;
pub const DEFAULT_HEIGHT: f64 = 200.0;
pub const MIN_WIDTH: f64 = 200.0;
pub const MIN_HEIGHT: f64 = 150.0;
pub const SPAWN_OFFSET: f64 = 30.0;
pub const AUTOSAVE_DELAY_MS: i32 = 500;

/// One edge offset of a note, stored the way CSS understands it:
/// a pixel length or the `auto` sentinel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CssOffset {
    Px(f64),
    Auto,
}

impl CssOffset {
    pub fn px(self) -> Option<f64> {
        match self {
            CssOffset::Px(v) => Some(v),
            CssOffset::Auto => None,
        }
    }
}

impl fmt::Display for CssOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssOffset::Px(v) => write!(f, "{v}px"),
            CssOffset::Auto => write!(f, "auto"),
        }
    }
}

impl Serialize for CssOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CssOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(parse_px(&raw).map(CssOffset::Px).unwrap_or(CssOffset::Auto))
    }
}

fn parse_px(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed);
    number.trim().parse::<f64>().ok()
}

mod px_string {
    use super::parse_px;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{value}px"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_px(&raw).ok_or_else(|| de::Error::custom(format!("invalid pixel length: {raw}")))
    }
}

/// Four directional offsets. Exactly two are meaningful at a time; the
/// pair last set by a move wins and the other two stay `auto`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotePosition {
    pub top: CssOffset,
    pub right: CssOffset,
    pub left: CssOffset,
    pub bottom: CssOffset,
}

impl Default for NotePosition {
    fn default() -> Self {
        Self {
            top: CssOffset::Px(20.0),
            right: CssOffset::Px(20.0),
            left: CssOffset::Auto,
            bottom: CssOffset::Auto,
        }
    }
}

impl NotePosition {
    /// A top/left anchored position; right and bottom collapse to `auto`.
    pub fn at(top: f64, left: f64) -> Self {
        Self {
            top: CssOffset::Px(top),
            right: CssOffset::Auto,
            left: CssOffset::Px(left),
            bottom: CssOffset::Auto,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteSize {
    #[serde(with = "px_string")]
    pub width: f64,
    #[serde(with = "px_string")]
    pub height: f64,
}

impl Default for NoteSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// One sticky-note widget, in exactly the shape the store persists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: NotePosition,
    #[serde(default)]
    pub size: NoteSize,
    #[serde(default)]
    pub minimized: bool,
}

impl Note {
    fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            position: NotePosition::default(),
            size: NoteSize::default(),
            minimized: false,
        }
    }

    pub fn primary() -> Self {
        Self::with_id(PRIMARY_NOTE_ID)
    }

    pub fn is_primary(&self) -> bool {
        self.id == PRIMARY_NOTE_ID
    }
}

/// What the store hands back for notes: the current array under `notes`,
/// or the legacy single-note string under `noteContent`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredNotes {
    Notes(Vec<Note>),
    Legacy(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The primary note is only ever hidden; its entry stays put.
    HiddenPrimary,
    Removed,
    Missing,
}

/// The live collection of notes plus the most recently touched one.
/// Rebuilt from the store on every initialization.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Registry {
    notes: Vec<Note>,
    active: Option<String>,
}

impl Registry {
    /// Builds the registry from whatever the store held. Never yields an
    /// empty registry: a missing or unusable payload produces the single
    /// default note.
    pub fn hydrate(stored: Option<StoredNotes>) -> Self {
        let notes = match stored {
            Some(StoredNotes::Notes(notes)) if !notes.is_empty() => notes,
            Some(StoredNotes::Legacy(content)) => {
                let mut note = Note::primary();
                note.content = content;
                vec![note]
            }
            _ => vec![Note::primary()],
        };
        let active = notes.first().map(|note| note.id.clone());
        Self { notes, active }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Note> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, id: &str) {
        if self.get(id).is_some() {
            self.active = Some(id.to_string());
        }
    }

    fn next_id(&self) -> String {
        // Count-based allocation, bumped past survivors so an id is never
        // reused after a deletion.
        let mut n = self.notes.len() + 1;
        while self.notes.iter().any(|note| note.id == format!("note-{n}")) {
            n += 1;
        }
        format!("note-{n}")
    }

    /// Inserts a new note offset from the active note's resolved origin
    /// (or at the default position when there is none) and makes it the
    /// active note. Returns the new id.
    pub fn create_note(&mut self, active_origin: Option<(f64, f64)>) -> String {
        let id = self.next_id();
        let mut note = Note::with_id(id.clone());
        if let Some((top, left)) = active_origin {
            note.position = NotePosition::at(top + SPAWN_OFFSET, left + SPAWN_OFFSET);
        }
        self.notes.push(note);
        self.active = Some(id.clone());
        id
    }

    pub fn remove_note(&mut self, id: &str) -> RemoveOutcome {
        if self.get(id).is_none() {
            return RemoveOutcome::Missing;
        }
        if id == PRIMARY_NOTE_ID {
            return RemoveOutcome::HiddenPrimary;
        }
        self.notes.retain(|note| note.id != id);
        if self.active.as_deref() == Some(id) {
            self.active = Some(PRIMARY_NOTE_ID.to_string());
        }
        RemoveOutcome::Removed
    }

    /// The full-array snapshot written to the store as one value.
    pub fn snapshots(&self) -> Vec<Note> {
        self.notes.clone()
    }

    /// Clamps every live note back into the viewport; runs on window
    /// resize.
    pub fn clamp_all(&mut self, viewport_w: f64, viewport_h: f64) {
        for note in &mut self.notes {
            let rect = resolved_rect(note, viewport_w, viewport_h);
            note.position = keep_in_view(&rect, viewport_w, viewport_h);
        }
    }
}

/// In-flight drag: the pointer offset inside the note captured on
/// mousedown. Every position it produces is a top/left pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragGesture {
    offset_x: f64,
    offset_y: f64,
}

impl DragGesture {
    pub fn begin(pointer_x: f64, pointer_y: f64, origin_left: f64, origin_top: f64) -> Self {
        Self {
            offset_x: pointer_x - origin_left,
            offset_y: pointer_y - origin_top,
        }
    }

    pub fn position_at(&self, pointer_x: f64, pointer_y: f64) -> NotePosition {
        NotePosition::at(pointer_y - self.offset_y, pointer_x - self.offset_x)
    }
}

/// In-flight resize: starting pointer plus the size it started from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeGesture {
    start_x: f64,
    start_y: f64,
    initial: NoteSize,
}

impl ResizeGesture {
    pub fn begin(pointer_x: f64, pointer_y: f64, initial: NoteSize) -> Self {
        Self {
            start_x: pointer_x,
            start_y: pointer_y,
            initial,
        }
    }

    pub fn size_at(&self, pointer_x: f64, pointer_y: f64) -> NoteSize {
        NoteSize {
            width: (self.initial.width + (pointer_x - self.start_x)).max(MIN_WIDTH),
            height: (self.initial.height + (pointer_y - self.start_y)).max(MIN_HEIGHT),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Resolves a note's position to a concrete box, turning right/bottom
/// anchoring into left/top against the given viewport.
pub fn resolved_rect(note: &Note, viewport_w: f64, viewport_h: f64) -> Rect {
    let width = note.size.width;
    let height = note.size.height;
    let left = match (note.position.left, note.position.right) {
        (CssOffset::Px(left), _) => left,
        (CssOffset::Auto, CssOffset::Px(right)) => viewport_w - right - width,
        _ => 0.0,
    };
    let top = match (note.position.top, note.position.bottom) {
        (CssOffset::Px(top), _) => top,
        (CssOffset::Auto, CssOffset::Px(bottom)) => viewport_h - bottom - height,
        _ => 0.0,
    };
    Rect {
        left,
        top,
        width,
        height,
    }
}

/// Clamps a note back into the viewport: right/bottom overshoot lands the
/// far edge exactly on the viewport edge, negative left/top snaps to 0.
/// The result is always top/left anchored.
pub fn keep_in_view(rect: &Rect, viewport_w: f64, viewport_h: f64) -> NotePosition {
    let mut left = rect.left;
    let mut top = rect.top;
    if left + rect.width > viewport_w {
        left = viewport_w - rect.width;
    }
    if top + rect.height > viewport_h {
        top = viewport_h - rect.height;
    }
    if left < 0.0 {
        left = 0.0;
    }
    if top < 0.0 {
        top = 0.0;
    }
    NotePosition::at(top, left)
}

/// Inserts a literal tab over the current selection. Offsets are UTF-16
/// code units, the way text inputs report their selection; the returned
/// cursor is in the same units, just past the tab.
pub fn insert_tab(text: &str, start: usize, end: usize) -> (String, usize) {
    let start_byte = utf16_to_byte_index(text, start);
    let end_byte = utf16_to_byte_index(text, end).max(start_byte);
    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(&text[..start_byte]);
    out.push('\t');
    out.push_str(&text[end_byte..]);
    let cursor = text[..start_byte].chars().map(char::len_utf16).sum::<usize>() + 1;
    (out, cursor)
}

/// Maps a UTF-16 code-unit offset onto the nearest char boundary at or
/// after it; offsets past the end land at the end.
fn utf16_to_byte_index(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        if units >= offset {
            return index;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// Decides when a debounced autosave actually writes: each edit arms a
/// fresh timer token and supersedes the pending one, so a burst of edits
/// yields exactly one snapshot once the last timer fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutosaveDebounce {
    generation: u32,
    pending: Option<u32>,
}

impl AutosaveDebounce {
    /// Registers an edit and returns the token the new timer carries.
    pub fn edit(&mut self) -> u32 {
        self.generation += 1;
        self.pending = Some(self.generation);
        self.generation
    }

    /// A timer carrying `token` fired. True exactly when it is still the
    /// latest edit's timer and the registry should be persisted.
    pub fn fire(&mut self, token: u32) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hydrates_default_note_from_empty_store() {
        let registry = Registry::hydrate(None);
        assert_eq!(registry.notes().len(), 1);
        let note = &registry.notes()[0];
        assert_eq!(note.id, "note-1");
        assert_eq!(note.position, NotePosition::default());
        assert_eq!(note.size, NoteSize::default());
        assert!(!note.minimized);
        assert_eq!(registry.active_id(), Some("note-1"));
    }

    #[test]
    fn hydrates_empty_array_as_default_note() {
        let registry = Registry::hydrate(Some(StoredNotes::Notes(Vec::new())));
        assert_eq!(registry.notes().len(), 1);
        assert_eq!(registry.notes()[0].id, "note-1");
    }

    #[test]
    fn hydrates_legacy_content_into_primary_note() {
        let registry = Registry::hydrate(Some(StoredNotes::Legacy("old text".to_string())));
        assert_eq!(registry.notes().len(), 1);
        assert_eq!(registry.notes()[0].id, "note-1");
        assert_eq!(registry.notes()[0].content, "old text");
    }

    #[test]
    fn snapshot_round_trip_preserves_every_field() {
        let mut registry = Registry::hydrate(None);
        registry.create_note(Some((100.0, 50.0)));
        if let Some(note) = registry.get_mut("note-2") {
            note.content = "second".to_string();
            note.size = NoteSize {
                width: 250.0,
                height: 180.0,
            };
            note.minimized = true;
        }

        let value = serde_json::to_value(registry.snapshots()).unwrap();
        let decoded: StoredNotes = serde_json::from_value(value).unwrap();
        let rebuilt = Registry::hydrate(Some(decoded));
        assert_eq!(rebuilt.notes(), registry.notes());
    }

    #[test]
    fn snapshot_serializes_css_strings() {
        let note = Note::primary();
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "note-1",
                "content": "",
                "position": {
                    "top": "20px",
                    "right": "20px",
                    "left": "auto",
                    "bottom": "auto"
                },
                "size": { "width": "300px", "height": "200px" },
                "minimized": false
            })
        );
    }

    #[test]
    fn create_note_offsets_from_active_origin() {
        let mut registry = Registry::hydrate(None);
        let id = registry.create_note(Some((100.0, 50.0)));
        assert_eq!(id, "note-2");
        let note = registry.get(&id).unwrap();
        assert_eq!(note.position, NotePosition::at(130.0, 80.0));
        assert_eq!(note.position.right, CssOffset::Auto);
        assert_eq!(note.position.bottom, CssOffset::Auto);
        assert_eq!(registry.active_id(), Some("note-2"));
    }

    #[test]
    fn create_note_without_active_uses_default_position() {
        let mut registry = Registry::hydrate(None);
        let id = registry.create_note(None);
        assert_eq!(registry.get(&id).unwrap().position, NotePosition::default());
    }

    #[test]
    fn ids_are_not_reused_after_deletion() {
        let mut registry = Registry::hydrate(None);
        registry.create_note(None);
        let third = registry.create_note(None);
        assert_eq!(third, "note-3");
        assert_eq!(registry.remove_note("note-2"), RemoveOutcome::Removed);
        let next = registry.create_note(None);
        assert_eq!(next, "note-4");
    }

    #[test]
    fn primary_note_is_hidden_not_removed() {
        let mut registry = Registry::hydrate(None);
        registry.create_note(None);
        assert_eq!(registry.remove_note("note-1"), RemoveOutcome::HiddenPrimary);
        assert!(registry.get("note-1").is_some());
        assert_eq!(registry.notes().len(), 2);
    }

    #[test]
    fn removing_active_note_falls_back_to_primary() {
        let mut registry = Registry::hydrate(None);
        let id = registry.create_note(None);
        assert_eq!(registry.active_id(), Some(id.as_str()));
        assert_eq!(registry.remove_note(&id), RemoveOutcome::Removed);
        assert_eq!(registry.active_id(), Some("note-1"));
        assert_eq!(registry.remove_note(&id), RemoveOutcome::Missing);
    }

    #[test]
    fn drag_resolves_to_top_left_pair() {
        let gesture = DragGesture::begin(110.0, 130.0, 100.0, 120.0);
        let position = gesture.position_at(210.0, 180.0);
        assert_eq!(position.top, CssOffset::Px(170.0));
        assert_eq!(position.left, CssOffset::Px(200.0));
        assert_eq!(position.right, CssOffset::Auto);
        assert_eq!(position.bottom, CssOffset::Auto);
    }

    #[test]
    fn resize_clamps_to_minimum() {
        let gesture = ResizeGesture::begin(500.0, 400.0, NoteSize::default());
        let grown = gesture.size_at(550.0, 450.0);
        assert_eq!(grown.width, 350.0);
        assert_eq!(grown.height, 250.0);

        let shrunk = gesture.size_at(100.0, 100.0);
        assert_eq!(shrunk.width, MIN_WIDTH);
        assert_eq!(shrunk.height, MIN_HEIGHT);
    }

    #[test]
    fn resolved_rect_handles_right_anchoring() {
        let note = Note::primary();
        let rect = resolved_rect(&note, 1024.0, 768.0);
        assert_eq!(rect.left, 1024.0 - 20.0 - 300.0);
        assert_eq!(rect.top, 20.0);
        assert_eq!(rect.width, 300.0);
        assert_eq!(rect.height, 200.0);
    }

    #[test]
    fn keep_in_view_lands_edges_exactly_on_viewport() {
        let rect = Rect {
            left: 900.0,
            top: 700.0,
            width: 300.0,
            height: 200.0,
        };
        let position = keep_in_view(&rect, 1024.0, 768.0);
        assert_eq!(position.left, CssOffset::Px(724.0));
        assert_eq!(position.top, CssOffset::Px(568.0));
    }

    #[test]
    fn keep_in_view_snaps_negative_offsets_to_zero() {
        let rect = Rect {
            left: -40.0,
            top: -5.0,
            width: 300.0,
            height: 200.0,
        };
        let position = keep_in_view(&rect, 1024.0, 768.0);
        assert_eq!(position, NotePosition::at(0.0, 0.0));
    }

    #[test]
    fn keep_in_view_leaves_contained_notes_in_place() {
        let rect = Rect {
            left: 100.0,
            top: 50.0,
            width: 300.0,
            height: 200.0,
        };
        assert_eq!(keep_in_view(&rect, 1024.0, 768.0), NotePosition::at(50.0, 100.0));
    }

    #[test]
    fn window_resize_clamps_every_live_note() {
        let mut registry = Registry::hydrate(None);
        let second = registry.create_note(Some((700.0, 900.0)));
        registry.clamp_all(1024.0, 768.0);

        // Default note resolves against the right edge and stays contained.
        assert_eq!(
            registry.get("note-1").unwrap().position,
            NotePosition::at(20.0, 704.0)
        );
        // The spawned note overflowed both edges and lands exactly on them.
        assert_eq!(
            registry.get(&second).unwrap().position,
            NotePosition::at(768.0 - 200.0, 1024.0 - 300.0)
        );
    }

    #[test]
    fn inserts_literal_tab_over_selection() {
        let (text, cursor) = insert_tab("hello world", 5, 5);
        assert_eq!(text, "hello\t world");
        assert_eq!(cursor, 6);

        let (text, cursor) = insert_tab("hello world", 5, 11);
        assert_eq!(text, "hello\t");
        assert_eq!(cursor, 6);
    }

    #[test]
    fn tab_offsets_are_utf16_code_units() {
        // "é" is two bytes but one code unit; a cursor after it is at 2.
        let (text, cursor) = insert_tab("héllo", 2, 2);
        assert_eq!(text, "hé\tllo");
        assert_eq!(cursor, 3);

        // An emoji is two code units and four bytes.
        let (text, cursor) = insert_tab("a😀b", 3, 3);
        assert_eq!(text, "a😀\tb");
        assert_eq!(cursor, 4);

        // An offset inside the surrogate pair snaps past the char.
        let (text, cursor) = insert_tab("a😀b", 2, 2);
        assert_eq!(text, "a😀\tb");
        assert_eq!(cursor, 4);

        let (text, cursor) = insert_tab("héllo wörld", 0, 11);
        assert_eq!(text, "\t");
        assert_eq!(cursor, 1);
    }

    #[test]
    fn tab_offsets_past_the_end_are_clamped() {
        let (text, cursor) = insert_tab("é", 5, 9);
        assert_eq!(text, "é\t");
        assert_eq!(cursor, 2);
    }

    #[test]
    fn rapid_edits_persist_exactly_once() {
        let mut debounce = AutosaveDebounce::default();
        let tokens: Vec<u32> = (0..5).map(|_| debounce.edit()).collect();
        let saves = tokens.iter().filter(|&&t| debounce.fire(t)).count();
        assert_eq!(saves, 1);
    }

    #[test]
    fn edits_after_a_save_arm_a_new_timer() {
        let mut debounce = AutosaveDebounce::default();
        let first = debounce.edit();
        assert!(debounce.fire(first));
        assert!(!debounce.fire(first));
        let second = debounce.edit();
        assert!(debounce.fire(second));
    }

    #[test]
    fn offsets_decode_from_css_strings() {
        let position: NotePosition = serde_json::from_value(json!({
            "top": "12.5px",
            "right": "auto",
            "left": "0px",
            "bottom": "nonsense"
        }))
        .unwrap();
        assert_eq!(position.top, CssOffset::Px(12.5));
        assert_eq!(position.right, CssOffset::Auto);
        assert_eq!(position.left, CssOffset::Px(0.0));
        assert_eq!(position.bottom, CssOffset::Auto);
    }
}
