use leptos::task::spawn_local;

use leptos::prelude::*;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::messages::ContentMessage;
use crate::notepad_core::{
    insert_tab, keep_in_view, resolved_rect, AutosaveDebounce, DragGesture, Note, Registry,
    RemoveOutcome, ResizeGesture, StoredNotes, AUTOSAVE_DELAY_MS,
};
use crate::settings::{
    container_class, container_style, textarea_style, NotepadSettings, StorageKind, Theme,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["window", "__TAURI__", "core"], catch)]
    async fn invoke(cmd: &str, args: JsValue) -> Result<JsValue, JsValue>;
}

#[derive(Serialize)]
struct SaveSettingsArgs<'a> {
    settings: &'a str,
}
#[derive(Serialize)]
struct ToggleVisibilityArgs {
    visible: bool,
}
#[derive(Serialize)]
struct ChangeStorageTypeArgs<'a> {
    storage_type: &'a str,
}
#[derive(Serialize)]
struct SaveNotesArgs<'a> {
    notes: &'a [Note],
}
#[derive(Serialize)]
struct ExportArgs {
    format: &'static str,
}
#[derive(Serialize)]
struct ImportArgs<'a> {
    content: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct ImportFilePayload {
    content: String,
    format: String,
}

/// The in-flight pointer gesture, at most one at a time.
#[derive(Clone, Debug, PartialEq)]
enum Gesture {
    Drag { id: String, gesture: DragGesture },
    Resize { id: String, gesture: ResizeGesture },
}

fn warn(message: String) {
    web_sys::console::warn_1(&JsValue::from_str(&message));
}

fn report(what: &str, err: &JsValue) {
    web_sys::console::error_2(&JsValue::from_str(&format!("sticky-notepad: {what} failed")), err);
}

fn viewport() -> (f64, f64) {
    let window = window();
    let w = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let h = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    (w, h)
}

/// Serializes every live note into the stored array and writes it as one
/// value. Last writer wins at the store layer.
fn persist_registry(registry: RwSignal<Registry>) {
    let notes = registry.with_untracked(|r| r.snapshots());
    spawn_local(async move {
        let args = match serde_wasm_bindgen::to_value(&SaveNotesArgs { notes: &notes }) {
            Ok(args) => args,
            Err(err) => {
                warn(format!("could not encode notes: {err}"));
                return;
            }
        };
        if let Err(err) = invoke("save_notes", args).await {
            report("save notes", &err);
        }
    });
}

/// One shared debounce timer for text edits: every keystroke resets it,
/// and the registry persists as a whole when the last timer fires.
fn schedule_autosave(
    registry: RwSignal<Registry>,
    timer: RwSignal<Option<i32>>,
    debounce: RwSignal<AutosaveDebounce>,
) {
    let window = window();
    if let Some(handle) = timer.get_untracked() {
        window.clear_timeout_with_handle(handle);
    }
    let token = debounce.try_update(|d| d.edit()).unwrap_or(0);
    let callback = Closure::once_into_js(move || {
        timer.set(None);
        if debounce.try_update(|d| d.fire(token)).unwrap_or(false) {
            persist_registry(registry);
        }
    });
    match window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.unchecked_ref(),
        AUTOSAVE_DELAY_MS,
    ) {
        Ok(handle) => timer.set(Some(handle)),
        Err(err) => report("schedule autosave", &err),
    }
}

fn flash_label(label: RwSignal<&'static str>, flash: &'static str, resting: &'static str) {
    label.set(flash);
    let callback = Closure::once_into_js(move || label.set(resting));
    let _ = window()
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 1500);
}

fn decode_stored_notes(value: JsValue) -> Option<StoredNotes> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    if let Some(content) = value.as_string() {
        return Some(StoredNotes::Legacy(content));
    }
    match serde_wasm_bindgen::from_value::<Vec<Note>>(value) {
        Ok(notes) => Some(StoredNotes::Notes(notes)),
        Err(err) => {
            warn(format!("stored notes were unreadable: {err}"));
            None
        }
    }
}

async fn fetch_registry() -> Registry {
    match invoke("load_notes", JsValue::NULL).await {
        Ok(value) => Registry::hydrate(decode_stored_notes(value)),
        Err(err) => {
            // A failed read must still leave the user with a usable note.
            report("load notes", &err);
            Registry::hydrate(None)
        }
    }
}

/// One note's widget. Keyed by id; everything it renders is looked up in
/// the registry so content edits mutate this DOM in place instead of
/// remounting it.
fn note_widget(
    note: Note,
    settings: RwSignal<NotepadSettings>,
    registry: RwSignal<Registry>,
    gesture: RwSignal<Option<Gesture>>,
    autosave_timer: RwSignal<Option<i32>>,
    debounce: RwSignal<AutosaveDebounce>,
) -> impl IntoView {
    let is_primary = note.is_primary();
    let id = note.id.clone();

    let class = {
        let id = id.clone();
        move || {
            registry.with(|r| {
                r.get(&id)
                    .map(|n| container_class(&settings.get(), n, is_primary))
                    .unwrap_or_default()
            })
        }
    };
    let style = {
        let id = id.clone();
        move || {
            registry.with(|r| {
                r.get(&id)
                    .map(|n| container_style(&settings.get(), n))
                    .unwrap_or_default()
            })
        }
    };
    let content_style = {
        let id = id.clone();
        move || {
            registry.with(|r| {
                if r.get(&id).is_some_and(|n| n.minimized) {
                    "display: none;"
                } else {
                    ""
                }
            })
        }
    };
    let text_style = move || textarea_style(&settings.get());
    // Setting an identical value back is a no-op for the caret, so the
    // echo of the user's own keystroke never moves their cursor.
    let content = {
        let id = id.clone();
        move || registry.with(|r| r.get(&id).map(|n| n.content.clone()).unwrap_or_default())
    };

    let on_header_mousedown = {
        let id = id.clone();
        move |e: web_sys::MouseEvent| {
            // Drags start on the bare header; its buttons keep their click.
            if let Some(target) = e.target().and_then(|t| t.dyn_into::<web_sys::Element>().ok()) {
                if target.closest("button").ok().flatten().is_some() {
                    return;
                }
            }
            e.prevent_default();
            registry.update(|r| r.set_active(&id));
            let (vw, vh) = viewport();
            let Some(rect) =
                registry.with_untracked(|r| r.get(&id).map(|n| resolved_rect(n, vw, vh)))
            else {
                return;
            };
            gesture.set(Some(Gesture::Drag {
                id: id.clone(),
                gesture: DragGesture::begin(
                    e.client_x() as f64,
                    e.client_y() as f64,
                    rect.left,
                    rect.top,
                ),
            }));
        }
    };

    let on_resize_mousedown = {
        let id = id.clone();
        move |e: web_sys::MouseEvent| {
            e.prevent_default();
            let Some(size) = registry.with_untracked(|r| r.get(&id).map(|n| n.size)) else {
                return;
            };
            gesture.set(Some(Gesture::Resize {
                id: id.clone(),
                gesture: ResizeGesture::begin(e.client_x() as f64, e.client_y() as f64, size),
            }));
        }
    };

    let on_settings = move |_| {
        spawn_local(async move {
            if let Err(err) = invoke("open_settings_window", JsValue::NULL).await {
                report("open settings window", &err);
            }
        });
    };

    let on_new_note = move |_| {
        let (vw, vh) = viewport();
        registry.update(|r| {
            let origin = r.active().map(|n| {
                let rect = resolved_rect(n, vw, vh);
                (rect.top, rect.left)
            });
            r.create_note(origin);
        });
        persist_registry(registry);
    };

    let on_minimize = {
        let id = id.clone();
        move |_| {
            registry.update(|r| {
                if let Some(note) = r.get_mut(&id) {
                    note.minimized = !note.minimized;
                }
            });
            persist_registry(registry);
        }
    };

    let on_close = {
        let id = id.clone();
        move |_| {
            let outcome = registry
                .try_update(|r| r.remove_note(&id))
                .unwrap_or(RemoveOutcome::Missing);
            match outcome {
                RemoveOutcome::HiddenPrimary => {
                    settings.update(|s| s.visible = false);
                    spawn_local(async move {
                        match serde_wasm_bindgen::to_value(&ToggleVisibilityArgs { visible: false })
                        {
                            Ok(args) => {
                                if let Err(err) = invoke("toggle_visibility", args).await {
                                    report("hide notepad", &err);
                                }
                            }
                            Err(err) => warn(format!("could not encode visibility: {err}")),
                        }
                    });
                }
                RemoveOutcome::Removed => persist_registry(registry),
                RemoveOutcome::Missing => {}
            }
        }
    };

    let on_input = {
        let id = id.clone();
        move |e| {
            let value = event_target_value(&e);
            registry.update(|r| {
                if let Some(note) = r.get_mut(&id) {
                    note.content = value.clone();
                }
            });
            schedule_autosave(registry, autosave_timer, debounce);
        }
    };

    let on_keydown = {
        let id = id.clone();
        move |e: web_sys::KeyboardEvent| {
            if e.key() != "Tab" {
                return;
            }
            e.prevent_default();
            let Some(area) = e
                .target()
                .and_then(|t| t.dyn_into::<web_sys::HtmlTextAreaElement>().ok())
            else {
                return;
            };
            let start = area.selection_start().ok().flatten().unwrap_or(0) as usize;
            let end = area
                .selection_end()
                .ok()
                .flatten()
                .map(|v| v as usize)
                .unwrap_or(start);
            let (text, cursor) = insert_tab(&area.value(), start, end);
            area.set_value(&text);
            let _ = area.set_selection_start(Some(cursor as u32));
            let _ = area.set_selection_end(Some(cursor as u32));
            registry.update(|r| {
                if let Some(note) = r.get_mut(&id) {
                    note.content = text.clone();
                }
            });
            schedule_autosave(registry, autosave_timer, debounce);
        }
    };

    view! {
        <div class=class style=style>
            <div class="sticky-notepad-header" on:mousedown=on_header_mousedown>
                <div class="sticky-notepad-title">"Sticky Notepad"</div>
                <div class="sticky-notepad-controls">
                    <button class="sticky-notepad-button" title="New note" on:click=on_new_note>"+"</button>
                    <button class="sticky-notepad-button" title="Settings" on:click=on_settings>"⚙"</button>
                    <button class="sticky-notepad-button" title="Minimize" on:click=on_minimize>"−"</button>
                    <button class="sticky-notepad-button" title="Hide" on:click=on_close>"×"</button>
                </div>
            </div>
            <div class="sticky-notepad-content" style=content_style>
                <textarea
                    class="sticky-notepad-textarea"
                    style=text_style
                    placeholder="Type your notes here..."
                    prop:value=content
                    on:input=on_input
                    on:keydown=on_keydown
                ></textarea>
            </div>
            <div class="sticky-notepad-resize-handle" title="Resize" on:mousedown=on_resize_mousedown>
                "⟋"
            </div>
        </div>
    }
}

#[component]
pub fn App() -> impl IntoView {
    let settings = RwSignal::new(NotepadSettings::default());
    let registry = RwSignal::new(Registry::default());
    let gesture = RwSignal::new(None::<Gesture>);
    let autosave_timer = RwSignal::new(None::<i32>);
    let debounce = RwSignal::new(AutosaveDebounce::default());

    let is_settings_window = window()
        .location()
        .search()
        .unwrap_or_default()
        .contains("settings=true");

    // Messages pushed by the backend relay arrive as a CustomEvent whose
    // detail is the serialized action object.
    let closure = Closure::<dyn FnMut(web_sys::CustomEvent)>::new(move |e: web_sys::CustomEvent| {
        let Some(detail) = e.detail().as_string() else {
            return;
        };
        match ContentMessage::decode(&detail) {
            Ok(ContentMessage::UpdateSettings { settings: next }) => settings.set(next),
            Ok(ContentMessage::ToggleVisibility { visible }) => {
                settings.update(|s| s.visible = visible)
            }
            Ok(ContentMessage::InitializeNotepad) => {
                if !is_settings_window {
                    spawn_local(async move {
                        registry.set(fetch_registry().await);
                    });
                }
            }
            Err(err) => warn(format!("dropped unknown notepad message: {err}")),
        }
    });
    let _ = window()
        .add_event_listener_with_callback("notepad-message", closure.as_ref().unchecked_ref());
    closure.forget();

    if !is_settings_window {
        // Document-level gesture tracking shared by every note widget.
        let closure =
            Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |e: web_sys::MouseEvent| {
                let Some(active) = gesture.get_untracked() else {
                    return;
                };
                let (x, y) = (e.client_x() as f64, e.client_y() as f64);
                match active {
                    Gesture::Drag { id, gesture } => {
                        let position = gesture.position_at(x, y);
                        registry.update(|r| {
                            if let Some(note) = r.get_mut(&id) {
                                note.position = position;
                            }
                        });
                    }
                    Gesture::Resize { id, gesture } => {
                        let size = gesture.size_at(x, y);
                        registry.update(|r| {
                            if let Some(note) = r.get_mut(&id) {
                                note.size = size;
                            }
                        });
                    }
                }
            });
        let _ = window()
            .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
        closure.forget();

        let closure =
            Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |_: web_sys::MouseEvent| {
                let Some(active) = gesture.get_untracked() else {
                    return;
                };
                gesture.set(None);
                let (Gesture::Drag { id, .. } | Gesture::Resize { id, .. }) = active;
                let (vw, vh) = viewport();
                registry.update(|r| {
                    if let Some(note) = r.get_mut(&id) {
                        let rect = resolved_rect(note, vw, vh);
                        note.position = keep_in_view(&rect, vw, vh);
                    }
                });
                persist_registry(registry);
            });
        let _ = window()
            .add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
        closure.forget();

        let closure = Closure::<dyn FnMut()>::new(move || {
            let (vw, vh) = viewport();
            registry.update(|r| r.clamp_all(vw, vh));
            persist_registry(registry);
        });
        let _ = window()
            .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    Effect::new(move |_| {
        spawn_local(async move {
            match invoke("load_settings", JsValue::NULL).await {
                Ok(value) => {
                    if let Some(raw) = value.as_string() {
                        match serde_json::from_str::<NotepadSettings>(&raw) {
                            Ok(loaded) => settings.set(loaded),
                            Err(err) => {
                                warn(format!("settings were unreadable, using defaults: {err}"))
                            }
                        }
                    }
                }
                Err(err) => report("load settings", &err),
            }
            if !is_settings_window {
                registry.set(fetch_registry().await);
            }
        });
    });

    let overlay_view = move || {
        view! {
            <div class="sticky-notepad-overlay">
                <For
                    each=move || registry.with(|r| r.snapshots())
                    key=|note| note.id.clone()
                    children=move |note| {
                        note_widget(note, settings, registry, gesture, autosave_timer, debounce)
                    }
                />
            </div>
        }
        .into_any()
    };

    let save_label = RwSignal::new("Save Settings");
    let export_label = RwSignal::new("Export Notes");
    let import_label = RwSignal::new("Import Notes");
    let export_format = RwSignal::new("txt");

    let save_settings_now = move || {
        let current = settings.get_untracked();
        spawn_local(async move {
            let payload = match serde_json::to_string(&current) {
                Ok(payload) => payload,
                Err(err) => {
                    warn(format!("could not encode settings: {err}"));
                    return;
                }
            };
            match serde_wasm_bindgen::to_value(&SaveSettingsArgs { settings: &payload }) {
                Ok(args) => match invoke("save_settings", args).await {
                    Ok(_) => flash_label(save_label, "Saved!", "Save Settings"),
                    Err(err) => report("save settings", &err),
                },
                Err(err) => warn(format!("could not encode settings: {err}")),
            }
        });
    };

    let on_toggle_visible = move |e| {
        let visible = event_target_checked(&e);
        settings.update(|s| s.visible = visible);
        spawn_local(async move {
            match serde_wasm_bindgen::to_value(&ToggleVisibilityArgs { visible }) {
                Ok(args) => {
                    if let Err(err) = invoke("toggle_visibility", args).await {
                        report("toggle visibility", &err);
                    }
                }
                Err(err) => warn(format!("could not encode visibility: {err}")),
            }
        });
    };

    let on_storage_change = move |kind: StorageKind| {
        settings.update(|s| s.storage_type = kind);
        spawn_local(async move {
            match serde_wasm_bindgen::to_value(&ChangeStorageTypeArgs {
                storage_type: kind.name(),
            }) {
                Ok(args) => {
                    if let Err(err) = invoke("change_storage_type", args).await {
                        report("change storage type", &err);
                    }
                }
                Err(err) => warn(format!("could not encode storage type: {err}")),
            }
        });
    };

    let on_export = move |_| {
        let format = export_format.get_untracked();
        spawn_local(async move {
            match serde_wasm_bindgen::to_value(&ExportArgs { format }) {
                Ok(args) => match invoke("export_notes", args).await {
                    Ok(_) => flash_label(export_label, "Exported!", "Export Notes"),
                    Err(err) => report("export notes", &err),
                },
                Err(err) => warn(format!("could not encode export request: {err}")),
            }
        });
    };

    let on_import = move |_| {
        spawn_local(async move {
            let picked = match invoke("read_import_file", JsValue::NULL).await {
                Ok(picked) => picked,
                Err(err) => {
                    report("read import file", &err);
                    return;
                }
            };
            let file: ImportFilePayload = match serde_wasm_bindgen::from_value(picked) {
                Ok(file) => file,
                Err(err) => {
                    warn(format!("could not decode picked file: {err}"));
                    return;
                }
            };
            match serde_wasm_bindgen::to_value(&ImportArgs {
                content: &file.content,
                format: &file.format,
            }) {
                Ok(args) => match invoke("import_notes", args).await {
                    Ok(_) => flash_label(import_label, "Imported!", "Import Notes"),
                    Err(err) => report("import notes", &err),
                },
                Err(err) => warn(format!("could not encode import request: {err}")),
            }
        });
    };

    let popup_view = move || {
        view! {
            <div style="flex: 1; padding: 1.5rem 2rem; overflow-y: auto;">
                <h2 style="margin-top: 0;">"Sticky Notepad"</h2>

                <label style="display: flex; align-items: center; gap: 0.5rem; margin-bottom: 1rem;">
                    <input
                        type="checkbox"
                        prop:checked=move || settings.get().visible
                        on:change=on_toggle_visible
                    />
                    "Show notepad"
                </label>

                <div style="display: flex; flex-direction: column; gap: 0.5rem; margin-bottom: 1rem;">
                    <label style="font-weight: 600; font-size: 0.9em;">"Opacity"</label>
                    <input
                        type="range"
                        min="0"
                        max="1"
                        step="0.05"
                        prop:value=move || settings.get().opacity.to_string()
                        on:input=move |e| {
                            let opacity = event_target_value(&e).parse().unwrap_or(0.9);
                            settings.update(|s| s.opacity = opacity);
                        }
                    />
                </div>

                <div style="display: flex; flex-direction: column; gap: 0.5rem; margin-bottom: 1rem;">
                    <label style="font-weight: 600; font-size: 0.9em;">"Font Size"</label>
                    <select
                        prop:value=move || settings.get().font_size.clone()
                        on:change=move |e| {
                            let font_size = event_target_value(&e);
                            settings.update(|s| s.font_size = font_size);
                        }
                    >
                        <option value="12px">"12px"</option>
                        <option value="14px">"14px"</option>
                        <option value="16px">"16px"</option>
                        <option value="18px">"18px"</option>
                    </select>
                </div>

                <div style="display: flex; flex-direction: column; gap: 0.5rem; margin-bottom: 1rem;">
                    <label style="font-weight: 600; font-size: 0.9em;">"Theme"</label>
                    <select
                        prop:value=move || settings.get().theme.name()
                        on:change=move |e| {
                            let theme = match event_target_value(&e).as_str() {
                                "dark" => Theme::Dark,
                                "yellow" => Theme::Yellow,
                                _ => Theme::Light,
                            };
                            settings.update(|s| s.theme = theme);
                        }
                    >
                        <option value="light">"Light"</option>
                        <option value="dark">"Dark"</option>
                        <option value="yellow">"Yellow"</option>
                    </select>
                </div>

                <div style="display: flex; flex-direction: column; gap: 0.5rem; margin-bottom: 1rem;">
                    <label style="font-weight: 600; font-size: 0.9em;">"Storage"</label>
                    <label style="display: flex; align-items: center; gap: 0.5rem;">
                        <input
                            type="radio"
                            name="storage"
                            prop:checked=move || settings.get().storage_type == StorageKind::Local
                            on:change=move |_| on_storage_change(StorageKind::Local)
                        />
                        "Local"
                    </label>
                    <label style="display: flex; align-items: center; gap: 0.5rem;">
                        <input
                            type="radio"
                            name="storage"
                            prop:checked=move || settings.get().storage_type == StorageKind::Sync
                            on:change=move |_| on_storage_change(StorageKind::Sync)
                        />
                        "Sync"
                    </label>
                    <label style="display: flex; align-items: center; gap: 0.5rem; color: #9ca3af;">
                        <input type="radio" name="storage" disabled=true />
                        "Google Drive (coming soon)"
                    </label>
                </div>

                <div style="display: flex; gap: 0.5rem; margin-bottom: 1.5rem;">
                    <button on:click=move |_| save_settings_now()>
                        {move || save_label.get()}
                    </button>
                    <button on:click=move |_| {
                        settings.set(NotepadSettings::default());
                        save_settings_now();
                    }>
                        "Reset"
                    </button>
                </div>

                <h3 style="border-top: 1px solid #e0e0e0; padding-top: 1rem;">"Export/Import"</h3>
                <div style="display: flex; align-items: center; gap: 0.5rem; margin-bottom: 0.5rem;">
                    <select on:change=move |e| {
                        export_format.set(if event_target_value(&e) == "json" { "json" } else { "txt" });
                    }>
                        <option value="txt">".txt"</option>
                        <option value="json">".json"</option>
                    </select>
                    <button on:click=on_export>{move || export_label.get()}</button>
                </div>
                <button on:click=on_import>{move || import_label.get()}</button>
            </div>
        }
        .into_any()
    };

    view! {
        <main class="app-layout" style="display: flex; min-height: 100vh; width: 100vw;">
            {move || if is_settings_window { popup_view() } else { overlay_view() }}
        </main>
    }
}
