use std::fs;
use std::sync::Mutex;

use serde_json::{json, Value};
use tauri::{AppHandle, Emitter, Manager, State, WebviewUrl, WebviewWindowBuilder};

mod store;
mod transfer;

use store::{Store, StorageKind, LEGACY_CONTENT_KEY, NOTES_KEY, SETTINGS_KEY};
use transfer::{combined_content, render_export, TransferFormat};

type StoreState<'a> = State<'a, Mutex<Store>>;

/// Window event every note window listens on for relayed actions.
const CONTENT_EVENT: &str = "notepad-message";

fn lock_store<'a>(state: &'a StoreState) -> Result<std::sync::MutexGuard<'a, Store>, String> {
    state.lock().map_err(|_| "storage is unavailable".to_string())
}

fn emit_content(app: &AppHandle, message: Value) {
    if let Err(err) = app.emit(CONTENT_EVENT, message.to_string()) {
        log::error!("could not relay notepad message: {err}");
    }
}

#[tauri::command]
fn load_settings(state: StoreState) -> Result<String, String> {
    let store = lock_store(&state)?;
    let settings = store
        .get(SETTINGS_KEY)
        .unwrap_or_else(store::default_settings);
    serde_json::to_string(&settings).map_err(|e| e.to_string())
}

#[tauri::command]
fn save_settings(app: AppHandle, state: StoreState, settings: &str) -> Result<(), String> {
    let parsed: Value = serde_json::from_str(settings).map_err(|e| e.to_string())?;
    let mut store = lock_store(&state)?;
    let requested = parsed
        .get("storageType")
        .and_then(Value::as_str)
        .and_then(StorageKind::parse);
    store.set(SETTINGS_KEY, parsed.clone());
    if let Some(kind) = requested {
        if kind != store.kind() {
            store.change_kind(kind);
        }
    }
    drop(store);
    emit_content(&app, json!({"action": "updateSettings", "settings": parsed}));
    Ok(())
}

#[tauri::command]
fn toggle_visibility(app: AppHandle, state: StoreState, visible: bool) -> Result<(), String> {
    let mut store = lock_store(&state)?;
    let mut settings = store
        .get(SETTINGS_KEY)
        .unwrap_or_else(store::default_settings);
    if let Some(map) = settings.as_object_mut() {
        map.insert("visible".into(), json!(visible));
    }
    store.set(SETTINGS_KEY, settings);
    drop(store);
    emit_content(&app, json!({"action": "toggleVisibility", "visible": visible}));
    Ok(())
}

#[tauri::command]
fn change_storage_type(state: StoreState, storage_type: &str) -> Result<bool, String> {
    let kind = StorageKind::parse(storage_type).unwrap_or_else(|| {
        log::warn!("unknown storage type {storage_type:?}, keeping records local");
        StorageKind::Local
    });
    let mut store = lock_store(&state)?;
    store.change_kind(kind);
    Ok(true)
}

#[tauri::command]
fn load_notes(state: StoreState) -> Result<Value, String> {
    let store = lock_store(&state)?;
    // Legacy single-string records are served as-is; the window migrates
    // them into the note array on its next save.
    Ok(store
        .get(NOTES_KEY)
        .or_else(|| store.get(LEGACY_CONTENT_KEY))
        .unwrap_or(Value::Null))
}

#[tauri::command]
fn save_notes(state: StoreState, notes: Value) -> Result<(), String> {
    let mut store = lock_store(&state)?;
    store.set(NOTES_KEY, notes);
    Ok(())
}

#[tauri::command]
fn export_notes(state: StoreState, format: &str) -> Result<String, String> {
    let format = TransferFormat::parse(format).map_err(|e| e.to_string())?;
    let store = lock_store(&state)?;
    let stored = store
        .get(NOTES_KEY)
        .or_else(|| store.get(LEGACY_CONTENT_KEY))
        .unwrap_or(Value::Null);
    drop(store);
    let file = render_export(&combined_content(&stored), format, chrono::Utc::now());

    let Some(path) = rfd::FileDialog::new()
        .set_file_name(file.filename)
        .save_file()
    else {
        return Err("Export canceled".to_string());
    };
    fs::write(&path, file.body).map_err(|e| e.to_string())?;
    log::info!("exported notes to {}", path.display());
    Ok(file.filename.to_string())
}

#[derive(serde::Serialize)]
struct ImportFile {
    content: String,
    format: String,
}

#[tauri::command]
fn read_import_file() -> Result<ImportFile, String> {
    let Some(path) = rfd::FileDialog::new()
        .add_filter("Notes", &["txt", "json"])
        .pick_file()
    else {
        return Err("Import canceled".to_string());
    };
    let content = fs::read_to_string(&path).map_err(|e| e.to_string())?;
    Ok(ImportFile {
        content,
        format: TransferFormat::from_path(&path).as_str().to_string(),
    })
}

#[tauri::command]
fn import_notes(
    app: AppHandle,
    state: StoreState,
    content: &str,
    format: &str,
) -> Result<String, String> {
    let format = TransferFormat::parse(format).map_err(|e| e.to_string())?;
    let imported = transfer::parse_import(content, format).map_err(|e| e.to_string())?;

    let mut store = lock_store(&state)?;
    let notes = store.get(NOTES_KEY);
    store.set(NOTES_KEY, transfer::apply_import(notes, &imported));
    store.set(LEGACY_CONTENT_KEY, json!(imported));
    drop(store);

    emit_content(&app, json!({"action": "initializeNotepad"}));
    Ok(imported)
}

#[tauri::command]
fn open_settings_window(app: AppHandle) -> Result<(), String> {
    if let Some(window) = app.get_webview_window("settings") {
        window.set_focus().map_err(|e| e.to_string())?;
    } else {
        WebviewWindowBuilder::new(
            &app,
            "settings",
            WebviewUrl::App("index.html?settings=true".into()),
        )
        .title("Notepad Settings")
        .inner_size(360.0, 600.0)
        .build()
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let _ = env_logger::try_init();
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let dir = app.path().app_data_dir()?;
            let store = Store::open(&dir)?;
            app.manage(Mutex::new(store));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_settings,
            save_settings,
            toggle_visibility,
            change_storage_type,
            load_notes,
            save_notes,
            export_notes,
            read_import_file,
            import_notes,
            open_settings_window
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
