use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

pub const SETTINGS_KEY: &str = "notepadSettings";
pub const NOTES_KEY: &str = "notes";
pub const LEGACY_CONTENT_KEY: &str = "noteContent";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} holds invalid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Which backing area key-value records go to. Drive is a stub that
/// delegates to local until a real sync backend exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Sync,
    Drive,
}

impl StorageKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "local" => Some(Self::Local),
            "sync" => Some(Self::Sync),
            "drive" => Some(Self::Drive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sync => "sync",
            Self::Drive => "drive",
        }
    }

    fn backing(self) -> Self {
        match self {
            Self::Drive => Self::Local,
            other => other,
        }
    }

    fn file_name(self) -> &'static str {
        match self.backing() {
            Self::Sync => "sync.json",
            _ => "local.json",
        }
    }
}

pub fn default_settings() -> Value {
    json!({
        "visible": true,
        "opacity": 0.9,
        "fontSize": "14px",
        "theme": "light",
        "storageType": "local",
    })
}

/// File-backed key-value store, one JSON object per backing area.
pub struct Store {
    dir: PathBuf,
    kind: StorageKind,
}

impl Store {
    /// Opens the store at `dir`, seeding default settings on first run and
    /// restoring the storage backend recorded in the settings record.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut store = Store {
            dir: dir.to_path_buf(),
            kind: StorageKind::Local,
        };
        let settings = match store.get(SETTINGS_KEY) {
            Some(settings) => settings,
            None => {
                let defaults = default_settings();
                store.set(SETTINGS_KEY, defaults.clone());
                defaults
            }
        };
        if let Some(kind) = settings
            .get("storageType")
            .and_then(Value::as_str)
            .and_then(StorageKind::parse)
        {
            store.kind = kind;
        }
        Ok(store)
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Reads a key from the active backend, falling back to local when a
    /// non-local backend fails or has no record for it.
    pub fn get(&self, key: &str) -> Option<Value> {
        let primary = match self.read_map(self.kind) {
            Ok(map) => map.get(key).cloned(),
            Err(err) => {
                log::error!("{err}");
                None
            }
        };
        if primary.is_some() || self.kind.backing() == StorageKind::Local {
            return primary;
        }
        match self.read_map(StorageKind::Local) {
            Ok(map) => map.get(key).cloned(),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }

    /// Writes a key to the active backend. Non-local backends also mirror
    /// the record into local so fallback reads stay coherent; a failed
    /// non-local write degrades to a local-only write.
    pub fn set(&mut self, key: &str, value: Value) {
        if let Err(err) = self.write_key(self.kind, key, value.clone()) {
            log::error!("{err}");
            if self.kind.backing() == StorageKind::Local {
                return;
            }
            log::warn!("{} write failed, falling back to local", self.kind.as_str());
        }
        if self.kind.backing() != StorageKind::Local {
            if let Err(err) = self.write_key(StorageKind::Local, key, value) {
                log::error!("{err}");
            }
        }
    }

    /// Switches the active backend and persists the choice into the
    /// settings record so it survives restarts.
    pub fn change_kind(&mut self, kind: StorageKind) {
        if kind == StorageKind::Drive {
            log::warn!("drive storage is not implemented yet, keeping records local");
        }
        self.kind = kind;
        let mut settings = self.get(SETTINGS_KEY).unwrap_or_else(default_settings);
        if let Some(map) = settings.as_object_mut() {
            map.insert("storageType".into(), json!(kind.as_str()));
        }
        self.set(SETTINGS_KEY, settings);
    }

    fn file_path(&self, kind: StorageKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn read_map(&self, kind: StorageKind) -> Result<BTreeMap<String, Value>, StoreError> {
        let path = self.file_path(kind);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Parse { path, source })
    }

    fn write_key(&self, kind: StorageKind, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = match self.read_map(kind) {
            Ok(map) => map,
            Err(err) => {
                // A corrupt file loses its other records rather than
                // blocking every future write.
                log::warn!("{err}");
                BTreeMap::new()
            }
        };
        map.insert(key.to_string(), value);
        let path = self.file_path(kind);
        let raw = serde_json::to_string_pretty(&map)
            .map_err(|source| StoreError::Parse { path: path.clone(), source })?;
        fs::write(&path, raw).map_err(|source| StoreError::Write { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_open_seeds_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let settings = store.get(SETTINGS_KEY).unwrap();
        assert_eq!(settings["visible"], json!(true));
        assert_eq!(settings["opacity"], json!(0.9));
        assert_eq!(settings["fontSize"], json!("14px"));
        assert_eq!(settings["theme"], json!("light"));
        assert_eq!(settings["storageType"], json!("local"));
    }

    #[test]
    fn values_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = Store::open(dir.path()).unwrap();
            store.set(NOTES_KEY, json!([{"id": "note-1", "content": "hello"}]));
        }
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(
            store.get(NOTES_KEY).unwrap()[0]["content"],
            json!("hello")
        );
    }

    #[test]
    fn sync_writes_mirror_into_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.change_kind(StorageKind::Sync);
        store.set(NOTES_KEY, json!("synced"));

        assert!(dir.path().join("sync.json").exists());
        let local: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("local.json")).unwrap())
                .unwrap();
        assert_eq!(local[NOTES_KEY], json!("synced"));
    }

    #[test]
    fn sync_reads_fall_back_to_local_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.set(LEGACY_CONTENT_KEY, json!("only local"));
        store.change_kind(StorageKind::Sync);
        assert_eq!(store.get(LEGACY_CONTENT_KEY), Some(json!("only local")));
    }

    #[test]
    fn storage_kind_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = Store::open(dir.path()).unwrap();
            store.change_kind(StorageKind::Sync);
        }
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.kind(), StorageKind::Sync);
    }

    #[test]
    fn drive_delegates_to_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.change_kind(StorageKind::Drive);
        store.set(NOTES_KEY, json!("on drive"));

        assert!(!dir.path().join("drive.json").exists());
        let local: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("local.json")).unwrap())
                .unwrap();
        assert_eq!(local[NOTES_KEY], json!("on drive"));
    }

    #[test]
    fn corrupt_file_does_not_block_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join("local.json"), "not json").unwrap();

        assert_eq!(store.get(NOTES_KEY), None);
        store.set(NOTES_KEY, json!("recovered"));
        assert_eq!(store.get(NOTES_KEY), Some(json!("recovered")));
    }
}
