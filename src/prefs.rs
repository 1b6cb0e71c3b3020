use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TipError};
use crate::models::TipId;

/// Durable flat key-value storage. `set(key, None)` removes the key.
/// Implementations must have flushed the write when `set` returns.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Option<Value>) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        (**self).set(key, value)
    }
}

/// JSON object on disk, rewritten atomically on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let file = File::open(&path).map_err(|e| storage_error(&path, e))?;
            match serde_json::from_reader(BufReader::new(file)) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| storage_error(&self.path, e))?;

        let temp_file = NamedTempFile::new_in(parent).map_err(|e| storage_error(&self.path, e))?;
        {
            let mut writer = BufWriter::new(&temp_file);
            serde_json::to_writer_pretty(&mut writer, &self.values)
                .map_err(|e| storage_error(&self.path, e))?;
            writer.flush().map_err(|e| storage_error(&self.path, e))?;
        }
        temp_file.persist(&self.path).map_err(|e| storage_error(&self.path, e))?;
        Ok(())
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> TipError {
    TipError::Storage { path: path.to_path_buf(), details: err.to_string() }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        match value {
            Some(value) => self.values.insert(key.to_string(), value),
            None => self.values.remove(key),
        };
        self.flush()
    }
}

/// In-process store, mostly for tests. `fail_writes` simulates a broken disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        if self.fail_writes {
            return Err(TipError::Storage {
                path: PathBuf::from("<memory>"),
                details: "writes disabled".to_string(),
            });
        }
        match value {
            Some(value) => self.values.insert(key.to_string(), value),
            None => self.values.remove(key),
        };
        Ok(())
    }
}

const LAST_SHOWN_DATE_KEY: &str = "tipday.last_shown_date";
const LAST_SHOWN_TIMESTAMP_KEY: &str = "tipday.last_shown_timestamp";
const LAST_SELECTED_DATE_KEY: &str = "tipday.last_selected_date";
const DISABLED_KEY: &str = "tipday.disabled";
const LAST_TIP_INDEX_KEY: &str = "tipday.last_tip_index";
const SHOWN_HISTORY_KEY: &str = "tipday.shown_history";
const FAVORITES_KEY: &str = "tipday.favorites";
const LANGUAGE_KEY: &str = "tipday.language";
const HAS_OPENED_FAVORITES_KEY: &str = "tipday.has_opened_favorites";

const ALL_KEYS: &[&str] = &[
    LAST_SHOWN_DATE_KEY,
    LAST_SHOWN_TIMESTAMP_KEY,
    LAST_SELECTED_DATE_KEY,
    DISABLED_KEY,
    LAST_TIP_INDEX_KEY,
    SHOWN_HISTORY_KEY,
    FAVORITES_KEY,
    LANGUAGE_KEY,
    HAS_OPENED_FAVORITES_KEY,
];

/// Typed view over the namespaced preference keys.
#[derive(Debug)]
pub struct TipState<S> {
    store: S,
}

impl<S: KeyValueStore> TipState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed preference");
                None
            }
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| TipError::Storage {
            path: PathBuf::from(key),
            details: e.to_string(),
        })?;
        debug!(key, %value, "persisting preference");
        self.store.set(key, Some(value))
    }

    pub fn last_shown_date(&self) -> Option<NaiveDate> {
        self.read(LAST_SHOWN_DATE_KEY)
    }

    pub fn set_last_shown_date(&mut self, date: NaiveDate) -> Result<()> {
        self.write(LAST_SHOWN_DATE_KEY, &date)
    }

    pub fn last_shown_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read::<i64>(LAST_SHOWN_TIMESTAMP_KEY)
            .and_then(DateTime::from_timestamp_millis)
    }

    pub fn set_last_shown_timestamp(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.write(LAST_SHOWN_TIMESTAMP_KEY, &at.timestamp_millis())
    }

    /// Local day on which the current tip was last chosen, by any means.
    pub fn last_selected_date(&self) -> Option<NaiveDate> {
        self.read(LAST_SELECTED_DATE_KEY)
    }

    pub fn set_last_selected_date(&mut self, date: NaiveDate) -> Result<()> {
        self.write(LAST_SELECTED_DATE_KEY, &date)
    }

    pub fn is_disabled(&self) -> bool {
        self.read(DISABLED_KEY).unwrap_or(false)
    }

    pub fn set_disabled(&mut self, disabled: bool) -> Result<()> {
        self.write(DISABLED_KEY, &disabled)
    }

    /// `None` is the "never shown" sentinel.
    pub fn last_index(&self) -> Option<usize> {
        self.read::<i64>(LAST_TIP_INDEX_KEY)
            .and_then(|i| usize::try_from(i).ok())
    }

    pub fn set_last_index(&mut self, index: usize) -> Result<()> {
        self.write(LAST_TIP_INDEX_KEY, &index)
    }

    /// Most recent first.
    pub fn shown_history(&self) -> Vec<usize> {
        self.read(SHOWN_HISTORY_KEY).unwrap_or_default()
    }

    pub fn set_shown_history(&mut self, history: &[usize]) -> Result<()> {
        self.write(SHOWN_HISTORY_KEY, &history)
    }

    pub fn favorites(&self) -> Vec<TipId> {
        self.read(FAVORITES_KEY).unwrap_or_default()
    }

    pub fn set_favorites(&mut self, ids: &[TipId]) -> Result<()> {
        self.write(FAVORITES_KEY, &ids)
    }

    pub fn language(&self) -> Option<String> {
        self.read(LANGUAGE_KEY)
    }

    pub fn set_language(&mut self, code: &str) -> Result<()> {
        self.write(LANGUAGE_KEY, &code)
    }

    pub fn has_opened_favorites(&self) -> bool {
        self.read(HAS_OPENED_FAVORITES_KEY).unwrap_or(false)
    }

    pub fn set_has_opened_favorites(&mut self, opened: bool) -> Result<()> {
        self.write(HAS_OPENED_FAVORITES_KEY, &opened)
    }

    /// Removes every key this crate owns. Unrelated keys are left alone.
    pub fn clear_state(&mut self) -> Result<()> {
        for key in ALL_KEYS {
            self.store.set(key, None)?;
        }
        Ok(())
    }
}
