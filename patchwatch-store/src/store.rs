/**
 * RECORD STORE - Append-only update history, one JSON file per server
 *
 * ROLE:
 * Durable persistence of every report a server ever sent, as a JSON array in
 * `<data_dir>/<server id>.json`, in append order.
 *
 * HOW IT WORKS:
 * - append = lock the server id, load the array, push, rewrite the whole file
 * - rewrite = write `<file>.tmp`, fsync, rename over the target
 * - a file that does not parse as an array is reported as `Corrupt`; `read`
 *   logs it and starts over from an empty history
 *
 * The rename is what external readers (the dashboard) rely on: they see either
 * the previous complete array or the new one, never a partial write.
 */

use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::entry::UpdateEntry;
use crate::id::ServerId;
use crate::locks::KeyedLocks;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Outcome of loading one history file.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryLoad {
    /// No file yet for this server.
    Missing,
    Parsed(Vec<Value>),
    /// File exists but is not a JSON array.
    Corrupt { path: PathBuf, reason: String },
}

impl HistoryLoad {
    pub fn into_entries(self) -> Vec<Value> {
        match self {
            HistoryLoad::Parsed(entries) => entries,
            HistoryLoad::Missing | HistoryLoad::Corrupt { .. } => Vec::new(),
        }
    }
}

pub struct RecordStore {
    data_dir: PathBuf,
    locks: KeyedLocks,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn history_path(&self, id: &ServerId) -> PathBuf {
        self.data_dir.join(id.file_name())
    }

    /// Loads a history without deciding what to do with a corrupt file.
    pub fn load(&self, id: &ServerId) -> Result<HistoryLoad, StoreError> {
        let path = self.history_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HistoryLoad::Missing),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        match serde_json::from_slice::<Vec<Value>>(&bytes) {
            Ok(entries) => Ok(HistoryLoad::Parsed(entries)),
            Err(e) => Ok(HistoryLoad::Corrupt { path, reason: e.to_string() }),
        }
    }

    /// Current history of a server; absent and corrupt files both read as empty.
    pub fn read(&self, id: &ServerId) -> Result<Vec<Value>, StoreError> {
        let load = self.load(id)?;
        if let HistoryLoad::Corrupt { path, reason } = &load {
            warn!(
                path = %path.display(),
                %reason,
                "history file is corrupt, continuing with an empty history (it will be overwritten)"
            );
        }
        Ok(load.into_entries())
    }

    /// Appends one entry and returns the new number of entries for the server.
    pub fn append(&self, id: &ServerId, entry: &UpdateEntry) -> Result<usize, StoreError> {
        let value = serde_json::to_value(entry)?;

        let slot = self.locks.slot(id);
        let _held = slot.lock();

        let mut history = self.read(id)?;
        history.push(value);
        write_json_atomic(&self.history_path(id), &history)?;

        debug!(server_id = %id, count = history.len(), "history rewritten");
        Ok(history.len())
    }
}

/// True for the files the dashboard is allowed to merge (`*.json`).
pub fn is_history_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(crate::HISTORY_EXTENSION)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serializes `value` as pretty JSON next to `path`, then renames it into place.
///
/// On error the temporary file is removed and `path` keeps its previous content.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = tmp_path_for(path);

    let result = (|| {
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| StoreError::io(&tmp_path, e))?;
            file.write_all(&json).map_err(|e| StoreError::io(&tmp_path, e))?;
            file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
