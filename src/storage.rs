//! Media storage for finished recordings
//!
//! Recordings are written into a *pending* entry that consumers must ignore.
//! Once the encoder has finalized the container the pending flag is cleared
//! and the entry becomes visible as a complete video.

use crate::errors::CameraError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub const VIDEO_MIME_TYPE: &str = "video/mp4";
const PENDING_PREFIX: &str = ".pending-";

/// Metadata for a new media entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
}

impl MediaEntry {
    /// `<prefix>_<unix millis>.mp4` inside `relative_path`
    pub fn video(prefix: &str, relative_path: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            display_name: format!("{}_{}.mp4", prefix, created_at.timestamp_millis()),
            mime_type: VIDEO_MIME_TYPE.to_string(),
            relative_path: relative_path.to_string(),
        }
    }
}

/// Handle to an entry created by a [`MediaStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    pub id: Uuid,
    pub uri: String,
    pub display_name: String,
    pub relative_path: String,
    /// Final location on disk, for stores backed by the filesystem
    pub path: Option<PathBuf>,
}

/// Platform media index
pub trait MediaStore: Send + Sync {
    /// Create an entry that stays pending until [`MediaStore::set_pending`] clears it
    fn insert_pending(&self, entry: &MediaEntry) -> Result<OutputRef, CameraError>;

    /// Writable handle to the entry's content
    fn open_file(&self, output: &OutputRef) -> Result<File, CameraError>;

    fn set_pending(&self, output: &OutputRef, pending: bool) -> Result<(), CameraError>;

    fn is_pending(&self, output: &OutputRef) -> Result<bool, CameraError>;

    /// Remove an entry that will never be completed
    fn discard(&self, output: &OutputRef) -> Result<(), CameraError>;
}

/// Store that keeps entries in memory and remembers every pending-flag write
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_row: u64,
    entries: HashMap<Uuid, MemoryEntry>,
    fail_finalize: bool,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    output: OutputRef,
    mime_type: String,
    pending_history: Vec<bool>,
    discarded: bool,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make clearing the pending flag fail, as a full or revoked volume would
    pub fn set_fail_finalize(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_finalize = fail;
        }
    }

    /// Every value written to the entry's pending flag, starting with the insert
    pub fn pending_history(&self, output: &OutputRef) -> Vec<bool> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.entries.get(&output.id).map(|e| e.pending_history.clone()))
            .unwrap_or_default()
    }

    /// Entries that have not been discarded
    pub fn entries(&self) -> Vec<OutputRef> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let mut entries: Vec<OutputRef> = inner
            .entries
            .values()
            .filter(|e| !e.discarded)
            .map(|e| e.output.clone())
            .collect();
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));
        entries
    }

    /// Entries dropped after a failed or abandoned recording
    pub fn discarded(&self) -> Vec<OutputRef> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .entries
            .values()
            .filter(|e| e.discarded)
            .map(|e| e.output.clone())
            .collect()
    }

    pub fn is_discarded(&self, output: &OutputRef) -> bool {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.entries.get(&output.id).map(|e| e.discarded))
            .unwrap_or(false)
    }

    pub fn mime_type(&self, output: &OutputRef) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.entries.get(&output.id).map(|e| e.mime_type.clone()))
    }
}

fn poisoned() -> CameraError {
    CameraError::StorageError("media store lock poisoned".to_string())
}

fn unknown_entry(output: &OutputRef) -> CameraError {
    CameraError::StorageError(format!("unknown media entry {}", output.uri))
}

impl MediaStore for MemoryMediaStore {
    fn insert_pending(&self, entry: &MediaEntry) -> Result<OutputRef, CameraError> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner.next_row += 1;
        let output = OutputRef {
            id: Uuid::new_v4(),
            uri: format!("content://media/external/video/media/{}", inner.next_row),
            display_name: entry.display_name.clone(),
            relative_path: entry.relative_path.clone(),
            path: None,
        };
        inner.entries.insert(
            output.id,
            MemoryEntry {
                output: output.clone(),
                mime_type: entry.mime_type.clone(),
                pending_history: vec![true],
                discarded: false,
            },
        );
        Ok(output)
    }

    fn open_file(&self, output: &OutputRef) -> Result<File, CameraError> {
        Err(CameraError::StorageError(format!(
            "{} has no backing file",
            output.uri
        )))
    }

    fn set_pending(&self, output: &OutputRef, pending: bool) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        if !pending && inner.fail_finalize {
            return Err(CameraError::StorageError(format!(
                "could not publish {}",
                output.uri
            )));
        }
        let entry = inner
            .entries
            .get_mut(&output.id)
            .filter(|e| !e.discarded)
            .ok_or_else(|| unknown_entry(output))?;
        entry.pending_history.push(pending);
        Ok(())
    }

    fn is_pending(&self, output: &OutputRef) -> Result<bool, CameraError> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        inner
            .entries
            .get(&output.id)
            .and_then(|e| e.pending_history.last().copied())
            .ok_or_else(|| unknown_entry(output))
    }

    fn discard(&self, output: &OutputRef) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let entry = inner
            .entries
            .get_mut(&output.id)
            .ok_or_else(|| unknown_entry(output))?;
        entry.discarded = true;
        Ok(())
    }
}

/// Store writing into a directory tree.
///
/// Pending entries live under a hidden `.pending-<name>` file next to their
/// final location and are renamed into place when published.
#[derive(Debug)]
pub struct FsMediaStore {
    root: PathBuf,
    pending: Mutex<HashMap<Uuid, PathBuf>>,
}

impl FsMediaStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn final_path(output: &OutputRef) -> Result<&PathBuf, CameraError> {
        output
            .path
            .as_ref()
            .ok_or_else(|| CameraError::StorageError(format!("{} has no path", output.uri)))
    }

    fn pending_path(final_path: &Path) -> PathBuf {
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        final_path.with_file_name(format!("{}{}", PENDING_PREFIX, name))
    }

    /// First free name in `dir`, suffixing ` (n)` like media indexes do
    fn unique_path(dir: &Path, display_name: &str) -> PathBuf {
        let candidate = dir.join(display_name);
        if !candidate.exists() && !Self::pending_path(&candidate).exists() {
            return candidate;
        }
        let (stem, ext) = match display_name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
            None => (display_name.to_string(), String::new()),
        };
        let mut n = 1;
        loop {
            let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
            if !candidate.exists() && !Self::pending_path(&candidate).exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl MediaStore for FsMediaStore {
    fn insert_pending(&self, entry: &MediaEntry) -> Result<OutputRef, CameraError> {
        let dir = self.root.join(&entry.relative_path);
        fs::create_dir_all(&dir).map_err(|e| {
            CameraError::StorageError(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let final_path = Self::unique_path(&dir, &entry.display_name);
        let pending_path = Self::pending_path(&final_path);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pending_path)
            .map_err(|e| {
                CameraError::StorageError(format!(
                    "Failed to create {}: {}",
                    pending_path.display(),
                    e
                ))
            })?;

        let id = Uuid::new_v4();
        self.pending
            .lock()
            .map_err(|_| poisoned())?
            .insert(id, pending_path);

        log::debug!("Created pending media entry {}", final_path.display());
        Ok(OutputRef {
            id,
            uri: format!("file://{}", final_path.display()),
            display_name: final_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| entry.display_name.clone()),
            relative_path: entry.relative_path.clone(),
            path: Some(final_path),
        })
    }

    fn open_file(&self, output: &OutputRef) -> Result<File, CameraError> {
        let path = match self.pending.lock().map_err(|_| poisoned())?.get(&output.id) {
            Some(pending) => pending.clone(),
            None => Self::final_path(output)?.clone(),
        };
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| CameraError::StorageError(format!("Failed to open {}: {}", path.display(), e)))
    }

    fn set_pending(&self, output: &OutputRef, pending: bool) -> Result<(), CameraError> {
        let final_path = Self::final_path(output)?.clone();
        let mut table = self.pending.lock().map_err(|_| poisoned())?;
        let currently_pending = table.contains_key(&output.id);

        match (currently_pending, pending) {
            (true, false) => {
                let pending_path = table.remove(&output.id).unwrap_or_else(|| Self::pending_path(&final_path));
                fs::rename(&pending_path, &final_path).map_err(|e| {
                    table.insert(output.id, pending_path.clone());
                    CameraError::StorageError(format!(
                        "Failed to publish {}: {}",
                        final_path.display(),
                        e
                    ))
                })?;
                log::debug!("Published media entry {}", final_path.display());
            }
            (false, true) => {
                let pending_path = Self::pending_path(&final_path);
                fs::rename(&final_path, &pending_path).map_err(|e| {
                    CameraError::StorageError(format!(
                        "Failed to hide {}: {}",
                        final_path.display(),
                        e
                    ))
                })?;
                table.insert(output.id, pending_path);
            }
            _ => {}
        }
        Ok(())
    }

    fn is_pending(&self, output: &OutputRef) -> Result<bool, CameraError> {
        Ok(self
            .pending
            .lock()
            .map_err(|_| poisoned())?
            .contains_key(&output.id))
    }

    fn discard(&self, output: &OutputRef) -> Result<(), CameraError> {
        let path = match self.pending.lock().map_err(|_| poisoned())?.remove(&output.id) {
            Some(pending) => pending,
            None => Self::final_path(output)?.clone(),
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CameraError::StorageError(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
