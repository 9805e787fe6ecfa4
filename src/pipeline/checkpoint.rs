//! Durable translation state: the checkpoint, its progress view, and the
//! partial output document.
//!
//! On disk:
//!
//! ```text
//! .checkpoint.json   {"chunks": {"0": "...", "1": "..."}, "last_chunk": 1}
//! progress.json      {"done": 2, "total": 14}
//! ```
//!
//! The checkpoint is the only authority on completed work. It is written
//! atomically (temp file in the same directory, fsync, rename), so a crash
//! leaves either the previous or the new state, never a torn file.
//! `progress.json` is a convenience view for external observers and is never
//! read back.

use crate::error::TranslateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator between chunk translations in the assembled document.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Default checkpoint file name inside the output directory.
pub const CHECKPOINT_FILE: &str = ".checkpoint.json";

/// Progress file name, written beside the checkpoint.
pub const PROGRESS_FILE: &str = "progress.json";

// ── State ────────────────────────────────────────────────────────────────

/// Completed chunk translations, keyed by chunk index.
///
/// Keys are always exactly `0..=last_chunk`; `last_chunk == -1` means
/// nothing has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub chunks: BTreeMap<usize, String>,
    pub last_chunk: i64,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            chunks: BTreeMap::new(),
            last_chunk: -1,
        }
    }
}

impl CheckpointState {
    /// Index of the first chunk still to translate.
    pub fn next_index(&self) -> usize {
        (self.last_chunk + 1).max(0) as usize
    }

    /// Number of completed chunks.
    pub fn completed(&self) -> usize {
        self.next_index()
    }

    /// Record the translation of chunk `index`, which must be the next one.
    pub fn record(&mut self, index: usize, text: impl Into<String>) -> Result<(), TranslateError> {
        let expected = self.next_index();
        if index != expected {
            return Err(TranslateError::CheckpointOrder { expected, got: index });
        }
        self.chunks.insert(index, text.into());
        self.last_chunk = index as i64;
        Ok(())
    }

    /// Translation of the most recently completed chunk, or `""`.
    pub fn last_text(&self) -> &str {
        usize::try_from(self.last_chunk)
            .ok()
            .and_then(|i| self.chunks.get(&i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Reduce to the longest gap-free prefix `0..k` that fits within
    /// `chunk_count`. Returns `true` if anything was dropped.
    pub fn repair(&mut self, chunk_count: usize) -> bool {
        let claimed = self.next_index();
        let mut prefix = 0;
        while prefix < chunk_count && prefix < claimed && self.chunks.contains_key(&prefix) {
            prefix += 1;
        }
        let before = self.chunks.len();
        self.chunks.retain(|&k, _| k < prefix);
        let changed = self.chunks.len() != before || prefix != claimed;
        self.last_chunk = prefix as i64 - 1;
        changed
    }

    /// The derived progress view for `total` chunks.
    pub fn progress(&self, total: usize) -> ProgressState {
        ProgressState {
            done: self.completed(),
            total,
        }
    }

    /// All completed translations joined in index order. Empty results are
    /// skipped so they leave no dangling separator.
    pub fn document(&self) -> String {
        self.chunks
            .values()
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR)
    }
}

/// Progress as seen by external observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub done: usize,
    pub total: usize,
}

// ── Store ────────────────────────────────────────────────────────────────

/// Reads and writes the checkpoint and progress files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    progress_path: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at an explicit checkpoint file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let progress_path = path
            .parent()
            .map(|p| p.join(PROGRESS_FILE))
            .unwrap_or_else(|| PathBuf::from(PROGRESS_FILE));
        Self { path, progress_path }
    }

    /// Store at the default location inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Load the checkpoint for a run of `chunk_count` chunks.
    ///
    /// A missing file is an empty state. An unreadable or unparsable file is
    /// logged and also treated as empty; nothing in it is trusted.
    pub fn load(&self, chunk_count: usize) -> CheckpointState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CheckpointState::default(),
            Err(e) => {
                warn!("Cannot read checkpoint {}: {e}; starting fresh", self.path.display());
                return CheckpointState::default();
            }
        };

        let mut state: CheckpointState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Checkpoint {} is not valid: {e}; starting fresh", self.path.display());
                return CheckpointState::default();
            }
        };

        let claimed = state.next_index();
        if state.repair(chunk_count) {
            warn!(
                "Checkpoint {} claimed {} chunks; kept the first {} contiguous",
                self.path.display(),
                claimed,
                state.completed()
            );
        }
        debug!("Loaded checkpoint with {} completed chunks", state.completed());
        state
    }

    /// Delete the checkpoint and progress files, if present.
    pub fn clear(&self) -> Result<(), TranslateError> {
        for path in [&self.path, &self.progress_path] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(TranslateError::CheckpointWriteFailed {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    /// Persist `state` atomically, then rewrite the progress view.
    pub fn save(&self, state: &CheckpointState, total: usize) -> Result<(), TranslateError> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| TranslateError::CheckpointWriteFailed {
            path: self.path.clone(),
            source: e.into(),
        })?;
        write_atomic(&self.path, &json)?;

        let progress = serde_json::to_vec(&state.progress(total)).map_err(|e| {
            TranslateError::CheckpointWriteFailed {
                path: self.progress_path.clone(),
                source: e.into(),
            }
        })?;
        write_atomic(&self.progress_path, &progress)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TranslateError> {
    let fail = |source: std::io::Error| TranslateError::CheckpointWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// Write `text` to `path`, flushed and synced to disk before returning.
pub fn write_document(path: &Path, text: &str) -> Result<(), TranslateError> {
    let fail = |source: std::io::Error| TranslateError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    let mut file = File::create(path).map_err(fail)?;
    file.write_all(text.as_bytes()).map_err(fail)?;
    file.flush().map_err(fail)?;
    file.sync_all().map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(entries: &[(usize, &str)], last: i64) -> CheckpointState {
        CheckpointState {
            chunks: entries.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            last_chunk: last,
        }
    }

    #[test]
    fn record_enforces_order() {
        let mut s = CheckpointState::default();
        s.record(0, "A").unwrap();
        s.record(1, "B").unwrap();
        assert!(matches!(
            s.record(3, "D"),
            Err(TranslateError::CheckpointOrder { expected: 2, got: 3 })
        ));
        assert!(s.record(1, "B again").is_err());
        assert_eq!(s.last_chunk, 1);
        assert_eq!(s.last_text(), "B");
    }

    #[test]
    fn document_joins_and_skips_empty() {
        let s = state(&[(0, "A"), (1, ""), (2, "C")], 2);
        assert_eq!(s.document(), "A\n\n---\n\nC");
        assert_eq!(CheckpointState::default().document(), "");
    }

    #[test]
    fn repair_keeps_gap_free_prefix() {
        let mut s = state(&[(0, "A"), (1, "B"), (3, "D")], 3);
        assert!(s.repair(10));
        assert_eq!(s, state(&[(0, "A"), (1, "B")], 1));

        let mut s = state(&[(0, "A"), (1, "B"), (2, "C")], 2);
        assert!(s.repair(2));
        assert_eq!(s.last_chunk, 1);

        let mut s = state(&[(0, "A")], 0);
        assert!(!s.repair(5));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::in_dir(dir.path());
        let s = state(&[(0, "A"), (1, "Б")], 1);
        store.save(&s, 3).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["chunks"]["1"], "Б");
        assert_eq!(json["last_chunk"], 1);

        let progress: ProgressState =
            serde_json::from_str(&std::fs::read_to_string(store.progress_path()).unwrap()).unwrap();
        assert_eq!(progress, ProgressState { done: 2, total: 3 });

        assert_eq!(store.load(3), s);
    }

    #[test]
    fn corrupt_or_missing_checkpoint_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::in_dir(dir.path());
        assert_eq!(store.load(4), CheckpointState::default());

        std::fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(4), CheckpointState::default());
    }

    #[test]
    fn clear_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("run").join("cp.json"));
        store.save(&state(&[(0, "A")], 0), 1).unwrap();
        assert!(store.progress_path().ends_with("run/progress.json"));
        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(!store.progress_path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn write_document_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        write_document(&path, "first, longer text").unwrap();
        write_document(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
