//! Atomic file storage for progress records.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tracing::{debug, warn};

use super::{ProgressRecord, StatusSummary, METADATA_DIR, PROGRESS_RECORD_VERSION};
use crate::error::{ForemanError, Result};
use crate::plan::PlanDocument;

const PROGRESS_FILE: &str = "progress.json";
const PLAN_FILE: &str = "plan.json";
const ARCHITECTURE_FILE: &str = "architecture.json";
const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

/// Progress store for one project.
///
/// Writes go to a temporary file that is synced and then renamed over the
/// record, so readers see either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    /// Store rooted at `<project_dir>/.foreman`.
    #[must_use]
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self::in_dir(project_dir.as_ref().join(METADATA_DIR))
    }

    /// Store rooted at an explicit metadata directory.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE)
    }

    #[must_use]
    pub fn plan_path(&self) -> PathBuf {
        self.dir.join(PLAN_FILE)
    }

    #[must_use]
    pub fn architecture_path(&self) -> PathBuf {
        self.dir.join(ARCHITECTURE_FILE)
    }

    fn tmp_path(&self, file: &str) -> PathBuf {
        self.dir.join(format!("{file}{TMP_SUFFIX}"))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{PROGRESS_FILE}{LOCK_SUFFIX}"))
    }

    /// Overwrite the project's record with a freshly stamped copy of
    /// `record`, returning the copy that was written.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the record could not be
    /// written. The previous record, if any, is left intact.
    pub fn save(&self, record: &ProgressRecord) -> Result<ProgressRecord> {
        let mut stamped = record.clone();
        stamped.version = PROGRESS_RECORD_VERSION;
        stamped.last_updated = Utc::now();

        let json = serde_json::to_vec_pretty(&stamped)
            .map_err(|e| ForemanError::persistence(self.record_path(), e.to_string()))?;

        let lock = self.acquire_lock(true)?;
        let result = self.write_atomic(PROGRESS_FILE, &json);
        let _ = FileExt::unlock(&lock);
        result?;

        debug!(
            iteration = stamped.iteration,
            path = %self.record_path().display(),
            "progress saved"
        );
        Ok(stamped)
    }

    /// Load the last saved record.
    ///
    /// Returns `Ok(None)` if the project has never run, or if the record was
    /// written by an incompatible version.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the record exists but cannot
    /// be read or parsed.
    pub fn load(&self) -> Result<Option<ProgressRecord>> {
        let path = self.record_path();
        if !path.exists() {
            return Ok(None);
        }

        let _lock = if self.lock_path().exists() {
            Some(self.acquire_lock(false)?)
        } else {
            None
        };

        let contents = match fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ForemanError::persistence(&path, e.to_string())),
        };

        let record: ProgressRecord = serde_json::from_slice(&contents)
            .map_err(|e| ForemanError::persistence(&path, format!("corrupted record: {e}")))?;

        if !record.is_version_compatible() {
            warn!(
                "Ignoring progress record version {} (supported: {})",
                record.version, PROGRESS_RECORD_VERSION
            );
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Delete the record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the file could not be removed.
    pub fn delete(&self) -> Result<bool> {
        let path = self.record_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                let _ = fs::remove_file(self.lock_path());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ForemanError::persistence(path, e.to_string())),
        }
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.record_path().exists()
    }

    /// Status derived from the stored record.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ProgressStore::load`].
    pub fn status_summary(&self) -> Result<StatusSummary> {
        Ok(self
            .load()?
            .map_or_else(StatusSummary::not_started, |record| record.summary()))
    }

    /// Copy the plan into the metadata directory.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the write fails.
    pub fn save_plan(&self, plan: &PlanDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(plan)
            .map_err(|e| ForemanError::persistence(self.plan_path(), e.to_string()))?;
        self.write_atomic(PLAN_FILE, &json)
    }

    /// Load the plan copied by the last run, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the file exists but cannot
    /// be parsed.
    pub fn load_plan(&self) -> Result<Option<PlanDocument>> {
        self.read_json(&self.plan_path())
    }

    /// Store the architecture document handed to the executor.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the write fails.
    pub fn save_architecture(&self, architecture: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_vec_pretty(architecture)
            .map_err(|e| ForemanError::persistence(self.architecture_path(), e.to_string()))?;
        self.write_atomic(ARCHITECTURE_FILE, &json)
    }

    /// Load the stored architecture document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Persistence`] if the file exists but cannot
    /// be parsed.
    pub fn load_architecture(&self) -> Result<Option<serde_json::Value>> {
        self.read_json(&self.architecture_path())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ForemanError::persistence(path, e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ForemanError::persistence(path, e.to_string())),
        }
    }

    fn acquire_lock(&self, exclusive: bool) -> Result<File> {
        let path = self.lock_path();
        let to_err = |e: std::io::Error| ForemanError::persistence(&path, e.to_string());

        fs::create_dir_all(&self.dir).map_err(to_err)?;
        let file = if exclusive {
            File::create(&path).map_err(to_err)?
        } else {
            File::open(&path).map_err(to_err)?
        };

        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| {
            ForemanError::persistence(&path, format!("failed to acquire progress lock: {e}"))
        })?;
        Ok(file)
    }

    fn write_atomic(&self, file: &str, bytes: &[u8]) -> Result<()> {
        let target = self.dir.join(file);
        let tmp_path = self.tmp_path(file);
        let to_err = |e: std::io::Error| ForemanError::persistence(&target, e.to_string());

        fs::create_dir_all(&self.dir).map_err(to_err)?;
        let mut tmp = File::create(&tmp_path).map_err(to_err)?;
        tmp.write_all(bytes).map_err(to_err)?;
        tmp.sync_all().map_err(to_err)?;
        drop(tmp);

        fs::rename(&tmp_path, &target).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            to_err(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ArtifactMap;
    use crate::progress::ProjectStatus;
    use crate::tracker::CompletionTracker;
    use tempfile::TempDir;

    fn test_store() -> (ProgressStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = ProgressStore::new(temp_dir.path());
        (store, temp_dir)
    }

    fn record(iteration: u32) -> ProgressRecord {
        let tracker: CompletionTracker =
            serde_json::from_value(serde_json::json!({"core": true, "api": false})).unwrap();
        let artifacts: ArtifactMap = [("src/lib.rs", "pub fn core() {}")].into_iter().collect();
        ProgressRecord::new("run-1", "abc123", iteration, tracker, artifacts)
    }

    #[test]
    fn test_load_returns_none_when_never_run() {
        let (store, _dir) = test_store();
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_save_and_load() {
        let (store, _dir) = test_store();
        let written = store.save(&record(3)).unwrap();

        let loaded = store.load().unwrap().expect("record should exist");
        assert_eq!(loaded, written);
        assert_eq!(loaded.iteration, 3);
        assert!(loaded.completion_status.is_complete("core"));
        assert!(!loaded.completion_status.is_complete("api"));
        assert_eq!(loaded.artifact_mapping.get("src/lib.rs"), Some("pub fn core() {}"));
    }

    #[test]
    fn test_save_stamps_fresh_timestamp() {
        let (store, _dir) = test_store();
        let mut stale = record(1);
        stale.last_updated = "2000-01-01T00:00:00Z".parse().unwrap();
        let written = store.save(&stale).unwrap();
        assert!(written.last_updated > stale.last_updated);
    }

    #[test]
    fn test_save_overwrites_single_record() {
        let (store, _dir) = test_store();
        store.save(&record(1)).unwrap();
        store.save(&record(2)).unwrap();
        assert_eq!(store.load().unwrap().unwrap().iteration, 2);

        let files: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(PROGRESS_FILE))
            .collect();
        assert!(files.contains(&PROGRESS_FILE.to_string()));
        assert!(!files.iter().any(|f| f.ends_with(TMP_SUFFIX)));
    }

    #[test]
    fn test_corrupted_record_is_surfaced() {
        let (store, _dir) = test_store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.record_path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, ForemanError::Persistence { .. }));
        // The file is left for inspection.
        assert!(store.exists());
    }

    #[test]
    fn test_incompatible_version_is_ignored() {
        let (store, _dir) = test_store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.record_path(),
            r#"{"version": 99, "iteration": 1, "completion_status": {},
                "last_updated": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_into_unwritable_location_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let store = ProgressStore::in_dir(blocker.join(".foreman"));

        let err = store.save(&record(1)).unwrap_err();
        assert!(matches!(err, ForemanError::Persistence { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_status_summary() {
        let (store, _dir) = test_store();
        assert_eq!(
            store.status_summary().unwrap().status,
            ProjectStatus::NotStarted
        );

        store.save(&record(5)).unwrap();
        let summary = store.status_summary().unwrap();
        assert_eq!(summary.status, ProjectStatus::InProgress);
        assert_eq!(summary.completion_percentage, Some(50.0));
        assert_eq!(summary.iteration, Some(5));
        assert!(summary.last_updated.is_some());
    }

    #[test]
    fn test_delete() {
        let (store, _dir) = test_store();
        assert!(!store.delete().unwrap());
        store.save(&record(1)).unwrap();
        assert!(store.delete().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_plan_and_architecture_copies() {
        let (store, _dir) = test_store();
        assert!(store.load_architecture().unwrap().is_none());

        let plan = PlanDocument {
            name: Some("demo".into()),
            ..PlanDocument::default()
        };
        store.save_plan(&plan).unwrap();
        assert_eq!(store.load_plan().unwrap(), Some(plan));

        let arch = serde_json::json!({"layers": ["api", "db"]});
        store.save_architecture(&arch).unwrap();
        assert_eq!(store.load_architecture().unwrap(), Some(arch));
    }
}
