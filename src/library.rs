//! The library coordinator
//!
//! [`Library`] owns the live data set and is the only thing that mutates
//! it. Backup restores and version operations run against the state it
//! holds and are committed back as a whole:
//!
//! - exports read a consistent [`DataSnapshot`] under a read lock
//! - imports authenticate the archive first, then compute the merge and
//!   swap the result in under one write lock, so no reader ever sees a
//!   half-merged library
//! - a failed import leaves the live state exactly as it was
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::{Library, Prompt};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Library::in_memory();
//! let prompt = Prompt::new("Explain", "Explain {{topic}} to a beginner");
//! library.upsert_prompt(prompt.clone())?;
//!
//! let v1 = library.commit_version(&prompt.id, None, Some("first draft".into()))?;
//! let backup = library.export_archive()?;
//!
//! let other = Library::in_memory();
//! let report = other.merge_archive(&backup)?;
//! assert_eq!(report.prompts.added, 1);
//! assert_eq!(other.list_versions(&prompt.id)[0].id, v1);
//! # Ok(())
//! # }
//! ```

use crate::archive::{self, ArchiveOptions, ArchiveSummary};
use crate::checksum::ChecksumAlgorithm;
use crate::error::{Result, VaultError};
use crate::merge::{self, RestoreReport};
use crate::storage::{self, LibraryFile, LibraryStorage};
use crate::types::{
    timestamp_now, Agent, DataSnapshot, ExecutionRecord, Identified, Prompt, Skill, VersionSnapshot,
    Workflow,
};
use crate::versions::{SnapshotId, VersionCommit, VersionComparison, VersionStore};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Settings of a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryConfig {
    /// How exported archives are written
    pub archive: ArchiveOptions,
    /// Persist after every mutating call
    pub autosave: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveOptions::default(),
            autosave: true,
        }
    }
}

/// Result of checking an archive against the live library
///
/// Nothing is committed; the confirmation layer shows `report` and then
/// calls [`Library::merge_archive`] or [`Library::replace_with_archive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPreview {
    /// What the archive contains
    pub summary: ArchiveSummary,
    /// Changes a merge would make
    pub merge_report: RestoreReport,
    /// Changes a replace-all would make
    pub replace_report: RestoreReport,
}

/// Live library state: every collection except snapshots, plus the
/// version store that owns the snapshots
#[derive(Debug, Clone, Default)]
struct LibraryState {
    data: DataSnapshot,
    versions: VersionStore,
}

impl LibraryState {
    fn from_snapshot(mut data: DataSnapshot) -> Self {
        let versions = VersionStore::from_snapshots(std::mem::take(&mut data.snapshots));
        Self { data, versions }
    }

    fn snapshot(&self) -> DataSnapshot {
        let mut data = self.data.clone();
        data.snapshots = self.versions.snapshots();
        data
    }

    fn prompt_mut(&mut self, id: &str) -> Result<&mut Prompt> {
        self.data
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| VaultError::DocumentNotFound(id.to_string()))
    }
}

/// Insert a record or replace the one with the same id
fn upsert<T: Identified>(records: &mut Vec<T>, record: T) -> bool {
    match records.iter().position(|r| r.id() == record.id()) {
        Some(pos) => {
            records[pos] = record;
            false
        }
        None => {
            records.push(record);
            true
        }
    }
}

/// Application-state handle for one prompt library
pub struct Library {
    /// Live state
    state: Arc<RwLock<LibraryState>>,
    /// Settings
    config: LibraryConfig,
    /// File backend, `None` for in-memory libraries
    storage: Option<LibraryStorage>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Library")
            .field("records", &(state.data.record_count() + state.versions.len()))
            .field("config", &self.config)
            .field("storage", &self.storage.as_ref().map(LibraryStorage::path))
            .finish()
    }
}

impl Library {
    /// Create an empty library that is never written to disk
    pub fn in_memory() -> Self {
        LibraryBuilder::new().autosave(false).in_memory()
    }

    /// Open the library stored at `path`, creating an empty one if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        LibraryBuilder::new().open(path)
    }

    /// Settings of this library
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Path of the library file, if persisted
    pub fn path(&self) -> Option<&Path> {
        self.storage.as_ref().map(LibraryStorage::path)
    }

    /// Consistent copy of the whole library
    pub fn snapshot(&self) -> DataSnapshot {
        self.state.read().snapshot()
    }

    /// Write the library file
    pub fn save(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => {
                let file = LibraryFile::new(self.config.clone(), self.snapshot());
                storage.save(&file)
            }
            None => Ok(()),
        }
    }

    fn autosave(&self) -> Result<()> {
        if self.config.autosave {
            self.save()?;
        }
        Ok(())
    }

    // ----- backup -----

    /// Export the whole library as archive text
    #[instrument(skip(self))]
    pub fn export_archive(&self) -> Result<String> {
        archive::export_archive_with(&self.snapshot(), &self.config.archive)
    }

    /// Export the whole library to an archive file
    pub fn write_archive(&self, path: &Path) -> Result<ArchiveSummary> {
        let text = self.export_archive()?;
        storage::atomic_write(path, text.as_bytes())?;
        info!("Wrote archive to {:?}", path);
        Ok(archive::inspect(text.as_bytes())?)
    }

    /// Authenticate an archive and report what merging or replacing would do
    pub fn preview_import(&self, text: &str) -> Result<ImportPreview> {
        let (summary, incoming) = archive::open(text.as_bytes())?;

        let current = self.snapshot();
        let (_, merge_report) = merge::merge_backup_data(&current, &incoming);
        let (_, replace_report) = merge::replace_all(&incoming);

        Ok(ImportPreview {
            summary,
            merge_report,
            replace_report,
        })
    }

    /// Authenticate an archive and merge it into the library
    ///
    /// # Errors
    ///
    /// Any [`crate::ImportError`]; the library is untouched in that case.
    #[instrument(skip(self, text))]
    pub fn merge_archive(&self, text: &str) -> Result<RestoreReport> {
        let incoming = archive::import_archive(text)?;
        let report = self.apply(|current| merge::merge_backup_data(current, &incoming));
        info!("Merged archive: {} added, {} replaced", report.total_added(), report.total_replaced());
        self.autosave()?;
        Ok(report)
    }

    /// Authenticate an archive and adopt it wholesale, discarding local data
    #[instrument(skip(self, text))]
    pub fn replace_with_archive(&self, text: &str) -> Result<RestoreReport> {
        let incoming = archive::import_archive(text)?;
        let report = self.apply(|_| merge::replace_all(&incoming));
        info!("Replaced library with archive: {} records", report.total_added());
        self.autosave()?;
        Ok(report)
    }

    /// Merge an already authenticated snapshot into the library
    pub fn merge_snapshot(&self, incoming: &DataSnapshot) -> Result<RestoreReport> {
        let report = self.apply(|current| merge::merge_backup_data(current, incoming));
        self.autosave()?;
        Ok(report)
    }

    /// Compute a new state from the current one and commit it atomically
    fn apply<F>(&self, compute: F) -> RestoreReport
    where
        F: FnOnce(&DataSnapshot) -> (DataSnapshot, RestoreReport),
    {
        let mut state = self.state.write();
        let (merged, report) = compute(&state.snapshot());
        *state = LibraryState::from_snapshot(merged);
        report
    }

    // ----- records -----

    /// All prompts
    pub fn prompts(&self) -> Vec<Prompt> {
        self.state.read().data.prompts.clone()
    }

    /// Look up a prompt
    pub fn prompt(&self, id: &str) -> Option<Prompt> {
        self.state.read().data.prompt(id).cloned()
    }

    /// Insert or replace a prompt; returns true if it was new
    pub fn upsert_prompt(&self, mut prompt: Prompt) -> Result<bool> {
        prompt.updated_at = timestamp_now();
        let inserted = {
            let mut state = self.state.write();
            if let Some(folder) = &prompt.folder {
                if !state.data.folders.contains(folder) {
                    state.data.folders.push(folder.clone());
                }
            }
            upsert(&mut state.data.prompts, prompt)
        };
        self.autosave()?;
        Ok(inserted)
    }

    /// Delete a prompt together with its version history
    pub fn delete_prompt(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let before = state.data.prompts.len();
            state.data.prompts.retain(|p| p.id != id);
            if state.data.prompts.len() == before {
                return Err(VaultError::DocumentNotFound(id.to_string()));
            }
            state.versions.remove_document(id);
        }
        debug!("Deleted prompt {}", id);
        self.autosave()
    }

    /// Insert or replace a skill
    pub fn upsert_skill(&self, skill: Skill) -> Result<bool> {
        let inserted = upsert(&mut self.state.write().data.skills, skill);
        self.autosave()?;
        Ok(inserted)
    }

    /// Insert or replace a workflow
    pub fn upsert_workflow(&self, workflow: Workflow) -> Result<bool> {
        let inserted = upsert(&mut self.state.write().data.workflows, workflow);
        self.autosave()?;
        Ok(inserted)
    }

    /// Insert or replace an agent
    pub fn upsert_agent(&self, agent: Agent) -> Result<bool> {
        let inserted = upsert(&mut self.state.write().data.agents, agent);
        self.autosave()?;
        Ok(inserted)
    }

    /// Append a run to the execution history
    pub fn record_execution(&self, record: ExecutionRecord) -> Result<()> {
        upsert(&mut self.state.write().data.history, record);
        self.autosave()
    }

    /// Add a folder name if not present
    pub fn add_folder(&self, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        let added = {
            let mut state = self.state.write();
            if state.data.folders.contains(&name) {
                false
            } else {
                state.data.folders.push(name);
                true
            }
        };
        self.autosave()?;
        Ok(added)
    }

    // ----- versions -----

    /// Snapshots of a prompt, ascending by version
    pub fn list_versions(&self, prompt_id: &str) -> Vec<VersionSnapshot> {
        self.state.read().versions.list_versions(prompt_id).to_vec()
    }

    /// Save the prompt's current content as a new version
    #[instrument(skip(self))]
    pub fn commit_version(&self, prompt_id: &str, name: Option<String>, message: Option<String>) -> Result<SnapshotId> {
        let snapshot_id = {
            let mut state = self.state.write();
            let doc = state
                .data
                .prompt(prompt_id)
                .cloned()
                .ok_or_else(|| VaultError::DocumentNotFound(prompt_id.to_string()))?;

            let mut commit = VersionCommit::from_document(&doc);
            commit.name = name;
            commit.message = message;
            let snapshot_id = state.versions.commit_version(&doc, commit)?;

            let version = state
                .versions
                .latest(prompt_id)
                .map(VersionSnapshot::version)
                .unwrap_or_default();
            state.prompt_mut(prompt_id)?.current_version = version;
            snapshot_id
        };
        self.autosave()?;
        Ok(snapshot_id)
    }

    /// Read a snapshot without changing anything
    pub fn select_version(&self, prompt_id: &str, snapshot_id: &str) -> Result<VersionSnapshot> {
        Ok(self.state.read().versions.select_version(prompt_id, snapshot_id)?.clone())
    }

    /// Compare a snapshot with the live prompt
    pub fn compare_version(&self, prompt_id: &str, snapshot_id: &str) -> Result<VersionComparison> {
        let state = self.state.read();
        let doc = state
            .data
            .prompt(prompt_id)
            .ok_or_else(|| VaultError::DocumentNotFound(prompt_id.to_string()))?;
        Ok(state.versions.compare(doc, snapshot_id)?)
    }

    /// Copy a snapshot onto the live prompt and return the new prompt
    #[instrument(skip(self))]
    pub fn restore_version(&self, prompt_id: &str, snapshot_id: &str) -> Result<Prompt> {
        let restored = {
            let mut state = self.state.write();
            let doc = state
                .data
                .prompt(prompt_id)
                .ok_or_else(|| VaultError::DocumentNotFound(prompt_id.to_string()))?;
            let restored = state.versions.restore_version(doc, snapshot_id)?;
            *state.prompt_mut(prompt_id)? = restored.clone();
            restored
        };
        self.autosave()?;
        Ok(restored)
    }

    /// Delete a non-baseline snapshot
    #[instrument(skip(self))]
    pub fn delete_version(&self, prompt_id: &str, snapshot_id: &str) -> Result<()> {
        self.state.write().versions.delete_version(prompt_id, snapshot_id)?;
        self.autosave()
    }
}

/// Builder for configuring a [`Library`]
///
/// Settings left unset fall back to the ones saved in the library file,
/// then to the defaults.
///
/// # Default Values
///
/// - `checksum_algorithm`: `ChecksumAlgorithm::Adler32`
/// - `pretty_archives`: true
/// - `autosave`: true
#[derive(Debug, Default)]
pub struct LibraryBuilder {
    checksum_algorithm: Option<ChecksumAlgorithm>,
    pretty_archives: Option<bool>,
    autosave: Option<bool>,
}

impl LibraryBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest algorithm used for exported archives
    pub fn checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = Some(algorithm);
        self
    }

    /// Indent exported archives
    pub fn pretty_archives(mut self, pretty: bool) -> Self {
        self.pretty_archives = Some(pretty);
        self
    }

    /// Persist after every mutating call
    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = Some(autosave);
        self
    }

    /// Apply the explicitly set options on top of `base`
    fn resolve(&self, mut base: LibraryConfig) -> LibraryConfig {
        if let Some(algorithm) = self.checksum_algorithm {
            base.archive.algorithm = algorithm;
        }
        if let Some(pretty) = self.pretty_archives {
            base.archive.pretty = pretty;
        }
        if let Some(autosave) = self.autosave {
            base.autosave = autosave;
        }
        base
    }

    /// Build an empty library without a file backend
    pub fn in_memory(self) -> Library {
        Library {
            state: Arc::new(RwLock::new(LibraryState::default())),
            config: self.resolve(LibraryConfig::default()),
            storage: None,
        }
    }

    /// Build a library backed by the file at `path`
    ///
    /// An existing file is loaded and its contents and saved settings
    /// adopted; options set on the builder take precedence over the saved
    /// ones. A missing file starts an empty library, written on the first
    /// save.
    pub fn open(self, path: impl Into<PathBuf>) -> Result<Library> {
        let storage = LibraryStorage::new(path);
        let (saved, data) = match storage.load()? {
            Some(file) => (file.config, file.data),
            None => {
                info!("Creating new library at {:?}", storage.path());
                (LibraryConfig::default(), DataSnapshot::default())
            }
        };

        Ok(Library {
            state: Arc::new(RwLock::new(LibraryState::from_snapshot(data))),
            config: self.resolve(saved),
            storage: Some(storage),
        })
    }
}
