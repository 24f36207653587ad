//! Per-document version history
//!
//! Every prompt owns a linear lineage of immutable [`VersionSnapshot`]s.
//! The first snapshot committed for a prompt is version 1, the baseline,
//! and can never be deleted. Later commits get the next version number
//! after the highest one still present.
//!
//! ## Lineage States
//!
//! ```text
//! Draft ──commit──▶ Versioned ──commit──▶ Versioned
//!                     │  ▲
//!                     └──┘ restore / select / delete (v > 1)
//! ```
//!
//! - `commit_version` appends a snapshot and never touches older ones
//! - `select_version` is a pure read used for preview and comparison
//! - `restore_version` copies a snapshot onto the live prompt and returns
//!   the new prompt state, without creating a snapshot
//! - `delete_version` removes a non-baseline snapshot
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::types::Prompt;
//! use promptvault::versions::{VersionCommit, VersionStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = VersionStore::new();
//! let mut prompt = Prompt::new("Greeting", "Say hello");
//!
//! let v1 = store.commit_version(&prompt, VersionCommit::from_document(&prompt))?;
//! prompt.content = "Say hello politely".to_string();
//! store.commit_version(&prompt, VersionCommit::from_document(&prompt).named("polite"))?;
//!
//! let restored = store.restore_version(&prompt, &v1)?;
//! assert_eq!(restored.content, "Say hello");
//! assert_eq!(restored.current_version, 1);
//! # Ok(())
//! # }
//! ```

use crate::diff::{self, DiffSpan, DiffStats};
use crate::error::{Result, VaultError, VersionError};
use crate::types::{timestamp_now, ExtraFields, Prompt, VersionSnapshot};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Identifier of a [`VersionSnapshot`]
pub type SnapshotId = String;

/// Whether a document has any history yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageState {
    /// No snapshot committed
    Draft,
    /// At least the baseline exists
    Versioned,
}

/// Document fields frozen into a snapshot besides its content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Prompt title
    pub title: String,
    /// Prompt category
    pub category: Option<String>,
    /// Prompt folder
    pub folder: Option<String>,
    /// Variable values to remember with this version
    pub variable_values: Option<BTreeMap<String, String>>,
}

/// Input of a "save as new version" action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCommit {
    /// Content to freeze
    pub content: String,
    /// Accompanying document fields
    pub metadata: SnapshotMetadata,
    /// Optional version label
    pub name: Option<String>,
    /// Optional commit message
    pub message: Option<String>,
}

impl VersionCommit {
    /// Capture the current state of a prompt
    pub fn from_document(doc: &Prompt) -> Self {
        Self {
            content: doc.content.clone(),
            metadata: SnapshotMetadata {
                title: doc.title.clone(),
                category: doc.category.clone(),
                folder: doc.folder.clone(),
                variable_values: None,
            },
            name: None,
            message: None,
        }
    }

    /// Set the version label
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Remember variable values with this version
    pub fn variable_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.metadata.variable_values = Some(values);
        self
    }
}

/// Snapshot compared against the live document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionComparison {
    /// Snapshot being compared
    pub snapshot_id: SnapshotId,
    /// Version number of that snapshot
    pub version: u32,
    /// Word diff from the snapshot to the live content
    pub spans: Vec<DiffSpan>,
    /// Word counts of the diff
    pub stats: DiffStats,
    /// Whether restoring would change the live content
    pub has_changes: bool,
}

/// Linear history of one document
///
/// Snapshots are kept sorted by version number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionLineage {
    /// Document this lineage belongs to
    pub document_id: String,
    /// Snapshots, ascending by version
    pub snapshots: Vec<VersionSnapshot>,
}

impl VersionLineage {
    /// Create an empty lineage
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            snapshots: Vec::new(),
        }
    }

    /// Current lineage state
    pub fn state(&self) -> LineageState {
        if self.snapshots.is_empty() {
            LineageState::Draft
        } else {
            LineageState::Versioned
        }
    }

    /// Highest version number present, 0 for a draft
    pub fn max_version(&self) -> u32 {
        self.snapshots
            .iter()
            .map(VersionSnapshot::version)
            .max()
            .unwrap_or(0)
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<&VersionSnapshot> {
        self.snapshots.last()
    }

    /// Look up a snapshot by id
    pub fn get(&self, snapshot_id: &str) -> Option<&VersionSnapshot> {
        self.snapshots.iter().find(|s| s.id == snapshot_id)
    }

    fn not_found(&self, snapshot_id: &str) -> VersionError {
        VersionError::NotFound {
            document_id: self.document_id.clone(),
            snapshot_id: snapshot_id.to_string(),
        }
    }
}

/// Version snapshots of every document in a library
///
/// The store is built from the library's flat `snapshots` collection and
/// flattened back into it with [`VersionStore::snapshots`].
#[derive(Debug, Clone, Default)]
pub struct VersionStore {
    lineages: HashMap<String, VersionLineage>,
}

impl VersionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Group a flat list of snapshots into lineages
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = VersionSnapshot>) -> Self {
        let mut lineages: HashMap<String, VersionLineage> = HashMap::new();

        for snapshot in snapshots {
            lineages
                .entry(snapshot.document_id.clone())
                .or_insert_with(|| VersionLineage::new(snapshot.document_id.clone()))
                .snapshots
                .push(snapshot);
        }

        for lineage in lineages.values_mut() {
            lineage.snapshots.sort_by_key(VersionSnapshot::version);
        }

        Self { lineages }
    }

    /// All snapshots, grouped by document id, ascending by version
    pub fn snapshots(&self) -> Vec<VersionSnapshot> {
        let mut ids: Vec<&String> = self.lineages.keys().collect();
        ids.sort();
        ids.into_iter()
            .flat_map(|id| self.lineages[id].snapshots.iter().cloned())
            .collect()
    }

    /// Number of snapshots across all lineages
    pub fn len(&self) -> usize {
        self.lineages.values().map(|l| l.snapshots.len()).sum()
    }

    /// Whether no snapshot exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lineage of a document, if it has any history
    pub fn lineage(&self, document_id: &str) -> Option<&VersionLineage> {
        self.lineages.get(document_id)
    }

    /// Lineage state of a document
    pub fn state(&self, document_id: &str) -> LineageState {
        self.lineage(document_id)
            .map(VersionLineage::state)
            .unwrap_or(LineageState::Draft)
    }

    /// Snapshots of a document, ascending by version
    pub fn list_versions(&self, document_id: &str) -> &[VersionSnapshot] {
        self.lineage(document_id)
            .map(|l| l.snapshots.as_slice())
            .unwrap_or(&[])
    }

    /// Most recent snapshot of a document
    pub fn latest(&self, document_id: &str) -> Option<&VersionSnapshot> {
        self.lineage(document_id).and_then(VersionLineage::latest)
    }

    /// Append a new immutable snapshot for `doc`
    ///
    /// The version number is one above the highest version present, so
    /// the first commit of a draft document becomes the baseline.
    pub fn commit_version(&mut self, doc: &Prompt, commit: VersionCommit) -> Result<SnapshotId> {
        let lineage = self
            .lineages
            .entry(doc.id.clone())
            .or_insert_with(|| VersionLineage::new(doc.id.clone()));

        let version = lineage
            .max_version()
            .checked_add(1)
            .ok_or_else(|| VaultError::internal("version number overflow"))?;

        let snapshot = VersionSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            parent_document_version: version,
            version_name: commit.name,
            commit_message: commit.message,
            content: commit.content,
            title: commit.metadata.title,
            category: commit.metadata.category,
            folder: commit.metadata.folder,
            variable_values: commit.metadata.variable_values,
            created_at: timestamp_now(),
            extra: ExtraFields::new(),
        };
        let snapshot_id = snapshot.id.clone();

        lineage.snapshots.push(snapshot);
        info!("Committed version {} of document {}", version, doc.id);
        Ok(snapshot_id)
    }

    /// Read a snapshot for preview or comparison
    ///
    /// Has no effect on stored data.
    pub fn select_version(&self, document_id: &str, snapshot_id: &str) -> std::result::Result<&VersionSnapshot, VersionError> {
        match self.lineage(document_id) {
            Some(lineage) => lineage.get(snapshot_id).ok_or_else(|| lineage.not_found(snapshot_id)),
            None => Err(VersionError::NotFound {
                document_id: document_id.to_string(),
                snapshot_id: snapshot_id.to_string(),
            }),
        }
    }

    /// Copy a snapshot onto the live document
    ///
    /// Returns the new live state: content, title, category and folder come
    /// from the snapshot and `current_version` is set to its number. No
    /// snapshot is created and timestamps are left alone, so restoring the
    /// same snapshot twice yields the same document.
    pub fn restore_version(&self, doc: &Prompt, snapshot_id: &str) -> std::result::Result<Prompt, VersionError> {
        let snapshot = self.select_version(&doc.id, snapshot_id)?;

        let mut restored = doc.clone();
        restored.content = snapshot.content.clone();
        restored.title = snapshot.title.clone();
        restored.category = snapshot.category.clone();
        restored.folder = snapshot.folder.clone();
        restored.current_version = snapshot.parent_document_version;

        debug!(
            "Restored document {} to version {}",
            doc.id, snapshot.parent_document_version
        );
        Ok(restored)
    }

    /// Delete a non-baseline snapshot
    ///
    /// # Errors
    ///
    /// - [`VersionError::BaselineImmutable`] for version 1
    /// - [`VersionError::NotFound`] if the snapshot is not in this lineage
    pub fn delete_version(&mut self, document_id: &str, snapshot_id: &str) -> std::result::Result<(), VersionError> {
        let lineage = self.lineages.get_mut(document_id).ok_or_else(|| VersionError::NotFound {
            document_id: document_id.to_string(),
            snapshot_id: snapshot_id.to_string(),
        })?;

        let pos = lineage
            .snapshots
            .iter()
            .position(|s| s.id == snapshot_id)
            .ok_or_else(|| lineage.not_found(snapshot_id))?;

        if lineage.snapshots[pos].is_baseline() {
            return Err(VersionError::BaselineImmutable {
                snapshot_id: snapshot_id.to_string(),
            });
        }

        let removed = lineage.snapshots.remove(pos);
        debug!(
            "Deleted version {} of document {}",
            removed.parent_document_version, document_id
        );
        Ok(())
    }

    /// Compare a snapshot with the live document
    pub fn compare(&self, doc: &Prompt, snapshot_id: &str) -> std::result::Result<VersionComparison, VersionError> {
        let snapshot = self.select_version(&doc.id, snapshot_id)?;
        let spans = diff::diff(&snapshot.content, &doc.content);

        Ok(VersionComparison {
            snapshot_id: snapshot.id.clone(),
            version: snapshot.parent_document_version,
            stats: diff::stats(&spans),
            has_changes: diff::has_changes(&spans),
            spans,
        })
    }

    /// Drop the whole lineage of a deleted document
    pub fn remove_document(&mut self, document_id: &str) -> Option<VersionLineage> {
        self.lineages.remove(document_id)
    }
}
