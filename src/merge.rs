//! Merge-by-identity reconciliation of library snapshots
//!
//! Restoring a backup "in merge mode" never deletes anything. Each of the
//! six identity-bearing collections is reconciled independently by
//! [`merge_by_id`]; folder names, which carry no id, are combined by plain
//! set union.
//!
//! ## Algorithm
//!
//! For one collection:
//!
//! 1. Seed an ordered index from the local records, keeping local order
//! 2. Walk the incoming records in order
//!    - an id already seen earlier in the *incoming* list is skipped
//!      (first occurrence wins)
//!    - an id present locally is replaced wholesale by the incoming record
//!    - a new id is appended
//! 3. Local records missing from the incoming list are kept untouched
//!
//! The engine assumes its input already passed
//! [`crate::archive::import`]; it does no validation and cannot fail.
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::merge::merge_backup_data;
//! use promptvault::types::{DataSnapshot, Prompt};
//!
//! let mut local = DataSnapshot::default();
//! local.prompts.push(Prompt::new("Local", "a"));
//!
//! let mut incoming = DataSnapshot::default();
//! incoming.prompts.push(Prompt::new("Incoming", "b"));
//!
//! let (merged, report) = merge_backup_data(&local, &incoming);
//! assert_eq!(merged.prompts.len(), 2);
//! assert_eq!(report.prompts.added, 1);
//! assert_eq!(report.prompts.replaced, 0);
//! ```

use crate::types::{CollectionKind, DataSnapshot, Identified};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Result of merging one collection
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T> {
    /// Reconciled records, local order first, then new incoming records
    pub merged: Vec<T>,
    /// Incoming records whose id was new
    pub added: usize,
    /// Incoming records that overwrote a local record
    pub replaced: usize,
}

impl<T> MergeOutcome<T> {
    /// Change counts without the records
    pub fn changes(&self) -> CollectionChanges {
        CollectionChanges {
            added: self.added,
            replaced: self.replaced,
        }
    }
}

/// Merge two collections of identity-bearing records
///
/// Incoming records fully replace local records with the same id; ids
/// only present locally are kept. When the incoming list itself contains
/// an id more than once, only its first occurrence is used. This is a
/// deliberate policy for malformed backups: the later duplicates are
/// ignored rather than allowed to overwrite the first.
pub fn merge_by_id<T>(local: &[T], incoming: &[T]) -> MergeOutcome<T>
where
    T: Identified + Clone,
{
    let mut merged: Vec<T> = Vec::with_capacity(local.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(local.len() + incoming.len());

    for record in local {
        match index.get(record.id()) {
            // Local data should not hold duplicates; keep the last value
            // like a keyed map would, in the first position
            Some(&pos) => merged[pos] = record.clone(),
            None => {
                index.insert(record.id().to_string(), merged.len());
                merged.push(record.clone());
            }
        }
    }

    let mut consumed: HashSet<&str> = HashSet::with_capacity(incoming.len());
    let mut added = 0;
    let mut replaced = 0;

    for record in incoming {
        if !consumed.insert(record.id()) {
            continue;
        }

        match index.get(record.id()) {
            Some(&pos) => {
                merged[pos] = record.clone();
                replaced += 1;
            }
            None => {
                index.insert(record.id().to_string(), merged.len());
                merged.push(record.clone());
                added += 1;
            }
        }
    }

    MergeOutcome {
        merged,
        added,
        replaced,
    }
}

/// Union two folder lists by value
///
/// Returns the combined list, local order first, and how many names the
/// incoming list contributed.
pub fn merge_folders(local: &[String], incoming: &[String]) -> (Vec<String>, usize) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + incoming.len());
    let mut merged = Vec::with_capacity(local.len() + incoming.len());

    for name in local {
        if seen.insert(name.as_str()) {
            merged.push(name.clone());
        }
    }

    let before = merged.len();
    for name in incoming {
        if seen.insert(name.as_str()) {
            merged.push(name.clone());
        }
    }

    let added = merged.len() - before;
    (merged, added)
}

/// Added/replaced counts for one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChanges {
    /// Records with a new id
    pub added: usize,
    /// Records that overwrote an existing id
    pub replaced: usize,
}

impl CollectionChanges {
    /// Whether this collection would change at all
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.replaced > 0
    }
}

/// Change report of a whole-library merge
///
/// Surfaced to the user for confirmation before the merged state is
/// committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Prompt changes
    pub prompts: CollectionChanges,
    /// Skill changes
    pub skills: CollectionChanges,
    /// Workflow changes
    pub workflows: CollectionChanges,
    /// Agent changes
    pub agents: CollectionChanges,
    /// Execution history changes
    pub history: CollectionChanges,
    /// Version snapshot changes
    pub snapshots: CollectionChanges,
    /// Folder names that were not present locally
    pub folders_added: usize,
}

impl RestoreReport {
    /// Counts for one collection
    pub fn get(&self, kind: CollectionKind) -> CollectionChanges {
        match kind {
            CollectionKind::Prompts => self.prompts,
            CollectionKind::Skills => self.skills,
            CollectionKind::Workflows => self.workflows,
            CollectionKind::Agents => self.agents,
            CollectionKind::History => self.history,
            CollectionKind::Snapshots => self.snapshots,
        }
    }

    /// Records added across all collections
    pub fn total_added(&self) -> usize {
        CollectionKind::ALL.iter().map(|k| self.get(*k).added).sum()
    }

    /// Records replaced across all collections
    pub fn total_replaced(&self) -> usize {
        CollectionKind::ALL.iter().map(|k| self.get(*k).replaced).sum()
    }

    /// Whether the merge changes nothing
    pub fn is_empty(&self) -> bool {
        self.total_added() == 0 && self.total_replaced() == 0 && self.folders_added == 0
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in CollectionKind::ALL {
            let changes = self.get(kind);
            writeln!(
                f,
                "{:<10} {} added, {} replaced",
                kind.as_str(),
                changes.added,
                changes.replaced
            )?;
        }
        write!(f, "{:<10} {} added", "folders", self.folders_added)
    }
}

/// Merge an incoming snapshot into the current one
///
/// Runs [`merge_by_id`] once per identity-bearing collection and
/// [`merge_folders`] for the folder set. `current` is not modified; the
/// caller commits the returned snapshot as one unit.
pub fn merge_backup_data(current: &DataSnapshot, incoming: &DataSnapshot) -> (DataSnapshot, RestoreReport) {
    let prompts = merge_by_id(&current.prompts, &incoming.prompts);
    let skills = merge_by_id(&current.skills, &incoming.skills);
    let workflows = merge_by_id(&current.workflows, &incoming.workflows);
    let agents = merge_by_id(&current.agents, &incoming.agents);
    let history = merge_by_id(&current.history, &incoming.history);
    let snapshots = merge_by_id(&current.snapshots, &incoming.snapshots);
    let (folders, folders_added) = merge_folders(&current.folders, &incoming.folders);

    let report = RestoreReport {
        prompts: prompts.changes(),
        skills: skills.changes(),
        workflows: workflows.changes(),
        agents: agents.changes(),
        history: history.changes(),
        snapshots: snapshots.changes(),
        folders_added,
    };

    debug!(
        "Merged backup: {} added, {} replaced, {} new folders",
        report.total_added(),
        report.total_replaced(),
        report.folders_added
    );

    let merged = DataSnapshot {
        prompts: prompts.merged,
        folders,
        skills: skills.merged,
        workflows: workflows.merged,
        agents: agents.merged,
        history: history.merged,
        snapshots: snapshots.merged,
    };

    (merged, report)
}

/// Adopt an incoming snapshot wholesale, discarding local data
///
/// Equivalent to merging into an empty library, so every record counts as
/// added and duplicate incoming ids are still collapsed first-wins.
pub fn replace_all(incoming: &DataSnapshot) -> (DataSnapshot, RestoreReport) {
    merge_backup_data(&DataSnapshot::default(), incoming)
}
