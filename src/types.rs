//! Core data types used throughout the promptvault library
//!
//! This module contains the records stored in a library and the aggregate
//! [`DataSnapshot`] that is exported, imported and merged.
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Library records**: [`Prompt`], [`Skill`], [`Workflow`], [`Agent`]
//! - **Run history**: [`ExecutionRecord`]
//! - **Version history**: [`VersionSnapshot`]
//! - **Aggregates**: [`DataSnapshot`], [`CollectionKind`]
//!
//! Every record carries an immutable `id` (see [`Identified`]) that is the
//! key for merge-by-identity. Field names are camelCase on the wire and
//! timestamps are epoch milliseconds. Fields this build does not know about
//! are kept in each record's `extra` map, so a backup written by a newer
//! editor survives an import/export cycle untouched.
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::types::{DataSnapshot, Prompt};
//!
//! let mut snapshot = DataSnapshot::default();
//! snapshot.prompts.push(Prompt::new("Summarize", "Summarize {{text}} in three bullets"));
//! snapshot.folders.push("Writing".to_string());
//!
//! assert_eq!(snapshot.record_count(), 1);
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Unknown fields preserved verbatim across a round-trip
pub type ExtraFields = BTreeMap<String, Value>;

/// Current time truncated to the millisecond precision stored on disk
///
/// Records built from this value compare equal after an export/import
/// round-trip.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A record with a globally unique, immutable identifier
///
/// The identifier is the merge key used by [`crate::merge::merge_by_id`].
/// It is assigned at creation and only changes through an explicit
/// duplication.
pub trait Identified {
    /// Stable identifier of this record
    fn id(&self) -> &str;
}

macro_rules! impl_identified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identified for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

/// A reusable prompt, the document kind that carries a version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Unique identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Prompt body, may contain `{{variable}}` placeholders
    pub content: String,
    /// Optional longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category used by the category views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Folder name, one of [`DataSnapshot::folders`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Starred by the user
    #[serde(default)]
    pub is_favorite: bool,
    /// Version number the live content was last committed or restored as
    /// (0 while the document is still a draft)
    #[serde(default)]
    pub current_version: u32,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last edit time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Prompt {
    /// Create a new draft prompt with a fresh id
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            title: title.into(),
            content: content.into(),
            description: None,
            category: None,
            folder: None,
            tags: Vec::new(),
            is_favorite: false,
            current_version: 0,
            created_at: now,
            updated_at: now,
            extra: ExtraFields::new(),
        }
    }

    /// Copy this prompt under a new id
    ///
    /// The copy starts without version history.
    pub fn duplicate(&self) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            title: format!("{} (copy)", self.title),
            current_version: 0,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// A reusable skill definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Skill instructions
    pub content: String,
    /// Category used by the category views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last edit time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Skill {
    /// Create a new skill with a fresh id
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            content: content.into(),
            category: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: ExtraFields::new(),
        }
    }

    /// Copy this skill under a new id
    pub fn duplicate(&self) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: format!("{} (copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// One step of a [`Workflow`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Step identifier, unique within its workflow
    pub id: String,
    /// Display name
    pub name: String,
    /// Prompt executed by this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    /// Extra instructions for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// An ordered chain of prompt steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last edit time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Workflow {
    /// Create an empty workflow with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: ExtraFields::new(),
        }
    }

    /// Append a step that runs `prompt_id`
    pub fn add_step(&mut self, name: impl Into<String>, prompt_id: Option<String>) {
        self.steps.push(WorkflowStep {
            id: new_id(),
            name: name.into(),
            prompt_id,
            instructions: None,
        });
        self.updated_at = timestamp_now();
    }

    /// Copy this workflow under a new id
    pub fn duplicate(&self) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: format!("{} (copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// An agent persona built from a system prompt and skills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// System prompt
    pub system_prompt: String,
    /// Preferred model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Skills attached to this agent
    #[serde(default)]
    pub skill_ids: Vec<String>,
    /// Tool names the agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last edit time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Agent {
    /// Create a new agent with a fresh id
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            system_prompt: system_prompt.into(),
            model: None,
            skill_ids: Vec::new(),
            tools: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: ExtraFields::new(),
        }
    }

    /// Copy this agent under a new id
    pub fn duplicate(&self) -> Self {
        let now = timestamp_now();
        Self {
            id: new_id(),
            name: format!("{} (copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// One execution of a prompt, kept in the run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Unique identifier
    pub id: String,
    /// Prompt that was executed
    pub prompt_id: String,
    /// Prompt title at execution time
    pub prompt_title: String,
    /// Prompt content after variable substitution
    pub rendered_content: String,
    /// Variable values used for the run
    #[serde(default)]
    pub variable_values: BTreeMap<String, String>,
    /// Model output, if captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Execution time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub executed_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ExecutionRecord {
    /// Record a run of `prompt`
    pub fn new(
        prompt: &Prompt,
        rendered_content: impl Into<String>,
        variable_values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: new_id(),
            prompt_id: prompt.id.clone(),
            prompt_title: prompt.title.clone(),
            rendered_content: rendered_content.into(),
            variable_values,
            output: None,
            executed_at: timestamp_now(),
            extra: ExtraFields::new(),
        }
    }
}

/// Immutable content snapshot of one prompt version
///
/// Snapshots are created by [`crate::versions::VersionStore::commit_version`]
/// and never mutated afterwards. Restoring copies their fields onto the
/// live prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    /// Unique identifier
    pub id: String,
    /// Prompt this snapshot belongs to
    pub document_id: String,
    /// Version number within the document's lineage, 1 is the baseline
    pub parent_document_version: u32,
    /// Optional label such as "v2 - shorter"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Optional commit message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Frozen prompt content
    pub content: String,
    /// Prompt title at commit time
    pub title: String,
    /// Prompt category at commit time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Prompt folder at commit time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Variable values the user saved with the version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_values: Option<BTreeMap<String, String>>,
    /// Commit time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Fields written by other editors
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl VersionSnapshot {
    /// Version number of this snapshot
    pub fn version(&self) -> u32 {
        self.parent_document_version
    }

    /// Whether this is the undeletable baseline
    pub fn is_baseline(&self) -> bool {
        self.parent_document_version == 1
    }

    /// Get a short ID for display (first 8 characters)
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Format snapshot for display
    pub fn display_format(&self) -> String {
        format!(
            "[{}] v{} {}{}{}",
            self.short_id(),
            self.parent_document_version,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.version_name
                .as_ref()
                .map(|n| format!(" \"{}\"", n))
                .unwrap_or_default(),
            self.commit_message
                .as_ref()
                .map(|m| format!(" - {}", m))
                .unwrap_or_default()
        )
    }
}

/// First 8 characters of an id, cut on a char boundary
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

impl_identified!(Prompt, Skill, Workflow, Agent, ExecutionRecord, VersionSnapshot);

/// The whole library as one exportable value
///
/// Assembled on demand from the live state, serialized, and dropped.
/// Collections missing from an archive decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSnapshot {
    /// Prompts
    pub prompts: Vec<Prompt>,
    /// Folder names, unique by value
    pub folders: Vec<String>,
    /// Skills
    pub skills: Vec<Skill>,
    /// Workflows
    pub workflows: Vec<Workflow>,
    /// Agents
    pub agents: Vec<Agent>,
    /// Execution history
    pub history: Vec<ExecutionRecord>,
    /// Version snapshots of all prompts
    pub snapshots: Vec<VersionSnapshot>,
}

impl DataSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identity-bearing records across all six collections
    pub fn record_count(&self) -> usize {
        CollectionKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Number of records in one collection
    pub fn count(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Prompts => self.prompts.len(),
            CollectionKind::Skills => self.skills.len(),
            CollectionKind::Workflows => self.workflows.len(),
            CollectionKind::Agents => self.agents.len(),
            CollectionKind::History => self.history.len(),
            CollectionKind::Snapshots => self.snapshots.len(),
        }
    }

    /// Whether the snapshot holds no records and no folders
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0 && self.folders.is_empty()
    }

    /// Look up a prompt by id
    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }
}

/// The six identity-bearing collections of a [`DataSnapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// [`Prompt`] records
    Prompts,
    /// [`Skill`] records
    Skills,
    /// [`Workflow`] records
    Workflows,
    /// [`Agent`] records
    Agents,
    /// [`ExecutionRecord`] records
    History,
    /// [`VersionSnapshot`] records
    Snapshots,
}

impl CollectionKind {
    /// All collections in archive order
    pub const ALL: [CollectionKind; 6] = [
        CollectionKind::Prompts,
        CollectionKind::Skills,
        CollectionKind::Workflows,
        CollectionKind::Agents,
        CollectionKind::History,
        CollectionKind::Snapshots,
    ];

    /// Field name of the collection inside the archive's `data` object
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Prompts => "prompts",
            CollectionKind::Skills => "skills",
            CollectionKind::Workflows => "workflows",
            CollectionKind::Agents => "agents",
            CollectionKind::History => "history",
            CollectionKind::Snapshots => "snapshots",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
