//! # promptvault - Backups and version history for a prompt library
//!
//! The storage engine behind a local-first library of reusable text
//! artifacts: prompts, skills, workflows and agents, plus their execution
//! history and per-prompt version snapshots.
//!
//! ## Overview
//!
//! promptvault is responsible for the parts of the library where data can be
//! lost:
//! - Exporting the whole library into a tamper-detectable archive
//! - Authenticating an archive before anything from it is trusted
//! - Merging a backup into the live library by record identity, never
//!   deleting local data and never producing duplicate ids
//! - Keeping a linear, restorable version history for every prompt
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use promptvault::{Library, Prompt};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Library::open("./library.json")?;
//!
//! let prompt = Prompt::new("Code review", "Review this diff for bugs:\n{{diff}}");
//! library.upsert_prompt(prompt.clone())?;
//! library.commit_version(&prompt.id, Some("baseline".into()), None)?;
//!
//! // Back up
//! library.write_archive(Path::new("./backup.json"))?;
//!
//! // Restore a backup on another machine
//! let other = Library::open("./other-library.json")?;
//! let text = std::fs::read_to_string("./backup.json")?;
//! let preview = other.preview_import(&text)?;
//! println!("{}", preview.merge_report);
//! other.merge_archive(&text)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Archives
//!
//! An archive is `{ meta, data }`. `meta.checksum` is a digest of the
//! canonical serialization of `data` only, so the envelope can be
//! re-indented freely while any edit to the library contents is detected.
//! Only format version 1 exists; other versions are rejected outright.
//!
//! ### Merge-by-identity
//!
//! Every record carries an immutable `id`. Restoring in merge mode replaces
//! local records that share an id with an incoming one, adds the rest, and
//! keeps local records the backup does not mention. Folder names are
//! combined by value.
//!
//! ### Version lineages
//!
//! Each prompt has its own history of frozen snapshots. Version 1 is the
//! baseline and cannot be deleted. Restoring copies a snapshot onto the live
//! prompt; it does not create or change snapshots.
//!
//! ## Error Handling
//!
//! Archive failures are reported as [`ImportError`], version store failures
//! as [`VersionError`]; both convert into the crate-wide [`VaultError`].
//!
//! ## Module Organization
//!
//! - [`checksum`]: payload digests
//! - [`archive`]: envelope export and authenticated import
//! - [`merge`]: merge-by-identity and the restore report
//! - [`versions`]: per-prompt version history
//! - [`diff`]: word-level diff spans
//! - [`library`]: the coordinator owning live state
//! - [`storage`]: library file persistence
//! - [`types`]: records and the data snapshot
//! - [`error`]: error types

// Public API modules
pub mod archive;
pub mod checksum;
pub mod diff;
pub mod error;
pub mod library;
pub mod merge;
pub mod storage;
pub mod types;
pub mod versions;

// Re-export main types for convenience
pub use archive::{export_archive, import_archive, ArchiveEnvelope, ArchiveMeta, ArchiveOptions, ArchiveSummary};
pub use checksum::{digest, ChecksumAlgorithm};
pub use diff::{diff, DiffSpan, SpanKind};
pub use error::{ImportError, Result, VaultError, VersionError};
pub use library::{ImportPreview, Library, LibraryBuilder, LibraryConfig};
pub use merge::{merge_backup_data, merge_by_id, CollectionChanges, MergeOutcome, RestoreReport};
pub use types::*;
pub use versions::{LineageState, SnapshotId, VersionCommit, VersionStore};
