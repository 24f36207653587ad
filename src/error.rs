//! Error types for the promptvault library
//!
//! This module defines all error types that can occur while exporting,
//! importing, merging and versioning a library. Import and version errors
//! have their own enums so callers can match on the exact failure kind;
//! [`VaultError`] wraps both for the coordinator and the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the promptvault library
pub type Result<T> = std::result::Result<T, VaultError>;

/// Failure while authenticating and decoding an archive
///
/// Every variant is terminal for the import attempt. The live library is
/// never touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// Not JSON, or `meta`/`data` absent or mistyped, or a record inside
    /// `data` does not have the shape its collection requires
    #[error("Malformed archive: {0}")]
    MalformedEnvelope(String),

    /// `meta.version` is not one this build understands
    #[error("Unsupported archive version {found} (supported: {supported:?})")]
    UnsupportedVersion {
        /// Version found in the archive
        found: i128,
        /// Versions this build accepts
        supported: Vec<u32>,
    },

    /// The digest recomputed over `data` differs from `meta.checksum`
    #[error("Integrity check failed - expected: {expected}, actual: {actual}")]
    IntegrityCheckFailed {
        /// Checksum stored in the archive
        expected: String,
        /// Checksum recomputed from the archive's data
        actual: String,
    },
}

impl ImportError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ImportError::MalformedEnvelope(msg.into())
    }
}

/// Failure of a single version-store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Version 1 of a lineage can never be deleted
    #[error("Snapshot {snapshot_id} is the baseline version and cannot be deleted")]
    BaselineImmutable {
        /// ID of the baseline snapshot
        snapshot_id: String,
    },

    /// The snapshot is not part of this document's lineage
    #[error("Snapshot {snapshot_id} not found for document {document_id}")]
    NotFound {
        /// Document whose lineage was searched
        document_id: String,
        /// Snapshot that was requested
        snapshot_id: String,
    },
}

/// Main error type for all promptvault operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Archive import failed
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Version store operation failed
    #[error(transparent)]
    Version(#[from] VersionError),

    /// I/O errors while reading or writing library and archive files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document referenced by id does not exist in the library
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The on-disk library file could not be understood
    #[error("Library file corrupted at {path:?}: {reason}")]
    StorageCorrupted {
        /// Library file path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        VaultError::Internal(msg.into())
    }

    /// Check if this error indicates corrupted or tampered data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            VaultError::Import(ImportError::IntegrityCheckFailed { .. })
                | VaultError::StorageCorrupted { .. }
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Import(ImportError::MalformedEnvelope(reason)) => {
                format!("This file is not a valid library backup ({}). Pick a different file.", reason)
            }
            VaultError::Import(ImportError::UnsupportedVersion { found, .. }) => {
                format!(
                    "Backup format version {} is not supported by this build. No data was imported.",
                    found
                )
            }
            VaultError::Import(ImportError::IntegrityCheckFailed { expected, actual }) => {
                format!(
                    "Backup failed its integrity check (stored checksum {}, computed {}). \
                     The file was modified or corrupted after export. No data was imported.",
                    expected, actual
                )
            }
            VaultError::Version(VersionError::BaselineImmutable { .. }) => {
                "Version 1 is the baseline of this document and cannot be deleted.".to_string()
            }
            VaultError::DocumentNotFound(id) => {
                format!("Document '{}' not found. Use 'promptvault status' to list documents.", id)
            }
            _ => self.to_string(),
        }
    }
}
