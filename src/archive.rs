//! Archive envelope encoding and authenticated decoding
//!
//! An archive is a UTF-8 JSON document with two top-level fields:
//!
//! ```text
//! {
//!   "meta": { "version": 1, "exportedAt": <epoch-millis>, "checksum": "<digest>" },
//!   "data": { "prompts": [...], "folders": [...], "skills": [...],
//!             "workflows": [...], "agents": [...], "history": [...], "snapshots": [...] }
//! }
//! ```
//!
//! ## Checksum Scope
//!
//! The checksum is computed over the canonical serialization of `data`
//! alone: object keys sorted recursively, no insignificant whitespace.
//! Re-indenting the file or reordering keys therefore keeps the archive
//! valid, while any change to a value inside `data` is caught on import.
//!
//! ## Import Pipeline
//!
//! 1. Parse the envelope shape, failing with [`ImportError::MalformedEnvelope`]
//! 2. Check `meta.version` against [`SUPPORTED_VERSIONS`]
//! 3. Recompute the digest over `data` and compare with `meta.checksum`
//! 4. Decode the typed [`DataSnapshot`]
//!
//! A payload that fails step 3 is never decoded, so it cannot reach the
//! merge engine.
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::archive::{export_archive, import_archive};
//! use promptvault::types::{DataSnapshot, Prompt};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut snapshot = DataSnapshot::default();
//! snapshot.prompts.push(Prompt::new("Translate", "Translate {{text}} to French"));
//!
//! let text = export_archive(&snapshot)?;
//! let restored = import_archive(&text)?;
//! assert_eq!(restored, snapshot);
//! # Ok(())
//! # }
//! ```

use crate::checksum::ChecksumAlgorithm;
use crate::error::{ImportError, Result};
use crate::types::{timestamp_now, CollectionKind, DataSnapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Archive format version written by this build
pub const FORMAT_VERSION: u32 = 1;

/// Archive format versions this build can import
pub const SUPPORTED_VERSIONS: &[u32] = &[FORMAT_VERSION];

/// Integrity metadata of an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMeta {
    /// Format version
    pub version: u32,
    /// Export time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
    /// Digest of the canonical `data` serialization
    pub checksum: String,
}

/// Top-level serialized archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEnvelope {
    /// Integrity metadata
    pub meta: ArchiveMeta,
    /// Library payload
    pub data: DataSnapshot,
}

/// Options controlling archive export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Digest algorithm for `meta.checksum`
    pub algorithm: ChecksumAlgorithm,
    /// Indent the written JSON
    pub pretty: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Adler32,
            pretty: true,
        }
    }
}

/// What an authenticated archive contains
///
/// Produced by [`inspect`] so a confirmation layer can show the user what
/// a backup holds before anything is merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Format version
    pub version: u32,
    /// Export time
    pub exported_at: DateTime<Utc>,
    /// Stored (and verified) checksum
    pub checksum: String,
    /// Algorithm the checksum was produced with
    pub algorithm: ChecksumAlgorithm,
    /// Records per collection
    pub counts: BTreeMap<CollectionKind, usize>,
    /// Number of folder names
    pub folders: usize,
}

impl ArchiveSummary {
    /// Total identity-bearing records in the archive
    pub fn total_records(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Canonical text of a JSON value: keys sorted recursively, compact
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a string value yields the escaped JSON literal
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical serialization of a snapshot, the checksum input
pub fn canonical_data(snapshot: &DataSnapshot) -> Result<String> {
    Ok(canonical_json(&serde_json::to_value(snapshot)?))
}

/// Wrap a snapshot into an envelope using the default options
pub fn export(snapshot: &DataSnapshot) -> Result<ArchiveEnvelope> {
    export_with(snapshot, &ArchiveOptions::default())
}

/// Wrap a snapshot into an envelope
pub fn export_with(snapshot: &DataSnapshot, options: &ArchiveOptions) -> Result<ArchiveEnvelope> {
    let checksum = options.algorithm.digest(&canonical_data(snapshot)?);

    info!(
        "Exporting {} records and {} folders (checksum {})",
        snapshot.record_count(),
        snapshot.folders.len(),
        checksum
    );

    Ok(ArchiveEnvelope {
        meta: ArchiveMeta {
            version: FORMAT_VERSION,
            exported_at: timestamp_now(),
            checksum,
        },
        data: snapshot.clone(),
    })
}

/// Serialize an envelope to archive text
pub fn encode(envelope: &ArchiveEnvelope, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    Ok(text)
}

/// Export a snapshot straight to pretty-printed archive text
pub fn export_archive(snapshot: &DataSnapshot) -> Result<String> {
    export_archive_with(snapshot, &ArchiveOptions::default())
}

/// Export a snapshot to archive text with explicit options
pub fn export_archive_with(snapshot: &DataSnapshot, options: &ArchiveOptions) -> Result<String> {
    let envelope = export_with(snapshot, options)?;
    encode(&envelope, options.pretty)
}

/// Authenticate and decode archive bytes
///
/// # Errors
///
/// - [`ImportError::MalformedEnvelope`] if the bytes are not an envelope or
///   a record has the wrong shape
/// - [`ImportError::UnsupportedVersion`] if `meta.version` is unknown
/// - [`ImportError::IntegrityCheckFailed`] if `data` does not match
///   `meta.checksum`
pub fn import(raw: &[u8]) -> std::result::Result<DataSnapshot, ImportError> {
    authenticate(raw).map(|(_, snapshot)| snapshot)
}

/// Authenticate and decode archive text
pub fn import_archive(text: &str) -> std::result::Result<DataSnapshot, ImportError> {
    import(text.as_bytes())
}

/// Authenticate an archive and describe its contents
pub fn inspect(raw: &[u8]) -> std::result::Result<ArchiveSummary, ImportError> {
    open(raw).map(|(summary, _)| summary)
}

/// Authenticate an archive once, returning its summary and its data
pub fn open(raw: &[u8]) -> std::result::Result<(ArchiveSummary, DataSnapshot), ImportError> {
    let (meta, snapshot) = authenticate(raw)?;

    let counts = CollectionKind::ALL
        .iter()
        .map(|kind| (*kind, snapshot.count(*kind)))
        .collect();

    let summary = ArchiveSummary {
        version: meta.version,
        exported_at: meta.exported_at,
        algorithm: ChecksumAlgorithm::detect(&meta.checksum),
        checksum: meta.checksum,
        counts,
        folders: snapshot.folders.len(),
    };
    Ok((summary, snapshot))
}

/// Run the full import pipeline, returning the verified meta and data
fn authenticate(raw: &[u8]) -> std::result::Result<(ArchiveMeta, DataSnapshot), ImportError> {
    let mut root: Value = serde_json::from_slice(raw)
        .map_err(|e| ImportError::malformed(format!("not valid JSON: {}", e)))?;

    let fields = root
        .as_object_mut()
        .ok_or_else(|| ImportError::malformed("top level is not an object"))?;
    let meta = fields
        .remove("meta")
        .ok_or_else(|| ImportError::malformed("missing 'meta'"))?;
    let data = fields
        .remove("data")
        .ok_or_else(|| ImportError::malformed("missing 'data'"))?;

    if !data.is_object() {
        return Err(ImportError::malformed("'data' is not an object"));
    }

    // Any integer is a version; negative and oversized ones are just unsupported
    let version = meta
        .get("version")
        .and_then(|v| v.as_i64().map(i128::from).or_else(|| v.as_u64().map(i128::from)))
        .ok_or_else(|| ImportError::malformed("'meta.version' is missing or not an integer"))?;

    if !SUPPORTED_VERSIONS.iter().any(|v| i128::from(*v) == version) {
        return Err(ImportError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSIONS.to_vec(),
        });
    }

    let meta: ArchiveMeta = serde_json::from_value(meta)
        .map_err(|e| ImportError::malformed(format!("invalid 'meta': {}", e)))?;

    let algorithm = ChecksumAlgorithm::detect(&meta.checksum);
    let actual = algorithm.digest(&canonical_json(&data));
    if actual != meta.checksum {
        warn!(
            "Archive integrity check failed: stored {}, computed {}",
            meta.checksum, actual
        );
        return Err(ImportError::IntegrityCheckFailed {
            expected: meta.checksum,
            actual,
        });
    }

    let snapshot: DataSnapshot = serde_json::from_value(data)
        .map_err(|e| ImportError::malformed(format!("invalid record in 'data': {}", e)))?;

    debug!(
        "Archive verified: {} records exported at {}",
        snapshot.record_count(),
        meta.exported_at
    );
    Ok((meta, snapshot))
}
