//! Property-based testing for promptvault
//!
//! Uses proptest to verify the archive and merge invariants across
//! randomly generated libraries.

use ::promptvault::diff::{self, SpanKind};
use ::promptvault::*;
use proptest::prelude::*;
use serde_json::Value;
use std::collections::HashSet;

/// Prompts drawn from a small id pool so that libraries overlap
fn prompt_strategy() -> impl Strategy<Value = Prompt> {
    ("p[0-5]", "[A-Za-z ]{0,16}", "\\PC{0,40}", prop::option::of("[A-Z][a-z]{2,6}")).prop_map(
        |(id, title, content, folder)| {
            let mut prompt = Prompt::new(title, content);
            prompt.id = id;
            prompt.folder = folder;
            prompt
        },
    )
}

fn skill_strategy() -> impl Strategy<Value = Skill> {
    ("s[0-3]", "[a-z]{1,10}", "\\PC{0,30}").prop_map(|(id, name, content)| {
        let mut skill = Skill::new(name, content);
        skill.id = id;
        skill
    })
}

/// A library whose collections may contain repeated ids
fn snapshot_strategy() -> impl Strategy<Value = DataSnapshot> {
    (
        prop::collection::vec(prompt_strategy(), 0..8),
        prop::collection::vec(skill_strategy(), 0..5),
        prop::collection::vec("[A-Z][a-z]{2,6}", 0..4),
    )
        .prop_map(|(prompts, skills, folders)| {
            let mut snapshot = DataSnapshot::new();
            snapshot.prompts = prompts;
            snapshot.skills = skills;
            snapshot.folders = folders;
            snapshot
        })
}

/// Same as [`snapshot_strategy`] with ids and folders made unique
fn clean_snapshot_strategy() -> impl Strategy<Value = DataSnapshot> {
    snapshot_strategy().prop_map(|mut snapshot| {
        let mut seen = HashSet::new();
        snapshot.prompts.retain(|p| seen.insert(p.id.clone()));
        let mut seen = HashSet::new();
        snapshot.skills.retain(|s| seen.insert(s.id.clone()));
        let mut seen = HashSet::new();
        snapshot.folders.retain(|f| seen.insert(f.clone()));
        snapshot
    })
}

fn ids<T: Identified>(records: &[T]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Exporting then importing returns the same library
    #[test]
    fn archive_round_trip(snapshot in clean_snapshot_strategy(), sha in any::<bool>()) {
        let options = ArchiveOptions {
            algorithm: if sha { ChecksumAlgorithm::Sha256 } else { ChecksumAlgorithm::Adler32 },
            ..ArchiveOptions::default()
        };
        let text = archive::export_archive_with(&snapshot, &options).unwrap();
        prop_assert_eq!(import_archive(&text).unwrap(), snapshot);
    }

    /// Changing any prompt's content after export is detected
    #[test]
    fn content_tamper_detected(
        snapshot in clean_snapshot_strategy(),
        replacement in "\\PC{1,20}",
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!snapshot.prompts.is_empty());
        let idx = pick.index(snapshot.prompts.len());
        prop_assume!(snapshot.prompts[idx].content != replacement);

        let text = export_archive(&snapshot).unwrap();
        let mut envelope: Value = serde_json::from_str(&text).unwrap();
        envelope["data"]["prompts"][idx]["content"] = Value::String(replacement);
        let tampered = serde_json::to_string(&envelope).unwrap();

        let is_integrity_failure = matches!(
            import_archive(&tampered),
            Err(ImportError::IntegrityCheckFailed { .. })
        );
        prop_assert!(is_integrity_failure);
    }

    /// Merging never loses a local id and never duplicates one
    #[test]
    fn merge_is_additive(local in clean_snapshot_strategy(), incoming in snapshot_strategy()) {
        let (merged, report) = merge_backup_data(&local, &incoming);

        let merged_ids = ids(&merged.prompts);
        let unique: HashSet<&String> = merged_ids.iter().collect();
        prop_assert_eq!(unique.len(), merged_ids.len());

        for id in ids(&local.prompts) {
            prop_assert!(unique.contains(&id));
        }
        for id in ids(&incoming.prompts) {
            prop_assert!(unique.contains(&id));
        }

        let incoming_unique: HashSet<String> = ids(&incoming.prompts).into_iter().collect();
        prop_assert_eq!(
            report.prompts.added + report.prompts.replaced,
            incoming_unique.len()
        );
        prop_assert_eq!(merged.prompts.len(), local.prompts.len() + report.prompts.added);

        for folder in local.folders.iter().chain(incoming.folders.iter()) {
            prop_assert!(merged.folders.contains(folder));
        }
    }

    /// The first incoming occurrence of an id wins
    #[test]
    fn first_occurrence_wins(local in clean_snapshot_strategy(), incoming in snapshot_strategy()) {
        let outcome = merge_by_id(&local.prompts, &incoming.prompts);

        for record in &outcome.merged {
            if let Some(first) = incoming.prompts.iter().find(|p| p.id == record.id) {
                prop_assert_eq!(record, first);
            } else {
                let original = local.prompts.iter().find(|p| p.id == record.id);
                prop_assert_eq!(Some(record), original);
            }
        }
    }

    /// Restoring the same backup twice changes nothing the second time
    #[test]
    fn merge_is_idempotent(local in clean_snapshot_strategy(), incoming in snapshot_strategy()) {
        let (once, _) = merge_backup_data(&local, &incoming);
        let (twice, report) = merge_backup_data(&once, &incoming);

        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(report.total_added(), 0);
        prop_assert_eq!(report.folders_added, 0);
    }

    /// Both sides of a diff can be rebuilt from its spans
    #[test]
    fn diff_reconstructs_both_sides(old in "[a-c ]{0,40}", new in "[a-c ]{0,40}") {
        let spans = diff::diff(&old, &new);

        prop_assert_eq!(diff::reconstruct(&spans, SpanKind::Removed), old.clone());
        prop_assert_eq!(diff::reconstruct(&spans, SpanKind::Added), new.clone());
        prop_assert_eq!(diff::has_changes(&spans), old != new);
    }
}
