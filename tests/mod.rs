//! Main test module for promptvault
//!
//! This module includes all test suites:
//! - Integration tests for backup and version scenarios
//! - Chaos tests for corrupted and hostile archives
//! - Property-based tests for merge and archive invariants

pub mod chaos;
pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::promptvault::*;
    use ::promptvault::archive::export_archive_with;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_library_round_trip() {
        let library = Library::in_memory();
        let backup = library.export_archive().unwrap();

        let imported = import_archive(&backup).unwrap();
        assert!(imported.is_empty());

        let other = Library::in_memory();
        let report = other.merge_archive(&backup).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        // An archive written by an older editor that only knew prompts
        let data = json!({ "prompts": [], "folders": ["Inbox"] });
        let checksum = digest(&archive::canonical_json(&data));
        let text = json!({
            "meta": { "version": 1, "exportedAt": 1_700_000_000_000_i64, "checksum": checksum },
            "data": data,
        })
        .to_string();

        let imported = import_archive(&text).unwrap();
        assert_eq!(imported.folders, vec!["Inbox".to_string()]);
        assert!(imported.skills.is_empty());
        assert!(imported.snapshots.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let mut source = DataSnapshot::new();
        let mut prompt = Prompt::new("Tagged", "body");
        prompt.extra.insert("color".to_string(), json!("teal"));
        source.prompts.push(prompt);

        let backup = export_archive(&source).unwrap();
        let imported = import_archive(&backup).unwrap();
        assert_eq!(imported.prompts[0].extra.get("color"), Some(&json!("teal")));
        assert_eq!(imported, source);
    }

    #[test]
    fn test_reindented_archive_still_verifies() {
        let mut source = DataSnapshot::new();
        source.skills.push(Skill::new("Summarize", "Summarize:\n{{text}}"));

        let compact = export_archive_with(
            &source,
            &ArchiveOptions {
                pretty: false,
                ..ArchiveOptions::default()
            },
        )
        .unwrap();

        // Pretty-print the same envelope; key order and whitespace change
        let value: Value = serde_json::from_str(&compact).unwrap();
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        assert_ne!(pretty, compact);
        assert_eq!(import_archive(&pretty).unwrap(), source);
    }

    #[test]
    fn test_unicode_content() {
        let library = Library::in_memory();
        let prompt = Prompt::new("Übersetzen 翻訳", "Traduis «{{texte}}» en 日本語 🚀");
        library.upsert_prompt(prompt.clone()).unwrap();
        library.commit_version(&prompt.id, None, None).unwrap();

        let backup = library.export_archive().unwrap();
        let other = Library::in_memory();
        other.merge_archive(&backup).unwrap();
        assert_eq!(other.prompt(&prompt.id).unwrap().content, prompt.content);
    }

    #[test]
    fn test_unsupported_version_rejected_before_checksum() {
        let text = json!({
            "meta": { "version": 2, "exportedAt": 0, "checksum": "00000000" },
            "data": {},
        })
        .to_string();

        let err = import_archive(&text).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_data_must_be_an_object() {
        for data in [json!([]), json!("text"), json!(null)] {
            let text = json!({
                "meta": { "version": 1, "exportedAt": 0, "checksum": "00000001" },
                "data": data,
            })
            .to_string();
            assert!(matches!(
                import_archive(&text),
                Err(ImportError::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_version_numbers_after_deleting_newest() {
        let library = Library::in_memory();
        let mut prompt = Prompt::new("P", "one");
        library.upsert_prompt(prompt.clone()).unwrap();
        library.commit_version(&prompt.id, None, None).unwrap();

        prompt.content = "two".to_string();
        library.upsert_prompt(prompt.clone()).unwrap();
        let v2 = library.commit_version(&prompt.id, None, None).unwrap();
        library.delete_version(&prompt.id, &v2).unwrap();

        // The next commit takes the freed number
        let v2_again = library.commit_version(&prompt.id, None, None).unwrap();
        assert_ne!(v2, v2_again);
        assert_eq!(library.select_version(&prompt.id, &v2_again).unwrap().version(), 2);
    }

    #[test]
    fn test_snapshot_of_other_prompt_is_not_found() {
        let library = Library::in_memory();
        let a = Prompt::new("A", "a");
        let b = Prompt::new("B", "b");
        library.upsert_prompt(a.clone()).unwrap();
        library.upsert_prompt(b.clone()).unwrap();
        let snap_a = library.commit_version(&a.id, None, None).unwrap();

        let err = library.restore_version(&b.id, &snap_a).unwrap_err();
        assert!(matches!(err, VaultError::Version(VersionError::NotFound { .. })));
    }

    #[test]
    fn test_corrupted_library_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");
        fs::write(&path, "{\"version\": 1, \"data\": ").unwrap();

        let err = Library::open(&path).unwrap_err();
        assert!(err.is_corruption());
        // The broken file is left for the user to inspect
        assert!(path.exists());
    }
}
