//! Integration tests for promptvault
//!
//! Drives two libraries through realistic backup and restore scenarios:
//! edits on one machine, a backup file carried to another, merges in both
//! directions, and version history surviving the trip.

use ::promptvault::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

/// Test harness for backup scenarios between two machines
pub struct VaultTestHarness {
    pub dir: TempDir,
    pub laptop: Library,
    pub desktop: Library,
    pub generator: LibraryGenerator,
}

impl VaultTestHarness {
    /// Create two file-backed libraries in a scratch directory
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let laptop = Library::open(dir.path().join("laptop.json")).unwrap();
        let desktop = Library::open(dir.path().join("desktop.json")).unwrap();

        Self {
            dir,
            laptop,
            desktop,
            generator: LibraryGenerator::new(42),
        }
    }

    /// Path for a backup file inside the scratch directory
    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Export `from` to a file and merge that file into `to`
    pub fn carry_backup(&self, from: &Library, to: &Library, name: &str) -> anyhow::Result<RestoreReport> {
        let path = self.backup_path(name);
        from.write_archive(&path)?;
        let text = fs::read_to_string(&path)?;
        Ok(to.merge_archive(&text)?)
    }
}

/// Deterministic generator of library content
pub struct LibraryGenerator {
    rng: StdRng,
}

impl LibraryGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Random prose of `words` words
    pub fn text(&mut self, words: usize) -> String {
        const VOCABULARY: &[&str] = &[
            "summarize", "the", "following", "text", "in", "plain", "language", "for", "a",
            "reader", "who", "is", "new", "to", "topic", "{{input}}", "briefly", "list",
        ];
        (0..words)
            .map(|_| VOCABULARY[self.rng.random_range(0..VOCABULARY.len())])
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Populate a library with prompts, skills, workflows, agents and runs
    pub fn populate(&mut self, library: &Library, config: &ContentShape) -> anyhow::Result<Vec<Prompt>> {
        let mut prompts = Vec::new();
        for i in 0..config.prompts {
            let mut prompt = Prompt::new(format!("Prompt {}", i), self.text(12));
            prompt.folder = Some(config.folders[i % config.folders.len()].to_string());
            prompt.tags = vec![format!("tag{}", i % 3)];
            library.upsert_prompt(prompt.clone())?;
            prompts.push(prompt);
        }

        for i in 0..config.skills {
            library.upsert_skill(Skill::new(format!("Skill {}", i), self.text(8)))?;
        }

        let mut workflow = Workflow::new("Pipeline");
        for prompt in prompts.iter().take(2) {
            workflow.add_step(prompt.title.clone(), Some(prompt.id.clone()));
        }
        library.upsert_workflow(workflow)?;
        library.upsert_agent(Agent::new("Reviewer", self.text(10)))?;

        for _ in 0..config.runs {
            let prompt = &prompts[self.rng.random_range(0..prompts.len())];
            let mut values = BTreeMap::new();
            values.insert("input".to_string(), self.text(3));
            library.record_execution(ExecutionRecord::new(prompt, prompt.content.clone(), values))?;
        }

        Ok(prompts)
    }
}

/// Shape of a generated library
#[derive(Debug, Clone)]
pub struct ContentShape {
    pub prompts: usize,
    pub skills: usize,
    pub runs: usize,
    pub folders: Vec<&'static str>,
}

impl Default for ContentShape {
    fn default() -> Self {
        Self {
            prompts: 6,
            skills: 3,
            runs: 10,
            folders: vec!["Work", "Personal", "Research"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_backup_to_fresh_machine() {
        let mut harness = VaultTestHarness::new();
        let config = ContentShape::default();
        let prompts = harness.generator.populate(&harness.laptop, &config).unwrap();
        for prompt in &prompts {
            harness.laptop.commit_version(&prompt.id, None, None).unwrap();
        }

        let report = harness
            .carry_backup(&harness.laptop, &harness.desktop, "backup.json")
            .unwrap();
        info!("Restore report:\n{}", report);

        assert_eq!(report.prompts.added, config.prompts);
        assert_eq!(report.skills.added, config.skills);
        assert_eq!(report.history.added, config.runs);
        assert_eq!(report.snapshots.added, config.prompts);
        assert_eq!(report.folders_added, config.folders.len());
        assert_eq!(report.total_replaced(), 0);

        assert_eq!(harness.desktop.snapshot(), harness.laptop.snapshot());
    }

    #[test]
    #[traced_test]
    fn test_merge_keeps_local_only_records() {
        let mut harness = VaultTestHarness::new();
        harness
            .generator
            .populate(&harness.laptop, &ContentShape::default())
            .unwrap();

        let local_only = Prompt::new("Desktop only", "written on the desktop");
        harness.desktop.upsert_prompt(local_only.clone()).unwrap();
        harness.desktop.add_folder("Desktop").unwrap();

        harness
            .carry_backup(&harness.laptop, &harness.desktop, "backup.json")
            .unwrap();

        let desktop = harness.desktop.snapshot();
        assert!(desktop.prompt(&local_only.id).is_some());
        assert_eq!(desktop.prompts.len(), 7);
        // Local folders stay first
        assert_eq!(desktop.folders[0], "Desktop");
        assert_eq!(desktop.folders.len(), 4);
    }

    #[test]
    #[traced_test]
    fn test_round_trip_between_machines() {
        let mut harness = VaultTestHarness::new();
        let prompts = harness
            .generator
            .populate(&harness.laptop, &ContentShape::default())
            .unwrap();
        harness
            .carry_backup(&harness.laptop, &harness.desktop, "to-desktop.json")
            .unwrap();

        // Edit the same prompt on the desktop and carry it back
        let mut edited = harness.desktop.prompt(&prompts[0].id).unwrap();
        edited.content = "Rewritten on the desktop".to_string();
        harness.desktop.upsert_prompt(edited.clone()).unwrap();
        harness.desktop.commit_version(&edited.id, Some("desktop".into()), None).unwrap();

        let report = harness
            .carry_backup(&harness.desktop, &harness.laptop, "to-laptop.json")
            .unwrap();
        assert_eq!(report.total_added(), 1);
        assert_eq!(report.snapshots.added, 1);

        let laptop_prompt = harness.laptop.prompt(&edited.id).unwrap();
        assert_eq!(laptop_prompt.content, "Rewritten on the desktop");
        assert_eq!(laptop_prompt.current_version, 1);
        assert_eq!(harness.laptop.snapshot(), harness.desktop.snapshot());
    }

    #[test]
    #[traced_test]
    fn test_version_history_survives_restore() {
        let harness = VaultTestHarness::new();
        let mut prompt = Prompt::new("Explain", "Explain the topic simply");
        harness.laptop.upsert_prompt(prompt.clone()).unwrap();

        let v1 = harness.laptop.commit_version(&prompt.id, None, Some("first".into())).unwrap();
        prompt.content = "Explain the topic simply, with one example".to_string();
        harness.laptop.upsert_prompt(prompt.clone()).unwrap();
        let v2 = harness.laptop.commit_version(&prompt.id, None, Some("example".into())).unwrap();
        prompt.content = "Explain the topic with two examples".to_string();
        harness.laptop.upsert_prompt(prompt.clone()).unwrap();
        let v3 = harness.laptop.commit_version(&prompt.id, None, None).unwrap();

        harness
            .carry_backup(&harness.laptop, &harness.desktop, "backup.json")
            .unwrap();

        let versions = harness.desktop.list_versions(&prompt.id);
        let ids: Vec<&str> = versions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![v1.as_str(), v2.as_str(), v3.as_str()]);

        // Restoring the baseline on the desktop works with the carried ids
        let restored = harness.desktop.restore_version(&prompt.id, &v1).unwrap();
        assert_eq!(restored.content, "Explain the topic simply");
        assert_eq!(restored.current_version, 1);

        let comparison = harness.desktop.compare_version(&prompt.id, &v3).unwrap();
        assert!(comparison.has_changes);
        assert!(comparison.stats.words_added > 0);
    }

    #[test]
    #[traced_test]
    fn test_tampered_backup_is_refused() {
        let mut harness = VaultTestHarness::new();
        harness
            .generator
            .populate(&harness.laptop, &ContentShape::default())
            .unwrap();

        let path = harness.backup_path("backup.json");
        harness.laptop.write_archive(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap().replace("Prompt 3", "Prompt 9");

        let before = harness.desktop.snapshot();
        let err = harness.desktop.merge_archive(&text).unwrap_err();
        assert!(matches!(err, VaultError::Import(ImportError::IntegrityCheckFailed { .. })));
        assert_eq!(harness.desktop.snapshot(), before);
    }

    #[test]
    #[traced_test]
    fn test_replace_mode_adopts_backup() {
        let mut harness = VaultTestHarness::new();
        harness
            .generator
            .populate(&harness.laptop, &ContentShape::default())
            .unwrap();
        harness.desktop.upsert_prompt(Prompt::new("Gone", "soon")).unwrap();

        let path = harness.backup_path("backup.json");
        harness.laptop.write_archive(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        let preview = harness.desktop.preview_import(&text).unwrap();
        assert_eq!(preview.merge_report.prompts.added, 6);
        assert_eq!(preview.replace_report.prompts.added, 6);

        harness.desktop.replace_with_archive(&text).unwrap();
        assert_eq!(harness.desktop.snapshot(), harness.laptop.snapshot());

        // Replace persisted through autosave
        let reopened = Library::open(harness.dir.path().join("desktop.json")).unwrap();
        assert_eq!(reopened.snapshot(), harness.laptop.snapshot());
    }

    #[test]
    fn test_sha256_backups_interoperate() {
        let harness = VaultTestHarness::new();
        let strong = LibraryBuilder::new()
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .open(harness.dir.path().join("strong.json"))
            .unwrap();
        strong.upsert_skill(Skill::new("Skill", "content")).unwrap();

        let path = harness.backup_path("strong-backup.json");
        let summary = strong.write_archive(&path).unwrap();
        assert!(summary.checksum.starts_with("sha256:"));

        let text = fs::read_to_string(&path).unwrap();
        let report = harness.desktop.merge_archive(&text).unwrap();
        assert_eq!(report.skills.added, 1);
    }
}
