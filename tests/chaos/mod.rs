//! Chaos testing for promptvault
//!
//! Feeds damaged and hostile archives to the importer and hammers a
//! library with concurrent readers while imports run. Whatever happens,
//! import must fail cleanly or succeed with the exact original data, and
//! readers must never observe a partially merged library.

use ::promptvault::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Damage applied to an archive
#[derive(Debug, Clone, Copy)]
pub enum Corruption {
    /// Flip one bit of one byte
    BitFlip,
    /// Cut the file short
    Truncate,
    /// Overwrite a run of bytes with random printable characters
    Scribble,
}

/// Deterministic source of archive damage
pub struct ChaosEngine {
    rng: StdRng,
}

impl ChaosEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick a corruption at random
    pub fn pick(&mut self) -> Corruption {
        match self.rng.random_range(0..3) {
            0 => Corruption::BitFlip,
            1 => Corruption::Truncate,
            _ => Corruption::Scribble,
        }
    }

    /// Apply a corruption to archive bytes
    pub fn corrupt(&mut self, bytes: &[u8], corruption: Corruption) -> Vec<u8> {
        let mut out = bytes.to_vec();
        if out.is_empty() {
            return out;
        }

        match corruption {
            Corruption::BitFlip => {
                let pos = self.rng.random_range(0..out.len());
                let bit = self.rng.random_range(0..8);
                out[pos] ^= 1 << bit;
            }
            Corruption::Truncate => {
                let len = self.rng.random_range(0..out.len());
                out.truncate(len);
            }
            Corruption::Scribble => {
                let start = self.rng.random_range(0..out.len());
                let len = self.rng.random_range(1..=16).min(out.len() - start);
                for byte in &mut out[start..start + len] {
                    *byte = self.rng.random_range(b' '..=b'~');
                }
            }
        }
        out
    }
}

/// A library worth protecting
pub fn sample_library() -> DataSnapshot {
    let mut snapshot = DataSnapshot::new();
    for i in 0..5 {
        let mut prompt = Prompt::new(format!("Prompt {}", i), format!("Do task {} carefully", i));
        prompt.folder = Some("Chaos".to_string());
        snapshot.prompts.push(prompt);
    }
    snapshot.skills.push(Skill::new("Skill", "body"));
    snapshot.agents.push(Agent::new("Agent", "You are terse"));
    snapshot.folders.push("Chaos".to_string());
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_corrupted_archives_never_import_wrong_data() {
        let original = sample_library();
        let text = export_archive(&original).unwrap();
        let mut engine = ChaosEngine::new(42);

        let mut rejected = 0;
        for _ in 0..300 {
            let corruption = engine.pick();
            let damaged = engine.corrupt(text.as_bytes(), corruption);

            match archive::import(&damaged) {
                // Only harmless damage such as whitespace may get through
                Ok(imported) => assert_eq!(imported, original, "{:?} let altered data through", corruption),
                Err(_) => rejected += 1,
            }
        }

        info!("Rejected {} of 300 damaged archives", rejected);
        assert!(rejected > 0);
    }

    #[test]
    fn test_failed_imports_leave_library_untouched() {
        let library = Library::in_memory();
        library.upsert_prompt(Prompt::new("Local", "keep me")).unwrap();
        let before = library.snapshot();

        let text = export_archive(&sample_library()).unwrap();
        let mut engine = ChaosEngine::new(7);

        for _ in 0..100 {
            let damaged = engine.corrupt(text.as_bytes(), Corruption::Truncate);
            let damaged = String::from_utf8_lossy(&damaged);
            assert!(library.merge_archive(&damaged).is_err());
            assert!(library.replace_with_archive(&damaged).is_err());
        }

        assert_eq!(library.snapshot(), before);
    }

    #[test]
    fn test_duplicate_ids_in_backup() {
        let mut hostile = sample_library();
        let mut twin = hostile.prompts[0].clone();
        twin.content = "second copy".to_string();
        hostile.prompts.push(twin);

        // A checksum computed over the duplicated data still verifies
        let text = export_archive(&hostile).unwrap();
        let library = Library::in_memory();
        let report = library.merge_archive(&text).unwrap();

        assert_eq!(report.prompts.added, 5);
        let prompts = library.prompts();
        assert_eq!(prompts.len(), 5);
        assert_eq!(prompts[0].content, "Do task 0 carefully");
    }

    #[test]
    fn test_readers_never_see_partial_merge() {
        let library = Arc::new(Library::in_memory());
        library.upsert_prompt(Prompt::new("Base", "x")).unwrap();

        let mut incoming = DataSnapshot::new();
        for i in 0..200 {
            incoming.prompts.push(Prompt::new(format!("Incoming {}", i), "y"));
            incoming.skills.push(Skill::new(format!("Skill {}", i), "z"));
        }
        let text = export_archive(&incoming).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let library = Arc::clone(&library);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let snapshot = library.snapshot();
                        let state = (snapshot.prompts.len(), snapshot.skills.len());
                        assert!(state == (1, 0) || state == (201, 200), "observed {:?}", state);
                    }
                })
            })
            .collect();

        library.merge_archive(&text).unwrap();
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(library.prompts().len(), 201);
    }
}
