//! # promptvault CLI - Backups and versions for your prompt library
//!
//! A command-line interface for the promptvault library engine.
//!
//! ## Features
//! - Export the library into an integrity-checked archive
//! - Verify and import archives, merging or replacing the library
//! - Commit, compare, restore and delete prompt versions
//!
//! ## Usage
//! ```bash
//! # Back up the library
//! promptvault export backup.json
//!
//! # Check a backup without importing it
//! promptvault verify backup.json
//!
//! # Merge a backup into the library
//! promptvault import backup.json
//!
//! # Save the current content of a prompt as a new version
//! promptvault versions commit "Code review" -m "tighter wording"
//!
//! # Compare version 1 with the live prompt
//! promptvault versions diff "Code review" v1
//! ```

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use promptvault::diff::{DiffSpan, SpanKind};
use promptvault::types::short_id;
use promptvault::{
    ChecksumAlgorithm, CollectionKind, Library, LibraryBuilder, Prompt, RestoreReport, VaultError,
    VersionSnapshot,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// promptvault CLI - integrity-checked backups and version history
#[derive(Parser)]
#[command(name = "promptvault")]
#[command(version)]
#[command(about = "Back up, restore and version a local prompt library")]
#[command(long_about = None)]
struct Cli {
    /// Library file (defaults to ./library.json)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the library to an archive file
    Export {
        /// Archive file to write
        file: PathBuf,

        /// Use SHA-256 instead of Adler-32 for the checksum
        #[arg(long)]
        sha256: bool,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Import an archive into the library
    Import {
        /// Archive file to read
        file: PathBuf,

        /// Discard the local library and adopt the archive wholesale
        #[arg(long)]
        replace: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Check an archive's integrity without importing it
    Verify {
        /// Archive file to check
        file: PathBuf,
    },

    /// Manage prompt versions
    #[command(subcommand, alias = "v")]
    Versions(VersionCommands),

    /// Show library contents
    Status,
}

#[derive(Subcommand)]
enum VersionCommands {
    /// List versions of a prompt
    #[command(alias = "ls")]
    List {
        /// Prompt id, id prefix or exact title
        prompt: String,
    },

    /// Save the prompt's current content as a new version
    Commit {
        /// Prompt id, id prefix or exact title
        prompt: String,

        /// Version name
        #[arg(short, long)]
        name: Option<String>,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Copy a version onto the live prompt
    Restore {
        /// Prompt id, id prefix or exact title
        prompt: String,

        /// Snapshot id prefix or version number like v2
        snapshot: String,
    },

    /// Delete a version (not the baseline)
    #[command(alias = "rm")]
    Delete {
        /// Prompt id, id prefix or exact title
        prompt: String,

        /// Snapshot id prefix or version number like v2
        snapshot: String,
    },

    /// Compare a version with the live prompt
    Diff {
        /// Prompt id, id prefix or exact title
        prompt: String,

        /// Snapshot id prefix or version number like v2
        snapshot: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("promptvault=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Run command
    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<VaultError>() {
            Some(vault_error) => vault_error.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<()> {
    let library_path = cli.library.unwrap_or_else(|| PathBuf::from("library.json"));

    match cli.command {
        Commands::Export { file, sha256, compact } => cmd_export(&library_path, &file, sha256, compact),
        Commands::Import { file, replace, yes } => cmd_import(&library_path, &file, replace, yes),
        Commands::Verify { file } => cmd_verify(&file),
        Commands::Status => cmd_status(&library_path),
        Commands::Versions(command) => {
            let library = Library::open(&library_path)?;
            match command {
                VersionCommands::List { prompt } => cmd_versions_list(&library, &prompt),
                VersionCommands::Commit { prompt, name, message } => {
                    cmd_versions_commit(&library, &prompt, name, message)
                }
                VersionCommands::Restore { prompt, snapshot } => {
                    cmd_versions_restore(&library, &prompt, &snapshot)
                }
                VersionCommands::Delete { prompt, snapshot } => {
                    cmd_versions_delete(&library, &prompt, &snapshot)
                }
                VersionCommands::Diff { prompt, snapshot } => cmd_versions_diff(&library, &prompt, &snapshot),
            }
        }
    }
}

/// Export the library to an archive
fn cmd_export(library_path: &Path, file: &Path, sha256: bool, compact: bool) -> anyhow::Result<()> {
    // Flags override the library's saved archive settings
    let mut builder = LibraryBuilder::new();
    if sha256 {
        builder = builder.checksum_algorithm(ChecksumAlgorithm::Sha256);
    }
    if compact {
        builder = builder.pretty_archives(false);
    }
    let library = builder.open(library_path)?;

    let summary = library
        .write_archive(file)
        .with_context(|| format!("writing archive {}", file.display()))?;

    println!("{} Exported library to {}", "✓".green().bold(), file.display().to_string().cyan());
    println!("  Records: {}", summary.total_records().to_string().cyan());
    println!("  Folders: {}", summary.folders.to_string().cyan());
    println!("  Checksum: {}", summary.checksum.yellow());
    Ok(())
}

/// Import an archive, merging by default
///
/// The archive is authenticated and the change report is shown before
/// anything is committed.
fn cmd_import(library_path: &Path, file: &Path, replace: bool, yes: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let library = Library::open(library_path)?;

    let preview = library.preview_import(&text)?;
    println!(
        "{} {} ({} records, exported {})",
        "Archive verified:".blue().bold(),
        file.display(),
        preview.summary.total_records(),
        preview.summary.exported_at.format("%Y-%m-%d %H:%M:%S")
    );

    let (mode, report) = if replace {
        ("Replace the whole library with", &preview.replace_report)
    } else {
        ("Merge into the library", &preview.merge_report)
    };
    print_report(report);

    if !yes && !confirm(&format!("{} this archive?", mode))? {
        println!("{}", "Import cancelled, library unchanged".yellow());
        return Ok(());
    }

    let report = if replace {
        library.replace_with_archive(&text)?
    } else {
        library.merge_archive(&text)?
    };

    println!(
        "{} Imported: {} added, {} replaced",
        "✓".green().bold(),
        report.total_added().to_string().cyan(),
        report.total_replaced().to_string().yellow()
    );
    Ok(())
}

/// Verify an archive's integrity
fn cmd_verify(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let summary = promptvault::archive::inspect(&raw).map_err(VaultError::from)?;

    let age = chrono::Utc::now()
        .signed_duration_since(summary.exported_at)
        .to_std()
        .unwrap_or_default();

    println!("{}", "Verification Report:".bold());
    println!("  Status: {}", "VALID".green().bold());
    println!("  Format version: {}", summary.version);
    println!(
        "  Exported: {} ({} ago)",
        summary.exported_at.format("%Y-%m-%d %H:%M:%S"),
        format_duration(Duration::from_secs(age.as_secs()))
    );
    println!("  Checksum: {} ({:?})", summary.checksum.yellow(), summary.algorithm);
    for (kind, count) in &summary.counts {
        println!("  {:<10} {}", kind.as_str(), count.to_string().cyan());
    }
    println!("  {:<10} {}", "folders", summary.folders.to_string().cyan());
    Ok(())
}

/// Show library contents
fn cmd_status(library_path: &Path) -> anyhow::Result<()> {
    let library = Library::open(library_path)?;
    let snapshot = library.snapshot();

    println!("{} {}", "Library:".bold(), library_path.display().to_string().cyan());
    for kind in CollectionKind::ALL {
        println!("  {:<10} {}", kind.as_str(), snapshot.count(kind).to_string().cyan());
    }
    println!("  {:<10} {}", "folders", snapshot.folders.len().to_string().cyan());

    if !snapshot.prompts.is_empty() {
        println!("\n{}", "Prompts:".bold());
        for prompt in &snapshot.prompts {
            let versions = library.list_versions(&prompt.id).len();
            println!(
                "  [{}] {} {}",
                short_id(&prompt.id).yellow(),
                prompt.title,
                format!("(v{}, {} versions)", prompt.current_version, versions).dimmed()
            );
        }
    }
    Ok(())
}

fn cmd_versions_list(library: &Library, prompt: &str) -> anyhow::Result<()> {
    let prompt = resolve_prompt(library, prompt)?;
    let versions = library.list_versions(&prompt.id);

    if versions.is_empty() {
        println!("{} has no versions yet (draft)", prompt.title.cyan());
        return Ok(());
    }

    println!("{} {}", "Versions of".bold(), prompt.title.cyan());
    for snapshot in &versions {
        let marker = if snapshot.version() == prompt.current_version {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!("{} {}", marker, snapshot.display_format());
    }
    Ok(())
}

fn cmd_versions_commit(
    library: &Library,
    prompt: &str,
    name: Option<String>,
    message: Option<String>,
) -> anyhow::Result<()> {
    let prompt = resolve_prompt(library, prompt)?;
    let snapshot_id = library.commit_version(&prompt.id, name, message)?;
    let snapshot = library.select_version(&prompt.id, &snapshot_id)?;

    println!(
        "{} Committed {} of {}",
        "✓".green().bold(),
        format!("v{}", snapshot.version()).yellow().bold(),
        prompt.title.cyan()
    );
    Ok(())
}

fn cmd_versions_restore(library: &Library, prompt: &str, snapshot: &str) -> anyhow::Result<()> {
    let prompt = resolve_prompt(library, prompt)?;
    let snapshot = resolve_snapshot(library, &prompt, snapshot)?;

    let comparison = library.compare_version(&prompt.id, &snapshot.id)?;
    if !comparison.has_changes && prompt.current_version == snapshot.version() {
        println!("{} already matches v{}", prompt.title.cyan(), snapshot.version());
        return Ok(());
    }

    library.restore_version(&prompt.id, &snapshot.id)?;
    println!(
        "{} Restored {} to {}",
        "✓".green().bold(),
        prompt.title.cyan(),
        format!("v{}", snapshot.version()).yellow().bold()
    );
    Ok(())
}

fn cmd_versions_delete(library: &Library, prompt: &str, snapshot: &str) -> anyhow::Result<()> {
    let prompt = resolve_prompt(library, prompt)?;
    let snapshot = resolve_snapshot(library, &prompt, snapshot)?;

    library.delete_version(&prompt.id, &snapshot.id)?;
    println!(
        "{} Deleted v{} of {}",
        "✓".green().bold(),
        snapshot.version(),
        prompt.title.cyan()
    );
    Ok(())
}

fn cmd_versions_diff(library: &Library, prompt: &str, snapshot: &str) -> anyhow::Result<()> {
    let prompt = resolve_prompt(library, prompt)?;
    let snapshot = resolve_snapshot(library, &prompt, snapshot)?;
    let comparison = library.compare_version(&prompt.id, &snapshot.id)?;

    println!(
        "{} v{} → live ({} words added, {} removed)",
        "Diff".bold(),
        comparison.version,
        comparison.stats.words_added.to_string().green(),
        comparison.stats.words_removed.to_string().red()
    );
    println!("{}", render_spans(&comparison.spans));

    if comparison.has_changes {
        println!(
            "\nRestore with: {}",
            format!("promptvault versions restore {} v{}", short_id(&prompt.id), comparison.version)
                .yellow()
        );
    }
    Ok(())
}

// Helper functions

/// Find a prompt by exact id, id prefix or exact title
fn resolve_prompt(library: &Library, query: &str) -> anyhow::Result<Prompt> {
    let prompts = library.prompts();

    if let Some(prompt) = prompts.iter().find(|p| p.id == query || p.title == query) {
        return Ok(prompt.clone());
    }

    let matches: Vec<&Prompt> = prompts.iter().filter(|p| p.id.starts_with(query)).collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(VaultError::DocumentNotFound(query.to_string()).into()),
        _ => bail!("prompt prefix '{}' is ambiguous ({} matches)", query, matches.len()),
    }
}

/// Find a snapshot by version number (`v2` or `2`) or id prefix
fn resolve_snapshot(library: &Library, prompt: &Prompt, query: &str) -> anyhow::Result<VersionSnapshot> {
    let versions = library.list_versions(&prompt.id);

    if let Ok(number) = query.trim_start_matches('v').parse::<u32>() {
        if let Some(snapshot) = versions.iter().find(|s| s.version() == number) {
            return Ok(snapshot.clone());
        }
    }

    versions
        .into_iter()
        .find(|s| s.id.starts_with(query))
        .ok_or_else(|| anyhow!("no version '{}' for prompt {}", query, prompt.title))
}

/// Print a restore report
fn print_report(report: &RestoreReport) {
    for kind in CollectionKind::ALL {
        let changes = report.get(kind);
        if changes.has_changes() {
            println!(
                "  {:<10} {} added, {} replaced",
                kind.as_str(),
                changes.added.to_string().green(),
                changes.replaced.to_string().yellow()
            );
        }
    }
    if report.folders_added > 0 {
        println!("  {:<10} {} added", "folders", report.folders_added.to_string().green());
    }
    if report.is_empty() {
        println!("  {}", "(no changes)".dimmed());
    }
}

/// Render diff spans with colors
fn render_spans(spans: &[DiffSpan]) -> String {
    spans
        .iter()
        .map(|span| match span.kind {
            SpanKind::Unchanged => span.text.normal().to_string(),
            SpanKind::Added => span.text.green().underline().to_string(),
            SpanKind::Removed => span.text.red().strikethrough().to_string(),
        })
        .collect()
}

/// Ask a yes/no question on stdin
fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
