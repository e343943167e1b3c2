//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands. Handlers
//! wire the configuration into the library types, run the operation, and
//! print human-facing output; all real work lives in the library.

use crate::catalog::{Catalog, JsonCatalog};
use crate::cli::prompt::CliPrompt;
use crate::cli::{Args, Commands};
use crate::core::batch::BatchStore;
use crate::core::config::Config;
use crate::core::error::IngestError;
use crate::core::importer::{AbortReason, BatchImporter, ImportOptions, RunSummary};
use crate::core::resolver::{DuplicateResolver, ResolverMode};
use crate::phash::{self, HashIndex, SharedIndex};
use crate::source::FolderSource;
use anyhow::{anyhow, bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Commands::Import {
            folder,
            locator,
            batch,
            new,
            interactive,
            threshold,
            dry_run,
        } => import(
            config,
            shutdown_flag,
            folder.clone(),
            locator.clone(),
            batch.clone(),
            *new,
            *interactive,
            *threshold,
            *dry_run,
        ),
        Commands::Batches { locator } => {
            list_batches(config, locator.as_deref());
            Ok(())
        }
        Commands::Close { batch } => close_batch(config, batch),
        Commands::Similar {
            id,
            file,
            threshold,
        } => find_similar(config, *id, file.clone(), *threshold),
        Commands::Rebuild { backfill } => rebuild_index(config, *backfill),
        Commands::ShowConfig => {
            show_config(config);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn import(
    config: &Config,
    shutdown_flag: Arc<AtomicBool>,
    folder: PathBuf,
    locator: Option<String>,
    batch: Option<String>,
    force_new: bool,
    interactive: bool,
    threshold: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    if !folder.is_dir() {
        bail!("Import folder does not exist: {}", folder.display());
    }

    let mut catalog = JsonCatalog::load_or_create(&config.storage.catalog_file)?;
    let index = load_index(&catalog)?;
    let batches = BatchStore::new(&config.storage.batches_dir);

    let mode = if interactive {
        ResolverMode::Interactive
    } else {
        config.import.mode
    };
    let resolver = DuplicateResolver::new(mode, Box::new(CliPrompt::new()));
    let threshold = import_threshold(config, threshold);

    let mut source = FolderSource::new(&folder);
    let options = ImportOptions {
        threshold,
        dry_run,
        batch,
        force_new,
        locator,
    };

    let mut importer = BatchImporter::new(
        &mut catalog,
        index,
        &batches,
        resolver,
        config.fetch.retry_policy(),
        shutdown_flag,
    );

    match importer.run(&mut source, &options) {
        Ok(summary) => {
            print_summary(&summary, dry_run);
            Ok(())
        }
        Err(IngestError::PipelineAborted { reason, summary }) => {
            print_summary(&summary, dry_run);
            match reason {
                AbortReason::OperatorRequest | AbortReason::ShutdownSignal => {
                    warn!("Run stopped early ({}); committed entries stand", reason);
                    Ok(())
                }
                AbortReason::FetchFailures(_) => {
                    Err(anyhow!("Run aborted after {}", reason))
                }
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!();
    println!(
        "Batch '{}'{}:",
        summary.batch,
        if dry_run { " (dry run)" } else { "" }
    );
    println!("  committed:         {}", summary.committed);
    println!("  duplicates:        {}", summary.skipped_duplicate);
    println!("  already archived:  {}", summary.skipped_archived);
    println!("  invalid images:    {}", summary.skipped_invalid);
    println!("  fetch failures:    {}", summary.failed);
}

fn list_batches(config: &Config, locator: Option<&str>) {
    let batches = BatchStore::new(&config.storage.batches_dir).list(locator);
    if batches.is_empty() {
        println!("No batches found.");
        return;
    }

    println!("{:<40} {:>8} {:>7}  {}", "NAME", "STATUS", "ITEMS", "LOCATOR");
    for batch in batches {
        println!(
            "{:<40} {:>8} {:>7}  {}",
            batch.name,
            format!("{:?}", batch.status).to_lowercase(),
            batch.archived_items,
            batch.locator
        );
    }
}

fn close_batch(config: &Config, name: &str) -> Result<()> {
    let store = BatchStore::new(&config.storage.batches_dir);
    let mut batch = store.open(name)?;
    batch.close()?;
    println!("Closed batch '{}'.", name);
    Ok(())
}

fn find_similar(
    config: &Config,
    id: Option<u64>,
    file: Option<PathBuf>,
    threshold: Option<u32>,
) -> Result<()> {
    let catalog = JsonCatalog::load_or_create(&config.storage.catalog_file)?;
    let index = load_index(&catalog)?;
    let threshold = threshold.unwrap_or(config.dedupe.loose_threshold);

    let (probe, exclude) = match (id, file) {
        (Some(id), None) => {
            let entry = catalog
                .get(id)
                .ok_or_else(|| anyhow!("No catalog entry with id {}", id))?;
            let text = entry
                .phash
                .ok_or_else(|| anyhow!("Entry {} has no fingerprint; run `rebuild --backfill`", id))?;
            (phash::decode(&text)?, Some(id))
        }
        (None, Some(path)) => {
            let bytes = fs::read(&path)?;
            (phash::compute(&bytes)?, None)
        }
        _ => bail!("Specify exactly one of --id or --file"),
    };

    let matches = index.read().unwrap_or_else(|e| e.into_inner()).query(&probe, threshold);
    let matches: Vec<_> = matches
        .into_iter()
        .filter(|m| exclude != Some(m.id))
        .take(config.dedupe.max_results)
        .collect();

    if matches.is_empty() {
        println!("No entries within {} bits.", threshold);
        return Ok(());
    }

    println!("{} match(es) within {} bits:", matches.len(), threshold);
    for m in matches {
        match catalog.get(m.id) {
            Some(entry) => println!(
                "  #{:<6} {:>2} bits  '{}' by {} [{}]",
                m.id, m.distance, entry.meta.title, entry.meta.artist, entry.meta.platform
            ),
            None => println!("  #{:<6} {:>2} bits", m.id, m.distance),
        }
    }
    Ok(())
}

fn rebuild_index(config: &Config, backfill: bool) -> Result<()> {
    let mut catalog = JsonCatalog::load_or_create(&config.storage.catalog_file)?;

    if backfill {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message("computing fingerprints");

        let stats = catalog.backfill_fingerprints(|done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })?;
        bar.finish_and_clear();

        println!(
            "Backfill: {} computed, {} failed, {} entries have no stored file.",
            stats.computed, stats.failed, stats.skipped_no_file
        );
    }

    let mut index = HashIndex::new();
    let stats = index.rebuild(catalog.fingerprints())?;
    println!(
        "Index rebuilt: {} fingerprints loaded, {} malformed records skipped.",
        stats.loaded, stats.skipped_malformed
    );
    if stats.skipped_malformed > 0 {
        warn!(
            "{} catalog records carry malformed fingerprints; re-run `rebuild --backfill` after fixing their files",
            stats.skipped_malformed
        );
    }
    Ok(())
}

fn show_config(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => println!("Failed to render config: {}", e),
    }
}

/// Dedup threshold for an import run
///
/// Imports dedup at the strict threshold in both resolver modes; the loose
/// threshold is reserved for `similar` queries. `--threshold` overrides.
fn import_threshold(config: &Config, requested: Option<u32>) -> u32 {
    requested.unwrap_or(config.dedupe.strict_threshold)
}

/// Build the shared index from every stored fingerprint
fn load_index(catalog: &JsonCatalog) -> Result<SharedIndex> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("loading {} catalog entries", catalog.len()));

    let index = HashIndex::shared();
    let stats = index
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .rebuild(catalog.fingerprints())?;
    spinner.finish_and_clear();

    info!(
        "Hash index ready: {} fingerprints ({} malformed skipped)",
        stats.loaded, stats.skipped_malformed
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_defaults_to_strict_threshold() {
        let config = Config::default();
        assert_eq!(
            import_threshold(&config, None),
            config.dedupe.strict_threshold
        );
        assert_ne!(import_threshold(&config, None), config.dedupe.loose_threshold);
    }

    #[test]
    fn test_import_threshold_override_wins() {
        let config = Config::default();
        assert_eq!(import_threshold(&config, Some(7)), 7);
    }
}
