use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use super::{load_config, open_context};
use crate::database::{DatabaseManager, IssueRepository};
use crate::services::RebuildPolicy;

pub async fn handle_stats_command(config_path: Option<&Path>, offline: bool) -> Result<()> {
    let context = open_context(config_path, offline, RebuildPolicy::Refuse)?;
    let stats = context.index().stats()?;

    println!("Collection: {}", stats.name);
    if !stats.description.is_empty() {
        println!("  Description: {}", stats.description);
    }
    println!("  Model: {}", stats.model);
    println!("  Dimension: {}", stats.dimension);
    println!("  Records: {}", stats.record_count);
    println!("  Created: {}", stats.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Fallback: {}", context.embedder().policy());
    println!(
        "  Database: {}",
        context.database().get_db_path().display()
    );

    context.close()?;
    Ok(())
}

pub async fn handle_rebuild_command(
    config_path: Option<&Path>,
    offline: bool,
    yes: bool,
    backup: Option<PathBuf>,
) -> Result<()> {
    if !yes {
        bail!("Rebuild deletes every stored vector and cannot be undone; pass --yes to confirm");
    }

    let config = load_config(config_path)?;
    let db_path = config.database_path()?;
    let db = DatabaseManager::new(&db_path)?;
    // Counted up front: opening with DropAndRecreate may already clear a
    // collection built by a different embedder.
    let existing = IssueRepository::new(&db).count(&config.storage.collection)?;
    if let Some(backup_path) = backup {
        db.backup_to_file(&backup_path)
            .with_context(|| format!("Failed to back up to {}", backup_path.display()))?;
        println!("✓ Backed up {} to {}", db_path.display(), backup_path.display());
    }
    db.close()?;

    let mut context = open_context(config_path, offline, RebuildPolicy::DropAndRecreate)?;
    context.index_mut().rebuild()?;
    let collection = context.index().collection();

    println!(
        "✓ Rebuilt collection '{}' ({}), dropped {} records",
        collection.name, collection.signature, existing
    );

    context.close()?;
    Ok(())
}
