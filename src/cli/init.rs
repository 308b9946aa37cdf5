use anyhow::{Context, Result};
use std::path::Path;

use super::{load_config, open_context};
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::env::embedding as env_embedding;
use crate::services::RebuildPolicy;

pub async fn handle_init_command(config_path: Option<&Path>, offline: bool) -> Result<()> {
    println!("Initializing issuematch...");

    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };
    if path.exists() {
        println!("✓ Config already exists at: {}", path.display());
    } else {
        Config::default()
            .save_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ Wrote default config to: {}", path.display());
    }

    let config = load_config(Some(&path))?;
    let db_path = config.database_path()?;
    let db = DatabaseManager::new(&db_path).with_context(|| "Failed to create database manager")?;
    println!("✓ Database ready at: {}", db_path.display());
    println!("  sqlite-vec {}", db.vector_extension_version()?);
    for migration in db.migration_status()? {
        let mark = if migration.applied { "✓" } else { "·" };
        println!(
            "  {mark} v{} {}",
            migration.version, migration.description
        );
    }
    db.close()?;

    if !offline {
        if let Err(e) = config.validate() {
            println!();
            println!("Embedding gateway is not configured yet: {e}");
            println!("Next steps:");
            println!("  1. Set [embedding] base_url, model and api_key in {}", path.display());
            println!(
                "     or export {}, {} and {}",
                env_embedding::BASE_URL,
                env_embedding::MODEL,
                env_embedding::API_KEY
            );
            println!("  2. Run 'issuematch init' again");
            println!();
            println!("Or try it without a gateway: issuematch --offline init");
            return Ok(());
        }
    }

    let context = open_context(Some(&path), offline, RebuildPolicy::Refuse)?;
    let collection = context.index().collection();
    println!(
        "✓ Collection '{}' ready ({})",
        collection.name, collection.signature
    );
    context.close()?;

    println!();
    println!("Next steps:");
    println!("  issuematch add <id> \"<issue text>\" -m category=billing");
    println!("  issuematch search \"<issue text>\"");

    Ok(())
}
