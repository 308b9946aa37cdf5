use anyhow::{anyhow, Context, Result};
use std::path::Path;

use super::open_context;
use crate::models::{parse_metadata_pair, Metadata};
use crate::services::RebuildPolicy;

pub async fn handle_add_command(
    config_path: Option<&Path>,
    offline: bool,
    id: String,
    text: String,
    meta: Vec<String>,
) -> Result<()> {
    let metadata = meta
        .iter()
        .map(|pair| parse_metadata_pair(pair).map_err(|e| anyhow!(e)))
        .collect::<Result<Metadata>>()?;

    let context = open_context(config_path, offline, RebuildPolicy::Refuse)?;
    context
        .index()
        .insert(&id, &text, metadata)
        .await
        .with_context(|| format!("Failed to index issue '{id}'"))?;

    println!("✓ Indexed issue '{id}'");
    let fallbacks = context.embedder().fallback_count();
    if fallbacks > 0 {
        println!("  Warning: embedding gateway failed, stored a zero vector");
    }

    context.close()?;
    Ok(())
}

pub async fn handle_search_command(
    config_path: Option<&Path>,
    offline: bool,
    text: String,
    k: usize,
    json: bool,
) -> Result<()> {
    let context = open_context(config_path, offline, RebuildPolicy::Refuse)?;
    let hits = context
        .index()
        .query(&text, k)
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        println!("No similar issues found.");
    } else {
        println!("Similar issues ({} results):", hits.len());
        println!();
        for (rank, hit) in hits.iter().enumerate() {
            println!("{}. {} (distance {:.4})", rank + 1, hit.id, hit.distance);
            println!("   {}", preview(&hit.text, 160));
            for (key, value) in &hit.metadata {
                println!("   {key}: {value}");
            }
            println!();
        }
    }

    if context.embedder().fallback_count() > 0 {
        eprintln!("Warning: embedding gateway failed, results are not meaningful");
    }

    context.close()?;
    Ok(())
}

pub async fn handle_show_command(
    config_path: Option<&Path>,
    offline: bool,
    id: String,
) -> Result<()> {
    let context = open_context(config_path, offline, RebuildPolicy::Refuse)?;

    match context.index().get(&id)? {
        Some(record) => {
            println!("Issue: {}", record.id);
            println!("  Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Dimensions: {}", record.vector.len());
            for (key, value) in &record.metadata {
                println!("  {key}: {value}");
            }
            println!();
            println!("{}", record.text);
        }
        None => println!("Issue '{id}' not found."),
    }

    context.close()?;
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let truncated: String = single_line.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
