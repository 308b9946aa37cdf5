pub mod collection;
pub mod init;
pub mod issues;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::context::{ContextOptions, IssueMatchContext};
use crate::services::{RebuildPolicy, DEFAULT_QUERY_K};

#[derive(Parser)]
#[command(name = "issuematch")]
#[command(about = "Find previously reported issues similar to a new one")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Use deterministic local embeddings instead of the remote gateway
    #[arg(long, global = true)]
    pub offline: bool,

    /// Path to config.toml (defaults to ~/.issuematch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the config file, database and collection
    Init,
    /// Index a new issue
    Add {
        /// Unique issue id (e.g. ticket number)
        id: String,
        /// Issue text
        text: String,
        /// Metadata entry, repeatable
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Search for issues similar to the given text
    Search {
        /// Issue text to match
        text: String,
        /// Number of results
        #[arg(short, default_value_t = DEFAULT_QUERY_K)]
        k: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored issue
    Show {
        /// Issue id
        id: String,
    },
    /// Show collection statistics
    Stats,
    /// Delete every stored vector and recreate the collection
    Rebuild {
        /// Confirm that existing data will be dropped
        #[arg(long)]
        yes: bool,
        /// Copy the database here before dropping anything
        #[arg(long, value_name = "PATH")]
        backup: Option<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let rt = Runtime::new()?;
        let Cli {
            offline,
            config,
            command,
            ..
        } = self;
        let config = config.as_deref();

        rt.block_on(async {
            match command {
                Commands::Init => init::handle_init_command(config, offline).await,
                Commands::Add { id, text, meta } => {
                    issues::handle_add_command(config, offline, id, text, meta).await
                }
                Commands::Search { text, k, json } => {
                    issues::handle_search_command(config, offline, text, k, json).await
                }
                Commands::Show { id } => issues::handle_show_command(config, offline, id).await,
                Commands::Stats => collection::handle_stats_command(config, offline).await,
                Commands::Rebuild { yes, backup } => {
                    collection::handle_rebuild_command(config, offline, yes, backup).await
                }
            }
        })
    }
}

/// Config file (explicit path or default location) with env overrides applied.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    config
        .with_env_overrides()
        .context("Invalid environment override")
}

pub(crate) fn open_context(
    config_path: Option<&Path>,
    offline: bool,
    rebuild: RebuildPolicy,
) -> Result<IssueMatchContext> {
    let config = load_config(config_path)?;
    let options = ContextOptions {
        offline,
        rebuild,
    };
    IssueMatchContext::initialize(config, options).context("Failed to initialize issuematch")
}
