use clap::Parser;
use issuematch::cli::Cli;
use issuematch::logging::{init_logging, LoggingConfig};
use tracing::Level;

fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (ignore errors if missing)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        logging = logging.with_level(Level::DEBUG);
    }
    // Keeps the log file writer alive until exit
    let _guard = init_logging(logging)?;

    cli.run()
}
