pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod models;
pub mod services;

pub mod env;
pub mod error;
pub mod logging;

pub use context::{ContextOptions, IssueMatchContext};
pub use error::{IndexError, IssueMatchError, Result};
pub use logging::{init_logging, LoggingConfig};
