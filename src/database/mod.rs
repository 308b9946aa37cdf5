pub mod collection_repo;
pub mod connection;
pub mod error;
pub mod issue_repo;
pub mod migrations;
pub mod schema;

pub use collection_repo::CollectionRepository;
pub use connection::DatabaseManager;
pub use error::DatabaseError;
pub use issue_repo::{IssueRepository, MAX_QUERY_K};
pub use migrations::{Migration, MigrationManager, MigrationStatus};
pub use schema::{create_schema, SCHEMA_VERSION};
