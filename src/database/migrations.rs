use rusqlite::{Connection, Result};
use std::collections::BTreeMap;
use tracing::{error, info};

use super::schema::{create_schema, REQUIRED_TABLES, SCHEMA_VERSION};

pub struct Migration {
    pub version: u32,
    pub description: String,
    pub up: fn(&Connection) -> Result<()>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub version: u32,
    pub description: String,
    pub applied: bool,
}

pub struct MigrationManager {
    migrations: BTreeMap<u32, Migration>,
}

impl MigrationManager {
    pub fn new() -> Self {
        let mut manager = Self {
            migrations: BTreeMap::new(),
        };
        manager.register_migrations();
        manager
    }

    fn register_migrations(&mut self) {
        self.add_migration(Migration {
            version: 1,
            description: "Collections, issue records and schema versions".to_string(),
            up: create_schema,
        });
    }

    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.insert(migration.version, migration);
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<u32> {
        if !Self::table_exists(conn, "schema_versions")? {
            return Ok(0);
        }

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_versions",
            [],
            |row| row.get::<_, u32>(0),
        )
    }

    pub fn migrate_to_latest(&self, conn: &Connection) -> Result<()> {
        let current_version = self.get_current_version(conn)?;

        if current_version >= SCHEMA_VERSION {
            info!("Database is already at version {}", current_version);
            return Ok(());
        }

        self.migrate_up(conn, current_version, SCHEMA_VERSION)
    }

    fn migrate_up(&self, conn: &Connection, from_version: u32, to_version: u32) -> Result<()> {
        info!(
            "Migrating database from version {} to {}",
            from_version, to_version
        );

        let tx = conn.unchecked_transaction()?;

        for version in (from_version + 1)..=to_version {
            let Some(migration) = self.migrations.get(&version) else {
                error!("Migration {} not found", version);
                return Err(rusqlite::Error::InvalidPath("Migration not found".into()));
            };

            info!("Applying migration {}: {}", version, migration.description);
            if let Err(e) = (migration.up)(conn) {
                error!("Failed to apply migration {}: {}", version, e);
                return Err(e);
            }

            conn.execute(
                "INSERT INTO schema_versions (version) VALUES (?1)",
                [version],
            )?;
        }

        tx.commit()?;
        info!("Database migration completed successfully");
        Ok(())
    }

    pub fn get_migration_status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let current_version = self.get_current_version(conn)?;

        Ok(self
            .migrations
            .values()
            .map(|migration| MigrationStatus {
                version: migration.version,
                description: migration.description.clone(),
                applied: migration.version <= current_version,
            })
            .collect())
    }

    pub fn validate_database(&self, conn: &Connection) -> Result<bool> {
        for table in REQUIRED_TABLES {
            if !Self::table_exists(conn, table)? {
                error!("Required table missing after migration: {}", table);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}
