use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::time::Duration;
use tracing::{debug, error, info};

use super::error::DatabaseError;
use super::migrations::{MigrationManager, MigrationStatus};

/// Registers sqlite-vec with every connection opened by this process.
fn register_vector_extension() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point exported by
        // sqlite-vec with the signature sqlite3_auto_extension expects.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

/// Owns the single SQLite connection backing the vector index.
///
/// Clones share the connection; the mutex makes the store single-writer.
#[derive(Debug)]
pub struct DatabaseManager {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseManager {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        register_vector_extension();

        let connection = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|source| DatabaseError::Open {
            path: db_path.clone(),
            source,
        })?;

        connection.execute("PRAGMA foreign_keys = ON", [])?;
        // PRAGMAs that report their new value have to be consumed as queries
        for pragma in [
            "PRAGMA journal_mode = WAL",
            "PRAGMA synchronous = NORMAL",
            "PRAGMA cache_size = -16000",
            "PRAGMA temp_store = memory",
        ] {
            connection
                .prepare(pragma)?
                .query_map([], |_| Ok(()))?
                .for_each(drop);
        }

        let manager = Self {
            db_path,
            connection: Arc::new(Mutex::new(connection)),
        };

        manager.run_migrations()?;

        info!("Database initialized at: {}", manager.db_path.display());
        Ok(manager)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        register_vector_extension();

        let connection = Connection::open_in_memory().map_err(|source| DatabaseError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        connection.execute("PRAGMA foreign_keys = ON", [])?;

        let manager = Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(connection)),
        };

        manager.run_migrations()?;

        debug!("In-memory database initialized");
        Ok(manager)
    }

    fn run_migrations(&self) -> Result<(), DatabaseError> {
        let migration_manager = MigrationManager::new();
        let conn = self.lock()?;

        migration_manager
            .migrate_to_latest(&conn)
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        if !migration_manager.validate_database(&conn)? {
            return Err(DatabaseError::Migration(
                "Database validation failed after migration".to_string(),
            ));
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)
    }

    pub fn with_connection<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Connection) -> Result<R, E>,
        E: From<DatabaseError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    pub fn with_transaction<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Connection) -> Result<R, E>,
        E: From<DatabaseError> + From<rusqlite::Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!("Failed to rollback transaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Version string reported by the loaded sqlite-vec extension.
    pub fn vector_extension_version(&self) -> Result<String, DatabaseError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(|e| DatabaseError::VectorExtension(e.to_string()))
        })
    }

    pub fn migration_status(&self) -> Result<Vec<MigrationStatus>, DatabaseError> {
        self.with_connection(|conn| Ok(MigrationManager::new().get_migration_status(conn)?))
    }

    pub fn check_integrity(&self) -> Result<bool, DatabaseError> {
        self.with_connection(|conn| {
            let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            Ok(result == "ok")
        })
    }

    /// Copy the whole database to `backup_path` with SQLite's online backup API.
    pub fn backup_to_file(&self, backup_path: impl AsRef<Path>) -> Result<(), DatabaseError> {
        let backup_path = backup_path.as_ref();

        if let Some(parent) = backup_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = self.lock()?;
        let mut backup_conn =
            Connection::open(backup_path).map_err(|source| DatabaseError::Open {
                path: backup_path.to_path_buf(),
                source,
            })?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut backup_conn)?;
        backup.run_to_completion(5, Duration::from_millis(250), None)?;

        info!("Database backed up to: {}", backup_path.display());
        Ok(())
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Close the connection if this is the last handle to it.
    pub fn close(self) -> Result<(), DatabaseError> {
        let path = self.db_path;
        match Arc::try_unwrap(self.connection) {
            Ok(mutex) => {
                let connection = mutex.into_inner().map_err(|_| DatabaseError::LockPoisoned)?;
                connection.close().map_err(|(_, e)| DatabaseError::Sqlite(e))?;
                info!("Database closed: {}", path.display());
            }
            Err(_) => {
                debug!(
                    "Database handle released, connection still shared: {}",
                    path.display()
                );
            }
        }
        Ok(())
    }
}

impl Clone for DatabaseManager {
    fn clone(&self) -> Self {
        Self {
            db_path: self.db_path.clone(),
            connection: Arc::clone(&self.connection),
        }
    }
}
