use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::connection::DatabaseManager;
use crate::error::IndexError;
use crate::models::{vector_table_name, CollectionInfo, CollectionSpec, EmbeddingSignature};

pub(crate) fn parse_datetime(datetime_str: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite's own datetime('now') format
    if let Ok(naive_dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive_dt.and_utc());
    }

    DateTime::parse_from_rfc3339(datetime_str).map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn ensure_valid_name(name: &str) -> Result<(), IndexError> {
    if CollectionSpec::is_valid_name(name) {
        Ok(())
    } else {
        Err(IndexError::InvalidCollectionName {
            name: name.to_string(),
        })
    }
}

/// Collection metadata plus the lifecycle of each collection's vec0 table.
#[derive(Clone)]
pub struct CollectionRepository {
    db: DatabaseManager,
}

impl CollectionRepository {
    pub fn new(db: &DatabaseManager) -> Self {
        Self { db: db.clone() }
    }

    pub fn get(&self, name: &str) -> Result<Option<CollectionInfo>, IndexError> {
        ensure_valid_name(name)?;

        let row = self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT name, model, dimension, description, created_at
                 FROM collections WHERE name = ?1",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(IndexError::from)
        })?;

        let Some((name, model, dimension, description, created_at)) = row else {
            return Ok(None);
        };

        let dimension = usize::try_from(dimension).map_err(|_| IndexError::Corrupt {
            message: format!("collection `{name}` has invalid dimension {dimension}"),
        })?;
        let created_at = parse_datetime(&created_at).map_err(|e| IndexError::Corrupt {
            message: format!("collection `{name}` has invalid created_at: {e}"),
        })?;

        Ok(Some(CollectionInfo {
            name,
            signature: EmbeddingSignature { model, dimension },
            description,
            created_at,
        }))
    }

    /// Register the collection and create its vector table in one transaction.
    pub fn create(
        &self,
        spec: &CollectionSpec,
        signature: &EmbeddingSignature,
    ) -> Result<CollectionInfo, IndexError> {
        ensure_valid_name(&spec.name)?;
        if signature.dimension == 0 {
            return Err(IndexError::InvalidArgument {
                message: "embedding dimension must be greater than zero".to_string(),
            });
        }

        let info = CollectionInfo {
            name: spec.name.clone(),
            signature: signature.clone(),
            description: spec.description.clone(),
            created_at: Utc::now(),
        };

        self.db.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO collections (name, model, dimension, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    info.name,
                    info.signature.model,
                    info.signature.dimension as i64,
                    info.description,
                    info.created_at.to_rfc3339(),
                ],
            )?;
            conn.execute(
                &format!(
                    "CREATE VIRTUAL TABLE \"{}\" USING vec0(embedding float[{}])",
                    vector_table_name(&info.name),
                    info.signature.dimension
                ),
                [],
            )?;
            Ok::<_, IndexError>(())
        })?;

        info!(
            collection = %info.name,
            signature = %info.signature,
            "Created collection"
        );
        Ok(info)
    }

    /// Drop every record, the vector table and the metadata row.
    ///
    /// Returns the number of records removed. Missing collections are a no-op.
    pub fn delete(&self, name: &str) -> Result<usize, IndexError> {
        ensure_valid_name(name)?;

        let removed = self.db.with_transaction(|conn| {
            let removed = conn.execute("DELETE FROM issue_records WHERE collection = ?1", [name])?;
            conn.execute(
                &format!("DROP TABLE IF EXISTS \"{}\"", vector_table_name(name)),
                [],
            )?;
            conn.execute("DELETE FROM collections WHERE name = ?1", [name])?;
            Ok::<_, IndexError>(removed)
        })?;

        if removed > 0 {
            warn!(
                collection = name,
                records = removed,
                "Deleted collection and all of its vectors"
            );
        } else {
            info!(collection = name, "Deleted empty collection");
        }
        Ok(removed)
    }

    /// Whether the collection row, its records or its vector table still exist.
    pub fn has_residue(&self, name: &str) -> Result<bool, IndexError> {
        ensure_valid_name(name)?;

        self.db.with_connection(|conn| {
            let rows: i64 = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM collections WHERE name = ?1)
                  + (SELECT COUNT(*) FROM issue_records WHERE collection = ?1)
                  + (SELECT COUNT(*) FROM sqlite_master WHERE name = ?2)",
                params![name, vector_table_name(name)],
                |row| row.get(0),
            )?;
            Ok(rows > 0)
        })
    }
}
