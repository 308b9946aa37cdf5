use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::collection_repo::{ensure_valid_name, parse_datetime};
use super::connection::DatabaseManager;
use crate::error::IndexError;
use crate::models::{
    validate_metadata, vector_table_name, CollectionInfo, EmbeddingSignature, IssueRecord,
    Metadata, SimilarIssue,
};

/// Largest `k` sqlite-vec accepts for a KNN query.
pub const MAX_QUERY_K: usize = 4096;

/// Little-endian f32 blob, the layout vec0 expects for `float[N]` columns.
pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, IndexError> {
    if bytes.len() % 4 != 0 {
        return Err(IndexError::Corrupt {
            message: format!("vector blob of {} bytes is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn check_dimension(collection: &CollectionInfo, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != collection.signature.dimension {
        return Err(IndexError::DimensionMismatch {
            expected: collection.signature.dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// The collection row may have been recreated by another handle or process
/// since `collection` was loaded; refuse to touch vectors built for another
/// embedder.
fn ensure_current_signature(
    conn: &Connection,
    collection: &CollectionInfo,
) -> Result<(), IndexError> {
    let stored = conn
        .query_row(
            "SELECT model, dimension FROM collections WHERE name = ?1",
            [&collection.name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    let Some((model, dimension)) = stored else {
        return Err(IndexError::CollectionNotFound {
            name: collection.name.clone(),
        });
    };
    let dimension = usize::try_from(dimension).map_err(|_| IndexError::Corrupt {
        message: format!(
            "collection `{}` has invalid dimension {dimension}",
            collection.name
        ),
    })?;

    let stored = EmbeddingSignature { model, dimension };
    if stored != collection.signature {
        return Err(IndexError::SignatureMismatch {
            collection: collection.name.clone(),
            stored,
            requested: collection.signature.clone(),
        });
    }
    Ok(())
}

/// Issue text + metadata rows and their vectors in the collection's vec0 table.
#[derive(Clone)]
pub struct IssueRepository {
    db: DatabaseManager,
}

impl IssueRepository {
    pub fn new(db: &DatabaseManager) -> Self {
        Self { db: db.clone() }
    }

    /// Store one issue. Existing ids are rejected and left untouched.
    pub fn insert(
        &self,
        collection: &CollectionInfo,
        issue_id: &str,
        text: &str,
        metadata: &Metadata,
        vector: &[f32],
    ) -> Result<(), IndexError> {
        ensure_valid_name(&collection.name)?;
        check_dimension(collection, vector)?;
        validate_metadata(metadata).map_err(|message| IndexError::InvalidArgument { message })?;

        let metadata_json = serde_json::to_string(metadata)?;
        let blob = encode_vector(vector);
        let vector_table = vector_table_name(&collection.name);

        self.db.with_transaction(|conn| {
            ensure_current_signature(conn, collection)?;

            let exists = conn
                .query_row(
                    "SELECT 1 FROM issue_records WHERE collection = ?1 AND issue_id = ?2",
                    params![collection.name, issue_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Err(IndexError::DuplicateId {
                    collection: collection.name.clone(),
                    id: issue_id.to_string(),
                });
            }

            conn.execute(
                "INSERT INTO issue_records (collection, issue_id, text, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    collection.name,
                    issue_id,
                    text,
                    metadata_json,
                    Utc::now().to_rfc3339()
                ],
            )?;
            let row_id = conn.last_insert_rowid();

            conn.execute(
                &format!("INSERT INTO \"{vector_table}\" (rowid, embedding) VALUES (?1, ?2)"),
                params![row_id, blob],
            )?;
            Ok(())
        })
    }

    pub fn get(
        &self,
        collection: &CollectionInfo,
        issue_id: &str,
    ) -> Result<Option<IssueRecord>, IndexError> {
        ensure_valid_name(&collection.name)?;
        let vector_table = vector_table_name(&collection.name);

        let row = self.db.with_connection(|conn| {
            conn.query_row(
                &format!(
                    "SELECT r.issue_id, r.text, r.metadata, r.created_at, v.embedding
                     FROM issue_records r
                     JOIN \"{vector_table}\" v ON v.rowid = r.id
                     WHERE r.collection = ?1 AND r.issue_id = ?2"
                ),
                params![collection.name, issue_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(IndexError::from)
        })?;

        let Some((id, text, metadata, created_at, embedding)) = row else {
            return Ok(None);
        };

        Ok(Some(IssueRecord {
            created_at: parse_datetime(&created_at).map_err(|e| IndexError::Corrupt {
                message: format!("issue `{id}` has invalid created_at: {e}"),
            })?,
            metadata: serde_json::from_str(&metadata)?,
            vector: decode_vector(&embedding)?,
            id,
            text,
        }))
    }

    /// The `k` nearest records to `vector`, closest first.
    pub fn search(
        &self,
        collection: &CollectionInfo,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarIssue>, IndexError> {
        ensure_valid_name(&collection.name)?;
        check_dimension(collection, vector)?;
        if k > MAX_QUERY_K {
            return Err(IndexError::InvalidArgument {
                message: format!("k must be at most {MAX_QUERY_K}, got {k}"),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector_table = vector_table_name(&collection.name);
        let blob = encode_vector(vector);

        let rows = self.db.with_connection(|conn| {
            ensure_current_signature(conn, collection)?;

            let mut stmt = conn.prepare(&format!(
                "WITH knn AS (
                    SELECT rowid, distance FROM \"{vector_table}\"
                    WHERE embedding MATCH ?1 AND k = ?2
                 )
                 SELECT r.issue_id, r.text, r.metadata, knn.distance
                 FROM knn
                 JOIN issue_records r ON r.id = knn.rowid
                 ORDER BY knn.distance ASC, r.id ASC"
            ))?;

            let rows = stmt
                .query_map(params![blob, k as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, IndexError>(rows)
        })?;

        rows.into_iter()
            .map(|(id, text, metadata, distance)| {
                Ok(SimilarIssue {
                    id,
                    text,
                    metadata: serde_json::from_str(&metadata)?,
                    distance: distance as f32,
                })
            })
            .collect()
    }

    pub fn count(&self, collection: &str) -> Result<usize, IndexError> {
        ensure_valid_name(collection)?;

        let count: i64 = self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM issue_records WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )
            .map_err(IndexError::from)
        })?;
        Ok(count.max(0) as usize)
    }
}
