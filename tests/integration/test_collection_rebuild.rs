use issuematch::database::{CollectionRepository, DatabaseManager};
use issuematch::models::{CollectionSpec, Metadata};
use issuematch::services::embedding_service::EmbeddingService;
use issuematch::services::similarity_index::{RebuildPolicy, SimilarityIndex};
use issuematch::IndexError;
use std::sync::Arc;
use tempfile::TempDir;

fn open(
    db: &DatabaseManager,
    dimension: usize,
    policy: RebuildPolicy,
) -> Result<SimilarityIndex, IndexError> {
    SimilarityIndex::open(
        db,
        Arc::new(EmbeddingService::offline(dimension)),
        CollectionSpec::new("customer_issues").with_description("Customer complaints and issues"),
        policy,
    )
}

async fn seed(db: &DatabaseManager) {
    let index = open(db, 8, RebuildPolicy::Refuse).unwrap();
    for (id, text) in [
        ("T-1", "internet down"),
        ("T-2", "double charge"),
        ("T-3", "parcel lost"),
    ] {
        index.insert(id, text, Metadata::new()).await.unwrap();
    }
}

#[tokio::test]
async fn test_dimension_change_refused_by_default() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::new(dir.path().join("issues.db")).unwrap();
    seed(&db).await;

    match open(&db, 16, RebuildPolicy::Refuse) {
        Err(IndexError::SignatureMismatch {
            collection,
            stored,
            requested,
        }) => {
            assert_eq!(collection, "customer_issues");
            assert_eq!(stored.dimension, 8);
            assert_eq!(requested.dimension, 16);
        }
        Err(other) => panic!("Expected SignatureMismatch, got {other:?}"),
        Ok(_) => panic!("Expected SignatureMismatch, got an open index"),
    }

    // Nothing was touched
    let index = open(&db, 8, RebuildPolicy::Refuse).unwrap();
    assert_eq!(index.count().unwrap(), 3);
    assert!(index.get("T-2").unwrap().is_some());
}

#[tokio::test]
async fn test_drop_and_recreate_removes_old_data_first() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::new(dir.path().join("issues.db")).unwrap();
    seed(&db).await;

    let index = open(&db, 16, RebuildPolicy::DropAndRecreate).unwrap();
    assert_eq!(index.signature().dimension, 16);
    assert_eq!(index.count().unwrap(), 0);
    assert!(index.get("T-1").unwrap().is_none());
    assert!(index.query("internet down", 5).await.unwrap().is_empty());
    assert_eq!(
        index.collection().description,
        "Customer complaints and issues"
    );

    // Previously used ids are free again and vectors have the new width
    index
        .insert("T-1", "internet down again", Metadata::new())
        .await
        .unwrap();
    assert_eq!(index.get("T-1").unwrap().unwrap().vector.len(), 16);

    let stored = CollectionRepository::new(&db)
        .get("customer_issues")
        .unwrap()
        .unwrap();
    assert_eq!(stored.signature, index.signature().clone());
}

#[tokio::test]
async fn test_rebuild_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("issues.db");

    {
        let db = DatabaseManager::new(&db_path).unwrap();
        seed(&db).await;
        let index = open(&db, 16, RebuildPolicy::DropAndRecreate).unwrap();
        drop(index);
        db.close().unwrap();
    }

    let db = DatabaseManager::new(&db_path).unwrap();
    let refused = open(&db, 8, RebuildPolicy::Refuse);
    assert!(refused.err().is_some_and(|e| e.is_signature_mismatch()));

    let index = open(&db, 16, RebuildPolicy::Refuse).unwrap();
    assert_eq!(index.count().unwrap(), 0);
}

#[tokio::test]
async fn test_explicit_rebuild_reports_dropped_records() {
    let db = DatabaseManager::open_in_memory().unwrap();
    seed(&db).await;

    let mut index = open(&db, 8, RebuildPolicy::Refuse).unwrap();
    assert_eq!(index.rebuild().unwrap(), 3);
    assert_eq!(index.count().unwrap(), 0);
    assert_eq!(index.signature().dimension, 8);
    index
        .insert("T-1", "internet down", Metadata::new())
        .await
        .unwrap();

    assert!(!CollectionRepository::new(&db)
        .has_residue("other_collection")
        .unwrap());
}
