use async_trait::async_trait;
use issuematch::database::DatabaseManager;
use issuematch::models::{CollectionSpec, EmbeddingSignature, Metadata, MetadataValue};
use issuematch::services::embedding_service::{
    EmbeddingError, EmbeddingProvider, EmbeddingService, FallbackPolicy,
};
use issuematch::services::similarity_index::{RebuildPolicy, SimilarityIndex};
use issuematch::IndexError;
use std::sync::Arc;

/// Maps each issue to a fixed topic axis so nearest neighbours are predictable.
struct TopicEmbedder;

const TOPICS: [&str; 4] = ["internet", "billing", "password", "delivery"];

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                TOPICS
                    .iter()
                    .map(|topic| lower.matches(topic).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn signature(&self) -> EmbeddingSignature {
        EmbeddingSignature::new("topic-stub", TOPICS.len())
    }
}

fn open_index(db: &DatabaseManager) -> SimilarityIndex {
    let embedder = Arc::new(EmbeddingService::new(
        Arc::new(TopicEmbedder),
        FallbackPolicy::Strict,
    ));
    SimilarityIndex::open(
        db,
        embedder,
        CollectionSpec::new("customer_issues").with_description("Customer complaints and issues"),
        RebuildPolicy::Refuse,
    )
    .unwrap()
}

#[tokio::test]
async fn test_query_returns_inserted_issue_first() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);

    index
        .insert("T-100", "internet is down since morning", Metadata::new())
        .await
        .unwrap();
    index
        .insert("T-101", "billing shows a double charge", Metadata::new())
        .await
        .unwrap();

    let hits = index
        .query("internet is down since morning", 5)
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "T-100");
    assert!(hits[0].distance.abs() < 1e-6);
    assert!(hits[1].distance > hits[0].distance);
}

#[tokio::test]
async fn test_results_ranked_by_distance() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);

    let mut metadata = Metadata::new();
    metadata.insert("priority".to_string(), MetadataValue::from(2i64));

    index
        .insert("A", "password reset email never arrives", Metadata::new())
        .await
        .unwrap();
    index
        .insert("B", "internet drops, internet slow", metadata.clone())
        .await
        .unwrap();
    index
        .insert("C", "delivery late and billing wrong", Metadata::new())
        .await
        .unwrap();

    let hits = index.query("my internet keeps failing", 2).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "B");
    assert_eq!(hits[0].metadata, metadata);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn test_empty_collection_is_not_an_error() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);

    let hits = index.query("billing question", 5).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(index.count().unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_id_rejected_and_original_kept() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);

    index
        .insert("T-1", "billing error on invoice", Metadata::new())
        .await
        .unwrap();

    let result = index
        .insert("T-1", "delivery never came", Metadata::new())
        .await;
    match result {
        Err(IndexError::DuplicateId { collection, id }) => {
            assert_eq!(collection, "customer_issues");
            assert_eq!(id, "T-1");
        }
        other => panic!("Expected DuplicateId, got {other:?}"),
    }

    let stored = index.get("T-1").unwrap().unwrap();
    assert_eq!(stored.text, "billing error on invoice");
    assert_eq!(stored.vector, vec![0.0, 1.0, 0.0, 0.0]);
    assert_eq!(index.count().unwrap(), 1);
}

#[tokio::test]
async fn test_query_k_bounds() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);
    index
        .insert("T-1", "internet", Metadata::new())
        .await
        .unwrap();

    assert!(index.query("internet", 0).await.unwrap().is_empty());
    assert!(matches!(
        index.query("internet", 10_000).await,
        Err(IndexError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn test_stats_reports_signature_and_count() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let index = open_index(&db);
    index
        .insert("T-1", "delivery", Metadata::new())
        .await
        .unwrap();

    let stats = index.stats().unwrap();
    assert_eq!(stats.name, "customer_issues");
    assert_eq!(stats.model, "topic-stub");
    assert_eq!(stats.dimension, 4);
    assert_eq!(stats.description, "Customer complaints and issues");
    assert_eq!(stats.record_count, 1);
}
