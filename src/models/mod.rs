pub mod collection;
pub mod issue_record;

pub use collection::{
    vector_table_name, CollectionInfo, CollectionSpec, CollectionStats, EmbeddingSignature,
};
pub use issue_record::{
    parse_metadata_pair, validate_metadata, IssueRecord, Metadata, MetadataValue, SimilarIssue,
};
