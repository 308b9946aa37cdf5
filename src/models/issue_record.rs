use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar value attached to an issue record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Guess the scalar type of a raw string, as typed on the command line.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<bool>() {
            return MetadataValue::Bool(value);
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return MetadataValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return MetadataValue::Float(value);
            }
        }
        MetadataValue::Text(raw.to_string())
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

/// JSON has no NaN or infinity, so only finite floats convert.
impl TryFrom<f64> for MetadataValue {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() {
            Ok(MetadataValue::Float(value))
        } else {
            Err(format!("metadata float must be finite, got {value}"))
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Reject values that would serialize to JSON `null` and fail to load back.
pub fn validate_metadata(metadata: &Metadata) -> Result<(), String> {
    match metadata.iter().find(|(_, value)| match value {
        MetadataValue::Float(v) => !v.is_finite(),
        _ => false,
    }) {
        Some((key, value)) => Err(format!("metadata `{key}` must be a finite number, got {value}")),
        None => Ok(()),
    }
}

/// Parse a `key=value` pair into a metadata entry.
pub fn parse_metadata_pair(pair: &str) -> Result<(String, MetadataValue), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("Expected key=value, got `{pair}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Metadata key cannot be empty in `{pair}`"));
    }
    Ok((key.to_string(), MetadataValue::infer(value)))
}

/// A stored issue: its text, the vector it was indexed under and caller metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// One ranked hit returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarIssue {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// L2 distance to the query vector; smaller is closer.
    pub distance: f32,
}
