use serde::{Deserialize, Serialize};

/// Body of `POST {base_url}/embeddings` on an OpenAI-compatible gateway.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: Vec<String>) -> Self {
        Self {
            model: model.into(),
            input,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: Option<usize>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbeddingUsage {
    pub prompt_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl EmbeddingResponse {
    /// Vectors in input order.
    ///
    /// Items are placed by their `index` when the gateway sends one, otherwise
    /// in arrival order. The count must match the request and every vector
    /// must have `dimension` finite elements.
    pub fn into_vectors(self, expected: usize, dimension: usize) -> Result<Vec<Vec<f32>>, String> {
        if self.data.len() != expected {
            return Err(format!(
                "expected {expected} embeddings, gateway returned {}",
                self.data.len()
            ));
        }

        let indexed = self.data.iter().all(|item| item.index.is_some());
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

        for (position, item) in self.data.into_iter().enumerate() {
            let slot = if indexed {
                item.index.unwrap_or(position)
            } else {
                position
            };

            if slot >= expected {
                return Err(format!("embedding index {slot} is out of range"));
            }
            if slots[slot].is_some() {
                return Err(format!("embedding index {slot} appears twice"));
            }
            if item.embedding.len() != dimension {
                return Err(format!(
                    "embedding {slot} has {} dimensions, expected {dimension}",
                    item.embedding.len()
                ));
            }
            if item.embedding.iter().any(|v| !v.is_finite()) {
                return Err(format!("embedding {slot} contains non-finite values"));
            }

            slots[slot] = Some(item.embedding);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(slot, vector)| vector.ok_or_else(|| format!("embedding {slot} is missing")))
            .collect()
    }
}
