mod local;
mod openai;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use local::LocalHashEmbedder;
pub use openai::OpenAiEmbedder;

pub const DEFAULT_MODEL_ID: &str = "miniLM-L6-v2-local-hash-v1";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_DIM: usize = 1536;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub dimensions: usize,
    pub backend: String,
}

impl SemanticModelConfig {
    pub fn local_hash(model_id: Option<&str>, dimensions: Option<usize>) -> Self {
        Self {
            model_id: resolve_model_id(model_id, DEFAULT_MODEL_ID),
            dimensions: dimensions.unwrap_or(DEFAULT_EMBEDDING_DIM).max(8),
            backend: "local-hash-v1".to_string(),
        }
    }

    pub fn openai(model_id: Option<&str>, dimensions: Option<usize>) -> Self {
        Self {
            model_id: resolve_model_id(model_id, DEFAULT_OPENAI_MODEL),
            dimensions: dimensions.unwrap_or(DEFAULT_OPENAI_DIM),
            backend: "openai-compatible".to_string(),
        }
    }
}

fn resolve_model_id(model_id: Option<&str>, default: &str) -> String {
    match model_id.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default.to_string(),
    }
}

/// Maps text into the fixed-dimension `f32` space shared by the index and its queries.
pub trait Embedder: Send + Sync {
    fn config(&self) -> &SemanticModelConfig;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn model_id(&self) -> &str {
        &self.config().model_id
    }

    fn dimensions(&self) -> usize {
        self.config().dimensions
    }
}

/// Euclidean distance; mismatched lengths compare as infinitely far apart.
pub fn l2_distance(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() {
        return f32::INFINITY;
    }

    let squared = left
        .iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| {
            let delta = f64::from(*left_value) - f64::from(*right_value);
            delta * delta
        })
        .sum::<f64>();
    squared.sqrt() as f32
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
