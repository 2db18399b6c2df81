use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{Embedder, SemanticModelConfig};

/// Offline embedder that feature-hashes words and word bigrams into a unit vector.
///
/// Output only depends on the input text and the dimension, so vectors written to a
/// snapshot stay comparable with query vectors computed by a later process.
#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    config: SemanticModelConfig,
}

impl LocalHashEmbedder {
    pub fn new(config: SemanticModelConfig) -> Self {
        Self { config }
    }
}

impl Embedder for LocalHashEmbedder {
    fn config(&self) -> &SemanticModelConfig {
        &self.config
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_text_local(text, self.config.dimensions))
    }
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0_f32; dimensions.max(8)];
    let words = normalized_words(payload);

    let unigrams = words.iter().map(|word| format!("w:{word}"));
    let bigrams = words
        .windows(2)
        .map(|pair| format!("b:{}_{}", pair[0], pair[1]));
    for feature in unigrams.chain(bigrams) {
        let (bucket, value) = hashed_feature(&feature, vector.len());
        vector[bucket] += value;
    }

    let norm = vector
        .iter()
        .map(|value| f64::from(*value).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        let norm = norm as f32;
        vector.iter_mut().for_each(|value| *value /= norm);
    }
    vector
}

/// Bucket index and a signed weight in `[1, 2]`, both taken from the feature's SHA-256.
fn hashed_feature(feature: &str, buckets: usize) -> (usize, f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[..8]);

    let bucket = (u64::from_le_bytes(head) % buckets as u64) as usize;
    let magnitude = 1.0 + f32::from(digest[8]) / 255.0;
    let value = if digest[9] & 1 == 0 {
        magnitude
    } else {
        -magnitude
    };
    (bucket, value)
}

/// Lower-cased words with everything but letters and digits stripped.
fn normalized_words(payload: &str) -> Vec<String> {
    payload
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|character| character.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::l2_distance;

    #[test]
    fn embedding_is_deterministic_and_unit_length() {
        let first = embed_text_local("Malaria treatment with artemether", 64);
        let second = embed_text_local("malaria   TREATMENT with artemether!", 64);
        assert_eq!(first, second);

        let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_payload_embeds_to_zero_vector() {
        let vector = embed_text_local("  \n ", 16);
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn related_text_is_closer_than_unrelated_text() {
        let query = embed_text_local("dosage of amoxicillin for pneumonia", 384);
        let related = embed_text_local("amoxicillin dosage in community acquired pneumonia", 384);
        let unrelated = embed_text_local("burn wound dressing and skin grafting", 384);
        assert!(l2_distance(&query, &related) < l2_distance(&query, &unrelated));
    }
}
