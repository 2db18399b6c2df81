use std::path::Path;

use tracing::{info, warn};

use crate::error::KbError;
use crate::model::Passage;
use crate::semantic::{Embedder, l2_distance};

use super::chunking::{ChunkWindow, chunk_text};
use super::document::load_document_text;

const EMBED_BATCH_SIZE: usize = 64;

/// Exhaustive L2 index over embedded guideline passages.
///
/// Vectors are stored row-major in one `f32` buffer; row `i` belongs to passage `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineIndex {
    model_id: String,
    dimensions: usize,
    passages: Vec<Passage>,
    vectors: Vec<f32>,
}

impl GuidelineIndex {
    pub fn from_parts(
        model_id: &str,
        dimensions: usize,
        passages: Vec<Passage>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, KbError> {
        if dimensions == 0 {
            return Err(KbError::Validation(
                "index dimensions must be positive".to_string(),
            ));
        }
        if passages.len() != vectors.len() {
            return Err(KbError::IndexBuild {
                chunk_index: passages.len().min(vectors.len()),
                reason: format!(
                    "{} passages but {} vectors",
                    passages.len(),
                    vectors.len()
                ),
            });
        }

        let mut flat = Vec::<f32>::with_capacity(passages.len() * dimensions);
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(KbError::IndexBuild {
                    chunk_index: position,
                    reason: format!(
                        "embedding has {} dimensions, expected {dimensions}",
                        vector.len()
                    ),
                });
            }
            flat.extend(vector);
        }

        Ok(Self {
            model_id: model_id.to_string(),
            dimensions,
            passages,
            vectors: flat,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.vectors.get(start..start + self.dimensions)
    }

    pub fn is_compatible_with(&self, embedder: &dyn Embedder) -> bool {
        self.model_id == embedder.model_id() && self.dimensions == embedder.dimensions()
    }

    /// Returns `(position, distance)` pairs for the `k` nearest vectors, nearest first.
    /// Equal distances keep passage order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || query.len() != self.dimensions {
            return Vec::new();
        }

        let mut scored = self
            .vectors
            .chunks_exact(self.dimensions)
            .map(|vector| l2_distance(query, vector))
            .enumerate()
            .collect::<Vec<(usize, f32)>>();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);
        scored
    }
}

/// Embeds every chunk and assembles the index; the first embedding failure aborts the build.
pub fn build_index(
    chunks: Vec<String>,
    embedder: &dyn Embedder,
) -> Result<GuidelineIndex, KbError> {
    let mut vectors = Vec::<Vec<f32>>::with_capacity(chunks.len());

    for (batch_number, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let offset = batch_number * EMBED_BATCH_SIZE;
        let inputs = batch.iter().map(String::as_str).collect::<Vec<&str>>();
        let embedded = embedder
            .embed_batch(&inputs)
            .map_err(|err| KbError::IndexBuild {
                chunk_index: offset,
                reason: format!("{err:#}"),
            })?;
        if embedded.len() != batch.len() {
            return Err(KbError::IndexBuild {
                chunk_index: offset,
                reason: format!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(embedded);
        info!(
            embedded = vectors.len(),
            total = chunks.len(),
            "embedded guideline batch"
        );
    }

    let passages = chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Passage { chunk_index, text })
        .collect::<Vec<Passage>>();

    GuidelineIndex::from_parts(
        embedder.model_id(),
        embedder.dimensions(),
        passages,
        vectors,
    )
}

pub fn build_index_from_document(
    document_path: &Path,
    window: ChunkWindow,
    embedder: &dyn Embedder,
) -> Result<GuidelineIndex, KbError> {
    info!(
        path = %document_path.display(),
        chunk_size = window.size(),
        chunk_overlap = window.overlap(),
        "building guideline index"
    );
    let text = load_document_text(document_path)?;
    let chunks = chunk_text(&text, window);
    let index = build_index(chunks, embedder)?;
    if index.is_empty() {
        warn!(path = %document_path.display(), "guideline document produced no passages");
    }
    info!(
        passages = index.len(),
        model_id = %index.model_id(),
        "built guideline index"
    );
    Ok(index)
}
