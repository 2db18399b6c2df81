use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::RetrievalHit;

use super::cache::{IndexCache, KbState};

/// Top-k semantic search over the cached guideline index.
#[derive(Clone)]
pub struct SemanticRetriever {
    cache: Arc<IndexCache>,
}

impl SemanticRetriever {
    pub fn new(cache: Arc<IndexCache>) -> Self {
        Self { cache }
    }

    /// Returns at most `k` hits, nearest first; an unavailable index yields no hits.
    pub fn search(&self, query: &str, k: usize) -> Vec<RetrievalHit> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Vec::new();
        }

        if !self.cache.is_initialized() {
            debug!("first guideline search initializes the index");
        }
        let index = match self.cache.ensure_index() {
            KbState::Ready(index) => index,
            KbState::Unavailable { reason } => {
                debug!(%reason, "guideline index unavailable; returning no hits");
                return Vec::new();
            }
        };

        let query_vector = match self.cache.embedder().embed(query) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to embed guideline query");
                return Vec::new();
            }
        };

        let passages = index.passages();
        index
            .nearest(&query_vector, k)
            .into_iter()
            .enumerate()
            .map(|(rank, (position, distance))| RetrievalHit {
                rank,
                chunk_index: passages[position].chunk_index,
                distance,
                passage: passages[position].text.clone(),
            })
            .collect()
    }
}
