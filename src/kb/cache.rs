use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::semantic::Embedder;

use super::chunking::ChunkWindow;
use super::index::{GuidelineIndex, build_index_from_document};
use super::snapshot::{read_snapshot, write_snapshot};

#[derive(Debug, Clone)]
pub struct KbSettings {
    pub document_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub window: ChunkWindow,
}

/// Outcome of the one-time knowledge-base initialization.
#[derive(Debug, Clone)]
pub enum KbState {
    Ready(Arc<GuidelineIndex>),
    Unavailable { reason: String },
}

impl KbState {
    pub fn index(&self) -> Option<&Arc<GuidelineIndex>> {
        match self {
            Self::Ready(index) => Some(index),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Lazily loads or builds the guideline index exactly once.
///
/// Concurrent first callers block on the same initialization; afterwards the state is
/// returned without touching storage and is never invalidated.
pub struct IndexCache {
    settings: KbSettings,
    embedder: Arc<dyn Embedder>,
    state: OnceLock<KbState>,
}

impl IndexCache {
    pub fn new(settings: KbSettings, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            settings,
            embedder,
            state: OnceLock::new(),
        }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn ensure_index(&self) -> &KbState {
        self.state.get_or_init(|| self.initialize())
    }

    fn initialize(&self) -> KbState {
        let snapshot_path = &self.settings.snapshot_path;
        match read_snapshot(snapshot_path) {
            Ok(Some(index)) if index.is_compatible_with(self.embedder()) => {
                info!(
                    path = %snapshot_path.display(),
                    passages = index.len(),
                    "loaded guideline index snapshot"
                );
                return KbState::Ready(Arc::new(index));
            }
            Ok(Some(index)) => warn!(
                path = %snapshot_path.display(),
                snapshot_model = %index.model_id(),
                snapshot_dimensions = index.dimensions(),
                model_id = %self.embedder.model_id(),
                dimensions = self.embedder.dimensions(),
                "snapshot was built with a different embedding model; rebuilding"
            ),
            Ok(None) => info!(path = %snapshot_path.display(), "no guideline index snapshot"),
            Err(err) => warn!(error = %err, "guideline index snapshot unreadable; rebuilding"),
        }

        let document_path = &self.settings.document_path;
        if !document_path.is_file() {
            warn!(
                path = %document_path.display(),
                "guideline document not found; guideline retrieval is unavailable"
            );
            return KbState::Unavailable {
                reason: format!("guideline document not found: {}", document_path.display()),
            };
        }

        let index = match build_index_from_document(
            document_path,
            self.settings.window,
            self.embedder(),
        ) {
            Ok(index) => index,
            Err(err) => {
                warn!(
                    error = %err,
                    "guideline index build failed; guideline retrieval is unavailable"
                );
                return KbState::Unavailable {
                    reason: err.to_string(),
                };
            }
        };

        if let Err(err) = write_snapshot(snapshot_path, &index) {
            warn!(error = %err, "failed to persist guideline index snapshot");
        }
        KbState::Ready(Arc::new(index))
    }
}
