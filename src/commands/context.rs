use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{EmbedderKind, KbArgs, OpenFdaArgs};
use crate::dispatch::ToolClient;
use crate::fda::OpenFdaClient;
use crate::kb::{ChunkWindow, IndexCache, KbSettings};
use crate::semantic::{Embedder, LocalHashEmbedder, OpenAiEmbedder, SemanticModelConfig};

pub fn build_embedder(args: &KbArgs) -> Result<Arc<dyn Embedder>> {
    let model_id = args.model_id.as_deref();
    let embedder: Arc<dyn Embedder> = match args.embedder {
        EmbedderKind::LocalHash => Arc::new(LocalHashEmbedder::new(
            SemanticModelConfig::local_hash(model_id, args.embedding_dimensions),
        )),
        EmbedderKind::Openai => {
            let api_key = args.openai_api_key.as_deref().context(
                "--openai-api-key (or OPENAI_API_KEY) is required for the openai embedder",
            )?;
            Arc::new(OpenAiEmbedder::new(
                api_key,
                &args.openai_base_url,
                SemanticModelConfig::openai(model_id, args.embedding_dimensions),
                Duration::from_millis(args.embed_timeout_ms.max(1)),
            )?)
        }
    };

    info!(
        embedder = args.embedder.as_str(),
        model_id = %embedder.model_id(),
        dimensions = embedder.dimensions(),
        "embedding model selected"
    );
    Ok(embedder)
}

pub fn kb_settings(args: &KbArgs) -> Result<KbSettings> {
    let window = ChunkWindow::new(args.chunk_size, args.chunk_overlap)?;
    Ok(KbSettings {
        document_path: args.document.clone(),
        snapshot_path: args.resolved_snapshot_path(),
        window,
    })
}

pub fn open_index_cache(args: &KbArgs) -> Result<Arc<IndexCache>> {
    let settings = kb_settings(args)?;
    let embedder = build_embedder(args)?;
    Ok(Arc::new(IndexCache::new(settings, embedder)))
}

/// Tool-service client, or `None` when remote calls are switched off.
pub fn tool_client(endpoint: &str, timeout_ms: u64, no_remote: bool) -> Result<Option<ToolClient>> {
    if no_remote {
        debug!(%endpoint, "tool service disabled");
        return Ok(None);
    }
    ToolClient::new(endpoint, Duration::from_millis(timeout_ms.max(1))).map(Some)
}

pub fn openfda_client(args: &OpenFdaArgs) -> Result<Arc<OpenFdaClient>> {
    let client = OpenFdaClient::new(
        &args.openfda_base_url,
        Duration::from_millis(args.openfda_timeout_ms.max(1)),
    )?;
    Ok(Arc::new(client))
}
