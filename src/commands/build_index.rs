use std::time::Instant;

use anyhow::Result;
use tracing::info;

use crate::cli::BuildIndexArgs;
use crate::kb::{build_index_from_document, write_snapshot};
use crate::model::IndexBuildManifest;
use crate::util::{compact_utc_stamp, now_utc_string, sha256_file, write_json_pretty};

use super::context::{build_embedder, kb_settings};

pub fn run(args: BuildIndexArgs) -> Result<()> {
    let settings = kb_settings(&args.kb)?;
    let embedder = build_embedder(&args.kb)?;

    let started_at = now_utc_string();
    let started = Instant::now();
    let stamp = compact_utc_stamp();
    let run_id = format!("kb-index-{stamp}");

    // Unlike the lazy cache, an explicit build treats a missing document as fatal.
    let index = build_index_from_document(
        &settings.document_path,
        settings.window,
        embedder.as_ref(),
    )?;
    write_snapshot(&settings.snapshot_path, &index)?;

    let manifest = IndexBuildManifest {
        manifest_version: 1,
        run_id,
        generated_at: started_at,
        document_path: settings.document_path.display().to_string(),
        document_sha256: sha256_file(&settings.document_path)?,
        snapshot_path: settings.snapshot_path.display().to_string(),
        model_id: index.model_id().to_string(),
        embedding_backend: embedder.config().backend.clone(),
        embedding_dim: index.dimensions(),
        chunk_size: settings.window.size(),
        chunk_overlap: settings.window.overlap(),
        passage_count: index.len(),
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.kb
            .cache_root
            .join("manifests")
            .join(format!("kb_index_build_{stamp}.json"))
    });
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        snapshot = %settings.snapshot_path.display(),
        passages = manifest.passage_count,
        model_id = %manifest.model_id,
        "guideline index build completed"
    );
    Ok(())
}
