use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::kb::read_snapshot_info;

use super::context::build_embedder;

pub fn run(args: StatusArgs) -> Result<()> {
    let document_path = &args.kb.document;
    let snapshot_path = args.kb.resolved_snapshot_path();

    info!(cache_root = %args.kb.cache_root.display(), "status requested");

    if document_path.is_file() {
        info!(path = %document_path.display(), "guideline document present");
    } else {
        warn!(path = %document_path.display(), "guideline document missing");
    }

    match read_snapshot_info(&snapshot_path) {
        Ok(Some(snapshot)) => {
            let embedder = build_embedder(&args.kb)?;
            let compatible = snapshot.model_id == embedder.model_id()
                && snapshot.dimensions == embedder.dimensions();
            info!(
                path = %snapshot_path.display(),
                model_id = %snapshot.model_id,
                dimensions = snapshot.dimensions,
                passages = snapshot.passage_count,
                built_at = %snapshot.built_at,
                compatible,
                "guideline index snapshot"
            );
            if !compatible {
                warn!(
                    model_id = %embedder.model_id(),
                    dimensions = embedder.dimensions(),
                    "snapshot will be rebuilt on first use with the configured embedder"
                );
            }
        }
        Ok(None) => warn!(path = %snapshot_path.display(), "guideline index snapshot missing"),
        Err(err) => warn!(error = %err, "guideline index snapshot unreadable"),
    }

    Ok(())
}
