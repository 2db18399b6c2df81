use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::kb::SemanticRetriever;
use crate::server::{self, ToolService};

use super::context::{open_index_cache, openfda_client};

pub fn run(args: ServeArgs) -> Result<()> {
    // Blocking HTTP clients must be created outside the async runtime.
    let cache = open_index_cache(&args.kb)?;
    let labels = openfda_client(&args.openfda)?;

    if args.warm {
        match cache.ensure_index().index() {
            Some(index) => info!(passages = index.len(), "guideline index warmed"),
            None => warn!("serving without guideline index"),
        }
    }

    let service = Arc::new(ToolService::new(SemanticRetriever::new(cache), labels));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::serve(&args.bind, service))
}
