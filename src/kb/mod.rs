mod cache;
mod chunking;
mod document;
mod index;
mod retriever;
mod snapshot;

pub use cache::{IndexCache, KbSettings};
pub use chunking::ChunkWindow;
pub use index::build_index_from_document;
pub use retriever::SemanticRetriever;
pub use snapshot::{read_snapshot_info, write_snapshot};
