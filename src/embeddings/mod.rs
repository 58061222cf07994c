//! Context retrieval
//!
//! Embeds a query and searches the document knowledge store for the
//! best-matching snippets. Ingestion and chunking happen elsewhere; this
//! module only reads.

pub mod embedder;
pub mod vector_search;

pub use embedder::EmbeddingClient;
pub use vector_search::VectorSearch;

use crate::models::ContextChunk;
use crate::types::AppResult;
use async_trait::async_trait;

/// `EmbedAndSearch`: ranked snippets for a query, best match first.
///
/// Returns an empty vector (not an error) when nothing clears the relevance
/// threshold; transport and model failures are `AppError::Retrieval`.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn embed_and_search(
        &self,
        query: &str,
        top_k: usize,
        doc_filter: Option<&str>,
    ) -> AppResult<Vec<ContextChunk>>;
}
