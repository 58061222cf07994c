// Vector search against a Qdrant collection over its REST API

use crate::config::RetrievalConfig;
use crate::embeddings::{ContextRetriever, EmbeddingClient};
use crate::models::ContextChunk;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub struct VectorSearch {
    embedder: EmbeddingClient,
    client: Client,
    qdrant_url: String,
    collection: String,
    score_threshold: f32,
    timeout: Duration,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    score_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

#[derive(Deserialize, Default)]
struct ChunkPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    doc_id: Option<String>,
    #[serde(default)]
    chunk_id: Option<String>,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}

#[derive(Deserialize, Default)]
struct ChunkMetadata {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    section_title: Option<String>,
}

impl VectorSearch {
    pub fn new(embedder: EmbeddingClient, qdrant_url: &str, collection: &str) -> Self {
        Self {
            embedder,
            client: Client::new(),
            qdrant_url: qdrant_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            score_threshold: 0.5,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        let embedder = EmbeddingClient::new(&config.embedding_api_key, &config.embedding_model);
        Self::new(embedder, &config.qdrant_url, &config.qdrant_collection)
            .with_score_threshold(config.score_threshold)
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    async fn search_points(
        &self,
        vector: &[f32],
        top_k: usize,
        doc_filter: Option<&str>,
    ) -> AppResult<Vec<ScoredPoint>> {
        let filter = doc_filter.map(|doc_id| {
            serde_json::json!({
                "must": [{ "key": "doc_id", "match": { "value": doc_id } }]
            })
        });

        let url = format!(
            "{}/collections/{}/points/search",
            self.qdrant_url, self.collection
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&SearchRequest {
                vector,
                limit: top_k,
                with_payload: true,
                score_threshold: self.score_threshold,
                filter,
            })
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("vector search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Retrieval(format!(
                "vector store error ({}): {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse search response: {}", e)))?;

        Ok(parsed.result)
    }
}

fn point_to_chunk(point: ScoredPoint) -> ContextChunk {
    let payload = point.payload.unwrap_or_default();
    let metadata = payload.metadata.unwrap_or_default();

    let source_id = payload
        .chunk_id
        .or(payload.doc_id)
        .unwrap_or_else(|| match &point.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    ContextChunk {
        text: payload.text,
        score: point.score,
        source_id,
        page: payload.page,
        filename: metadata.filename,
        section_title: metadata.section_title,
    }
}

#[async_trait]
impl ContextRetriever for VectorSearch {
    async fn embed_and_search(
        &self,
        query: &str,
        top_k: usize,
        doc_filter: Option<&str>,
    ) -> AppResult<Vec<ContextChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        debug!(dimensions = vector.len(), "Query embedded");

        let points = self.search_points(&vector, top_k, doc_filter).await?;

        let mut chunks: Vec<ContextChunk> = points
            .into_iter()
            .map(point_to_chunk)
            .filter(|c| c.score >= self.score_threshold && !c.text.trim().is_empty())
            .collect();
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
        chunks.truncate(top_k);

        info!(
            count = chunks.len(),
            doc_filter = ?doc_filter,
            "Retrieved context chunks"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup(server: &mut mockito::ServerGuard) -> (VectorSearch, mockito::Mock) {
        let embed_mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.5,0.5]}]}"#)
            .create_async()
            .await;

        let embedder = EmbeddingClient::new_with_api_base("k", "text-embedding-ada-002", &server.url());
        let search =
            VectorSearch::new(embedder, &server.url(), "studybuddy_docs").with_score_threshold(0.5);
        (search, embed_mock)
    }

    #[tokio::test]
    async fn test_results_are_ranked_best_first() {
        let mut server = mockito::Server::new_async().await;
        let (search, _embed_mock) = setup(&mut server).await;

        let _search_mock = server
            .mock("POST", "/collections/studybuddy_docs/points/search")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "limit": 3,
                "filter": {"must": [{"key": "doc_id", "match": {"value": "doc-9"}}]}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"result":[
                    {"id":"a","score":0.61,"payload":{"text":"second","page":4,"doc_id":"doc-9"}},
                    {"id":"b","score":0.92,"payload":{"text":"first","page":2,"chunk_id":"doc-9_chunk_1",
                        "metadata":{"filename":"ml.pdf","section_title":"Intro"}}},
                    {"id":7,"score":0.55,"payload":{"text":"third"}}
                ],"status":"ok"}"#,
            )
            .create_async()
            .await;

        let chunks = search.embed_and_search("ml", 3, Some("doc-9")).await.unwrap();

        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(chunks[0].source_id, "doc-9_chunk_1");
        assert_eq!(chunks[0].filename.as_deref(), Some("ml.pdf"));
        assert_eq!(chunks[1].source_id, "doc-9");
        assert_eq!(chunks[2].source_id, "7");
    }

    #[tokio::test]
    async fn test_nothing_relevant_is_empty_not_error() {
        let mut server = mockito::Server::new_async().await;
        let (search, _embed_mock) = setup(&mut server).await;

        let _search_mock = server
            .mock("POST", "/collections/studybuddy_docs/points/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":[{"id":"x","score":0.2,"payload":{"text":"weak"}}]}"#)
            .create_async()
            .await;

        let chunks = search.embed_and_search("ml", 3, None).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_retrieval_error() {
        let mut server = mockito::Server::new_async().await;
        let (search, _embed_mock) = setup(&mut server).await;

        let _search_mock = server
            .mock("POST", "/collections/studybuddy_docs/points/search")
            .with_status(404)
            .with_body(r#"{"status":{"error":"Collection not found"}}"#)
            .create_async()
            .await;

        let err = search.embed_and_search("ml", 3, None).await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(ref m) if m.contains("404")));
    }
}
