//! SerpAPI Client
//!
//! Google Light search through SerpAPI: a fast, lightweight engine that
//! returns organic results with title, snippet and link. SerpAPI exposes no
//! relevance score, so results are scored by rank (1.0 for the first hit,
//! decreasing linearly).

use crate::config::SearchConfig;
use crate::models::{SearchResult, WebSearchResponse};
use crate::search::{SearchError, WebSearch};
use async_trait::async_trait;
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use tracing::{debug, info};

/// SerpAPI client for general web search
pub struct SerpApiClient {
    api_key: String,
    max_results: usize,
}

impl SerpApiClient {
    /// Configure client from config
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        if config.serpapi_key.is_empty() {
            return None;
        }

        Some(Self {
            api_key: config.serpapi_key.clone(),
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl WebSearch for SerpApiClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }

        let limit = max_results.min(self.max_results).max(1);
        info!(query = %query, limit, "Searching Google Light via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_light".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), limit.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());

        let raw = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw Light response received");

        let response = parse_light_response(&raw, limit)?;
        info!(count = response.results.len(), "Google Light search completed");
        Ok(response)
    }
}

/// Map a Google Light JSON payload onto ranked results.
fn parse_light_response(raw: &Value, limit: usize) -> Result<WebSearchResponse, SearchError> {
    if let Some(error) = raw.get("error").and_then(|v| v.as_str()) {
        return Err(SearchError::RequestFailed(error.to_string()));
    }

    let organic = match raw.get("organic_results") {
        Some(v) => v
            .as_array()
            .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?,
        None => return Ok(WebSearchResponse::default()),
    };

    let taken: Vec<&Value> = organic.iter().take(limit).collect();
    let total = taken.len().max(1) as f32;

    let results = taken
        .into_iter()
        .enumerate()
        .map(|(rank, result)| {
            let field = |name: &str| {
                result
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };

            let title = Some(field("title"))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            SearchResult {
                title,
                url: field("link"),
                content: field("snippet"),
                score: 1.0 - rank as f32 / total,
                published_date: result.get("date").and_then(|v| v.as_str()).map(String::from),
            }
        })
        .collect();

    let answer = raw
        .get("answer_box")
        .and_then(|b| b.get("answer").or_else(|| b.get("snippet")))
        .and_then(|v| v.as_str())
        .map(String::from);

    Ok(WebSearchResponse { answer, results })
}
