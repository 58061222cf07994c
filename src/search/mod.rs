//! Search Module
//!
//! Web search for the `search` intent. Two providers are supported:
//! - Tavily (default) - search API with an optional synthesized answer
//! - SerpAPI Google Light - lightweight Google results
//!
//! A provider without a configured key is not an error at startup; every
//! call reports `SearchError::NoApiKey` instead.

pub mod serpapi;
pub mod tavily;

pub use serpapi::SerpApiClient;
pub use tavily::TavilyClient;

use crate::config::SearchConfig;
use crate::models::WebSearchResponse;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

impl SearchError {
    /// True for the expected "no provider configured" condition.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SearchError::NoApiKey)
    }
}

/// `WebSearch`: provider-ranked results for a query.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<WebSearchResponse, SearchError>;
}

/// Stand-in used when no provider key is configured.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<WebSearchResponse, SearchError> {
        Err(SearchError::NoApiKey)
    }
}

/// Pick the configured provider.
pub fn from_config(config: &SearchConfig) -> Arc<dyn WebSearch> {
    match config.provider.as_str() {
        "serpapi" => match SerpApiClient::from_config(config) {
            Some(client) => Arc::new(client),
            None => {
                warn!("SerpAPI key not provided, search functionality disabled");
                Arc::new(DisabledSearch)
            }
        },
        other => {
            if other != "tavily" {
                warn!(provider = %other, "Unknown search provider, using Tavily");
            }
            match TavilyClient::from_config(config) {
                Some(client) => Arc::new(client),
                None => {
                    warn!("Tavily API key not provided, search functionality disabled");
                    Arc::new(DisabledSearch)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, tavily: &str, serpapi: &str) -> SearchConfig {
        SearchConfig {
            provider: provider.to_string(),
            tavily_api_key: tavily.to_string(),
            serpapi_key: serpapi.to_string(),
            max_results: 5,
        }
    }

    #[tokio::test]
    async fn test_missing_key_reports_unavailable() {
        let search = from_config(&config("tavily", "", ""));
        let err = search.search("rust", 5).await.unwrap_err();
        assert!(err.is_unavailable());

        let search = from_config(&config("serpapi", "tvly-key", ""));
        assert!(search.search("rust", 5).await.unwrap_err().is_unavailable());
    }

    #[test]
    fn test_request_failure_is_not_unavailable() {
        assert!(!SearchError::RequestFailed("timeout".into()).is_unavailable());
    }
}
