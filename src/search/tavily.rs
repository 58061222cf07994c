// Tavily search API client

use crate::config::SearchConfig;
use crate::models::{SearchResult, WebSearchResponse};
use crate::search::{SearchError, WebSearch};
use crate::utils::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct TavilyClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilyClient {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, TAVILY_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            max_retries: 1,
        }
    }

    /// Configure client from config
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        if config.tavily_api_key.is_empty() {
            return None;
        }
        Some(Self::new(&config.tavily_api_key))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn search_once(&self, query: &str, max_results: usize) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query,
                search_depth: "basic",
                max_results,
                include_answer: true,
            })
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!("Tavily returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }

        info!(query = %query, max_results, "Searching via Tavily");

        let raw = with_retry(
            || self.search_once(query, max_results),
            self.max_retries,
            Duration::from_millis(500),
            |e: &SearchError| matches!(e, SearchError::RequestFailed(_)),
        )
        .await?;

        let results: Vec<SearchResult> = raw
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
                published_date: r.published_date.filter(|d| !d.is_empty()),
            })
            .collect();

        info!(count = results.len(), "Tavily search completed");
        Ok(WebSearchResponse {
            answer: raw.answer.filter(|a| !a.trim().is_empty()),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_maps_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "api_key": "tvly-test",
                "query": "python tutorials",
                "max_results": 2,
                "include_answer": true
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"answer":"Start with the official tutorial.","results":[
                    {"title":"Python Docs","url":"https://docs.python.org","content":"The tutorial","score":0.98},
                    {"title":"Real Python","url":"https://realpython.com","content":"Guides","score":0.9,"published_date":""},
                    {"title":"Extra","url":"https://x.example","content":"x","score":0.1}
                ]}"#,
            )
            .create_async()
            .await;

        let client = TavilyClient::new_with_api_base("tvly-test", &server.url());
        let response = client.search("python tutorials", 2).await.unwrap();

        assert_eq!(response.answer.as_deref(), Some("Start with the official tutorial."));
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].title, "Python Docs");
        assert!(response.results[1].published_date.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_request_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = TavilyClient::new_with_api_base("tvly-test", &server.url()).with_max_retries(0);
        let err = client.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_key_is_unavailable() {
        let client = TavilyClient::new("");
        assert!(client.search("q", 5).await.unwrap_err().is_unavailable());
    }
}
