// In-process collaborators for unit tests

use crate::agents::PlanSynthesizer;
use crate::embeddings::ContextRetriever;
use crate::llm::TextGenerator;
use crate::models::{ContextChunk, PlanPreferences, SearchResult, StudyPlan, WebSearchResponse};
use crate::search::{SearchError, WebSearch};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Mutex;

pub(crate) fn chunk(text: &str, score: f32, page: Option<u32>) -> ContextChunk {
    ContextChunk {
        text: text.to_string(),
        score,
        source_id: "doc-1".to_string(),
        page,
        filename: Some("notes.pdf".to_string()),
        section_title: None,
    }
}

pub(crate) fn result(title: &str, url: &str, content: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
        score: 0.9,
        published_date: None,
    }
}

/// Generator that always returns the same reply (or the same error).
pub(crate) struct ScriptedGenerator {
    reply: Result<String, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(system_prompt, user_prompt)` pair received so far.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete_text(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.reply.clone().map_err(AppError::Generation)
    }
}

pub(crate) struct FakeRetriever {
    result: Result<Vec<ContextChunk>, String>,
    calls: Mutex<Vec<(String, usize, Option<String>)>>,
}

impl FakeRetriever {
    pub(crate) fn returning(chunks: Vec<ContextChunk>) -> Self {
        Self {
            result: Ok(chunks),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(query, top_k, doc_filter)` per call.
    pub(crate) fn calls(&self) -> Vec<(String, usize, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextRetriever for FakeRetriever {
    async fn embed_and_search(
        &self,
        query: &str,
        top_k: usize,
        doc_filter: Option<&str>,
    ) -> AppResult<Vec<ContextChunk>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), top_k, doc_filter.map(String::from)));
        self.result.clone().map_err(AppError::Retrieval)
    }
}

pub(crate) enum SearchOutcome {
    Found(WebSearchResponse),
    Unavailable,
    Failing(String),
}

pub(crate) struct FakeSearch {
    outcome: SearchOutcome,
}

impl FakeSearch {
    pub(crate) fn found(results: Vec<SearchResult>, answer: Option<&str>) -> Self {
        Self {
            outcome: SearchOutcome::Found(WebSearchResponse {
                answer: answer.map(String::from),
                results,
            }),
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            outcome: SearchOutcome::Unavailable,
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: SearchOutcome::Failing(message.to_string()),
        }
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<WebSearchResponse, SearchError> {
        match &self.outcome {
            SearchOutcome::Found(response) => {
                let mut response = response.clone();
                response.results.truncate(max_results);
                Ok(response)
            }
            SearchOutcome::Unavailable => Err(SearchError::NoApiKey),
            SearchOutcome::Failing(message) => Err(SearchError::RequestFailed(message.clone())),
        }
    }
}

pub(crate) enum PlannerOutcome {
    Plan(StudyPlan),
    Unparseable(String),
    Failing(String),
}

pub(crate) struct FakePlanner {
    outcome: PlannerOutcome,
    calls: Mutex<Vec<(String, usize, Option<PlanPreferences>)>>,
}

impl FakePlanner {
    pub(crate) fn new(outcome: PlannerOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn titled(title: &str) -> Self {
        Self::new(PlannerOutcome::Plan(StudyPlan {
            title: title.to_string(),
            overview: "Core ideas, then practice".to_string(),
            duration: "4 weeks".to_string(),
            difficulty: "Intermediate".to_string(),
            ..Default::default()
        }))
    }

    /// `(topic, snippet count, preferences)` per call.
    pub(crate) fn calls(&self) -> Vec<(String, usize, Option<PlanPreferences>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanSynthesizer for FakePlanner {
    async fn synthesize_plan(
        &self,
        topic: &str,
        context: &[ContextChunk],
        preferences: Option<&PlanPreferences>,
    ) -> AppResult<StudyPlan> {
        self.calls
            .lock()
            .unwrap()
            .push((topic.to_string(), context.len(), preferences.cloned()));
        match &self.outcome {
            PlannerOutcome::Plan(plan) => Ok(plan.clone()),
            PlannerOutcome::Unparseable(raw) => Err(AppError::PlanParse {
                reason: "expected value at line 1 column 1".to_string(),
                raw: raw.clone(),
            }),
            PlannerOutcome::Failing(message) => Err(AppError::Generation(message.clone())),
        }
    }
}

/// Collaborator that panics on every call.
pub(crate) struct Panicking;

#[async_trait]
impl ContextRetriever for Panicking {
    async fn embed_and_search(&self, _: &str, _: usize, _: Option<&str>) -> AppResult<Vec<ContextChunk>> {
        panic!("retriever exploded")
    }
}

#[async_trait]
impl WebSearch for Panicking {
    async fn search(&self, _: &str, _: usize) -> Result<WebSearchResponse, SearchError> {
        panic!("search exploded")
    }
}

#[async_trait]
impl PlanSynthesizer for Panicking {
    async fn synthesize_plan(
        &self,
        _: &str,
        _: &[ContextChunk],
        _: Option<&PlanPreferences>,
    ) -> AppResult<StudyPlan> {
        panic!("planner exploded")
    }
}

#[async_trait]
impl TextGenerator for Panicking {
    async fn complete_text(&self, _: &str, _: &str) -> AppResult<String> {
        panic!("generator exploded")
    }
}
