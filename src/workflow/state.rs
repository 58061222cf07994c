// Per-query workflow state and the records it accumulates

use crate::models::{ContextChunk, PlanPreferences, SearchResult, SourceCitation, StudyPlan};
use crate::types::{AppError, AppResult};
use crate::workflow::trace::StepTrace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified purpose of a query. `Unset` only exists before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Plan,
    Search,
    Chat,
    Help,
    #[default]
    Unset,
}

impl Intent {
    pub const ROUTABLE: [Intent; 4] = [Intent::Plan, Intent::Search, Intent::Chat, Intent::Help];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Plan => "plan",
            Intent::Search => "search",
            Intent::Chat => "chat",
            Intent::Help => "help",
            Intent::Unset => "unset",
        }
    }

    /// Parse a classifier label. Only surrounding whitespace and letter case
    /// are ignored, so `"plan."` or `plan` in quotes is not a label.
    pub fn from_label(raw: &str) -> Option<Intent> {
        let label = raw.trim().to_lowercase();
        Intent::ROUTABLE.into_iter().find(|i| i.as_str() == label)
    }

    /// The intent routing acts on: anything unresolved is treated as chat.
    pub fn resolved(self) -> Intent {
        match self {
            Intent::Unset => Intent::Chat,
            other => other,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the stages as they appear in the step trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    ClassifyIntent,
    RetrieveContext,
    WebSearch,
    CreatePlan,
    GenerateResponse,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::ClassifyIntent => "classify_intent",
            StepName::RetrieveContext => "retrieve_context",
            StepName::WebSearch => "web_search",
            StepName::CreatePlan => "create_plan",
            StepName::GenerateResponse => "generate_response",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
    Error,
}

/// One stage attempt in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: StepName,
    pub action: String,
    pub status: StepStatus,
    pub result: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StepRecord {
    /// True for a stage that ran as a no-op for trace completeness.
    pub fn is_skipped(&self) -> bool {
        self.details
            .get("skipped")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Non-fatal conditions absorbed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    ClassificationDefaulted,
    RetrievalEmpty,
    RetrievalFailed,
    SearchUnavailable,
    SearchFailed,
    PlanParseFallback,
    PlanUnavailable,
    GenerationFailed,
    UngroundedAnswer,
}

impl Degradation {
    pub fn as_str(self) -> &'static str {
        match self {
            Degradation::ClassificationDefaulted => "classification_defaulted",
            Degradation::RetrievalEmpty => "retrieval_empty",
            Degradation::RetrievalFailed => "retrieval_failed",
            Degradation::SearchUnavailable => "search_unavailable",
            Degradation::SearchFailed => "search_failed",
            Degradation::PlanParseFallback => "plan_parse_fallback",
            Degradation::PlanUnavailable => "plan_unavailable",
            Degradation::GenerationFailed => "generation_failed",
            Degradation::UngroundedAnswer => "ungrounded_answer",
        }
    }
}

/// Mutable record threaded through every stage of one query.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    query: String,
    pub doc_filter: Option<String>,
    pub preferences: Option<PlanPreferences>,
    intent: Intent,
    pub context_snippets: Vec<ContextChunk>,
    pub search_results: Vec<SearchResult>,
    pub search_answer: Option<String>,
    pub plan: Option<StudyPlan>,
    pub final_response: String,
    pub sources: Vec<SourceCitation>,
    pub confidence: Option<f32>,
    pub step_log: StepTrace,
    pub degradations: Vec<Degradation>,
}

impl WorkflowState {
    /// Start a fresh state. Fails for queries the workflow cannot run on.
    /// The query is kept exactly as given; only validation looks at the trimmed text.
    pub fn new(query: &str, max_query_chars: usize) -> AppResult<Self> {
        if query.trim().is_empty() {
            return Err(AppError::WorkflowInitialization("query is empty".to_string()));
        }
        let length = query.chars().count();
        if length > max_query_chars {
            return Err(AppError::WorkflowInitialization(format!(
                "query is {} characters, limit is {}",
                length, max_query_chars
            )));
        }

        Ok(Self {
            query: query.to_string(),
            doc_filter: None,
            preferences: None,
            intent: Intent::Unset,
            context_snippets: Vec::new(),
            search_results: Vec::new(),
            search_answer: None,
            plan: None,
            final_response: String::new(),
            sources: Vec::new(),
            confidence: None,
            step_log: StepTrace::default(),
            degradations: Vec::new(),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Record the classified intent. Only the first call takes effect; later
    /// calls are ignored and return `false`.
    pub fn set_intent(&mut self, intent: Intent) -> bool {
        if self.intent != Intent::Unset {
            return false;
        }
        self.intent = intent;
        true
    }

    pub fn degrade(&mut self, degradation: Degradation) {
        if !self.degradations.contains(&degradation) {
            self.degradations.push(degradation);
        }
    }
}
