// Inputs and results of one workflow run

use crate::models::{ContextChunk, PlanPreferences, SearchResult, SourceCitation, StudyPlan};
use crate::workflow::state::{Degradation, Intent, StepName, StepRecord, WorkflowState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response used when the workflow could not start at all.
pub const FATAL_RESPONSE: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub query: String,
    /// Restrict retrieval to one document
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub preferences: Option<PlanPreferences>,
}

impl WorkflowRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_preferences(mut self, preferences: PlanPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }
}

/// Terminal result of `RunWorkflow`.
///
/// `success` is false only when the state could not be initialized; every
/// stage-level failure surfaces as degraded content plus an error step.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub run_id: Uuid,
    pub query: String,
    pub response: String,
    /// Absent only for a run that never started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<StudyPlan>,
    pub search_results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_answer: Option<String>,
    pub context_snippets: Vec<ContextChunk>,
    pub sources: Vec<SourceCitation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub degradations: Vec<Degradation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowOutcome {
    pub(crate) fn completed(run_id: Uuid, state: WorkflowState) -> Self {
        let intent = Some(state.intent().resolved());
        Self {
            success: true,
            run_id,
            query: state.query().to_string(),
            response: state.final_response,
            intent,
            steps: state.step_log.into_records(),
            plan: state.plan,
            search_results: state.search_results,
            search_answer: state.search_answer,
            context_snippets: state.context_snippets,
            sources: state.sources,
            confidence: state.confidence,
            degradations: state.degradations,
            error: None,
        }
    }

    pub(crate) fn failed(run_id: Uuid, query: &str, error: String) -> Self {
        Self {
            success: false,
            run_id,
            query: query.to_string(),
            response: FATAL_RESPONSE.to_string(),
            intent: None,
            steps: Vec::new(),
            plan: None,
            search_results: Vec::new(),
            search_answer: None,
            context_snippets: Vec::new(),
            sources: Vec::new(),
            confidence: None,
            degradations: Vec::new(),
            error: Some(error),
        }
    }

    /// Step names in execution order.
    pub fn path(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.step).collect()
    }
}
