//! Workflow engine
//!
//! A closed state machine over five stages. Routing is decided once, from
//! the classified intent, and every stage appends exactly one record to the
//! step trace. A stage that errors or panics is recorded as `error`, its
//! slice of the state is reset to a safe default, and the run continues.

use crate::agents::{IntentClassifier, PlanSynthesizer, PlannerAgent, ReplyAgent};
use crate::config::Config;
use crate::embeddings::{ContextRetriever, VectorSearch};
use crate::llm::{LLMProviderConfig, TextGenerator, UnconfiguredGenerator, LLM};
use crate::models::{default_plan_title, StudyPlan};
use crate::search::{self, WebSearch};
use crate::types::AppError;
use crate::workflow::outcome::{WorkflowOutcome, WorkflowRequest, FATAL_RESPONSE};
use crate::workflow::state::{Degradation, Intent, StepName, WorkflowState};
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

const COMPOSE_FALLBACK: &str =
    "I apologize, but I encountered an error generating a response. Please try again.";

/// Nodes of the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    Retrieve,
    Search,
    Synthesize,
    Compose,
}

impl Stage {
    /// Successor of this stage, `None` once the response is composed.
    pub fn next(self, intent: Intent) -> Option<Stage> {
        match self {
            Stage::Classify => Some(route(intent)),
            Stage::Retrieve | Stage::Search => Some(Stage::Synthesize),
            Stage::Synthesize => Some(Stage::Compose),
            Stage::Compose => None,
        }
    }

    pub fn step_name(self) -> StepName {
        match self {
            Stage::Classify => StepName::ClassifyIntent,
            Stage::Retrieve => StepName::RetrieveContext,
            Stage::Search => StepName::WebSearch,
            Stage::Synthesize => StepName::CreatePlan,
            Stage::Compose => StepName::GenerateResponse,
        }
    }
}

/// Conditional edge out of classification.
pub fn route(intent: Intent) -> Stage {
    match intent.resolved() {
        Intent::Search => Stage::Search,
        Intent::Help => Stage::Compose,
        Intent::Plan | Intent::Chat | Intent::Unset => Stage::Retrieve,
    }
}

/// Every stage a run with `intent` visits, in order.
pub fn planned_route(intent: Intent) -> Vec<Stage> {
    let mut stages = vec![Stage::Classify];
    while let Some(next) = stages.last().and_then(|s| s.next(intent)) {
        stages.push(next);
    }
    stages
}

#[derive(Debug, Clone)]
pub struct ConductorSettings {
    /// Snippets retrieved and handed to plan synthesis and composition
    pub context_limit: usize,
    pub max_query_chars: usize,
    pub search_max_results: usize,
}

impl Default for ConductorSettings {
    fn default() -> Self {
        Self {
            context_limit: 3,
            max_query_chars: 4000,
            search_max_results: 5,
        }
    }
}

impl ConductorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            context_limit: config.workflow.context_limit,
            max_query_chars: config.workflow.max_query_chars,
            search_max_results: config.search.max_results,
        }
    }
}

/// Stateless collaborator handles shared by every run.
pub struct Collaborators {
    pub classifier: Arc<dyn TextGenerator>,
    pub responder: Arc<dyn TextGenerator>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub search: Arc<dyn WebSearch>,
    pub planner: Arc<dyn PlanSynthesizer>,
}

impl Collaborators {
    /// Wire the HTTP-backed collaborators. A missing LLM key is logged and
    /// leaves generation-dependent stages to degrade on every call.
    pub fn from_config(config: &Config) -> Self {
        let provider = LLMProviderConfig::from_config(&config.llm);
        let generator = |tune: &dyn Fn(LLM) -> LLM| -> Arc<dyn TextGenerator> {
            match LLM::new(provider.clone(), config.llm.model.clone()) {
                Ok(llm) => Arc::new(tune(llm)),
                Err(e) => {
                    warn!(error = %e, "LLM unavailable, generation stages will degrade");
                    Arc::new(UnconfiguredGenerator::new(e.to_string()))
                }
            }
        };

        let planner_llm = generator(&|llm: LLM| {
            llm.with_temperature(config.llm.planner_temperature)
                .with_max_tokens(config.llm.planner_max_tokens)
        });

        Self {
            classifier: generator(&|llm: LLM| llm.with_temperature(config.llm.classifier_temperature)),
            responder: generator(&|llm: LLM| llm.with_temperature(config.llm.response_temperature)),
            retriever: Arc::new(VectorSearch::from_config(&config.retrieval)),
            search: search::from_config(&config.search),
            planner: Arc::new(PlannerAgent::new(planner_llm, config.workflow.context_limit)),
        }
    }
}

pub struct Conductor {
    classifier: IntentClassifier,
    retriever: Arc<dyn ContextRetriever>,
    search: Arc<dyn WebSearch>,
    planner: Arc<dyn PlanSynthesizer>,
    composer: ReplyAgent,
    settings: ConductorSettings,
}

impl Conductor {
    pub fn new(collaborators: Collaborators, settings: ConductorSettings) -> Self {
        Self {
            classifier: IntentClassifier::new(collaborators.classifier),
            retriever: collaborators.retriever,
            search: collaborators.search,
            planner: collaborators.planner,
            composer: ReplyAgent::new(collaborators.responder, settings.context_limit),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Collaborators::from_config(config),
            ConductorSettings::from_config(config),
        )
    }

    /// `RunWorkflow`
    pub async fn run(&self, query: &str) -> WorkflowOutcome {
        self.run_request(WorkflowRequest::new(query)).await
    }

    pub async fn run_request(&self, request: WorkflowRequest) -> WorkflowOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow", %run_id);
        self.execute(run_id, request).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, request: WorkflowRequest) -> WorkflowOutcome {
        let mut state = match WorkflowState::new(&request.query, self.settings.max_query_chars) {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Could not start workflow");
                return WorkflowOutcome::failed(run_id, &request.query, e.to_string());
            }
        };
        state.doc_filter = request.doc_id.filter(|d| !d.trim().is_empty());
        state.preferences = request.preferences.filter(|p| !p.is_empty());

        info!(query = %state.query(), "Processing query");

        let mut stage = Some(Stage::Classify);
        while let Some(current) = stage {
            self.run_stage(current, &mut state).await;
            stage = current.next(state.intent());
        }

        if state.final_response.trim().is_empty() {
            state.final_response = COMPOSE_FALLBACK.to_string();
        }

        info!(
            intent = %state.intent().resolved(),
            steps = state.step_log.len(),
            degradations = ?state.degradations,
            "Workflow complete"
        );
        WorkflowOutcome::completed(run_id, state)
    }

    async fn run_stage(&self, stage: Stage, state: &mut WorkflowState) {
        let attempt = AssertUnwindSafe(self.step(stage, state)).catch_unwind().await;
        if let Err(payload) = attempt {
            let message = panic_message(payload.as_ref());
            error!(stage = ?stage, panic = %message, "Stage panicked");
            absorb_panic(stage, state, &message);
        }
    }

    async fn step(&self, stage: Stage, state: &mut WorkflowState) {
        match stage {
            Stage::Classify => self.classify(state).await,
            Stage::Retrieve => self.retrieve(state).await,
            Stage::Search => self.web_search(state).await,
            Stage::Synthesize => self.synthesize(state).await,
            Stage::Compose => self.compose(state).await,
        }
    }

    async fn classify(&self, state: &mut WorkflowState) {
        state
            .step_log
            .begin(StepName::ClassifyIntent, "Analyzing user intent");

        let result = self.classifier.classify(state.query()).await;
        match result {
            Ok(classification) => {
                state.set_intent(classification.intent);
                if classification.defaulted {
                    state.degrade(Degradation::ClassificationDefaulted);
                }
                state.step_log.complete(
                    format!("Detected intent: {}", classification.intent),
                    json!({
                        "intent": classification.intent,
                        "raw_label": classification.raw.trim(),
                        "defaulted": classification.defaulted,
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, "Intent classification failed, defaulting to chat");
                state.set_intent(Intent::Chat);
                state.degrade(Degradation::ClassificationDefaulted);
                state.step_log.fail(
                    &e,
                    "Intent classification failed, defaulting to chat",
                    json!({ "intent": Intent::Chat, "defaulted": true }),
                );
            }
        }
    }

    async fn retrieve(&self, state: &mut WorkflowState) {
        state
            .step_log
            .begin(StepName::RetrieveContext, "Searching documents for relevant context");

        let limit = self.settings.context_limit;
        let result = self
            .retriever
            .embed_and_search(state.query(), limit, state.doc_filter.as_deref())
            .await;

        match result {
            Ok(mut chunks) => {
                chunks.truncate(limit);
                let count = chunks.len();
                let top_score = chunks.first().map(|c| c.score);
                if chunks.is_empty() {
                    state.degrade(Degradation::RetrievalEmpty);
                }
                state.context_snippets = chunks;
                state.step_log.complete(
                    format!("Retrieved {} relevant chunks", count),
                    json!({
                        "chunks_found": count,
                        "top_score": top_score,
                        "doc_filter": state.doc_filter,
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, "Context retrieval failed");
                state.context_snippets.clear();
                state.degrade(Degradation::RetrievalFailed);
                state
                    .step_log
                    .fail(&e, "Context retrieval failed", json!({ "chunks_found": 0 }));
            }
        }
    }

    async fn web_search(&self, state: &mut WorkflowState) {
        state.step_log.begin(StepName::WebSearch, "Searching the web");

        let result = self
            .search
            .search(state.query(), self.settings.search_max_results)
            .await;

        match result {
            Ok(response) => {
                let count = response.results.len();
                let has_answer = response.answer.is_some();
                state.search_results = response.results;
                state.search_answer = response.answer;
                state.step_log.complete(
                    format!("Found {} web results", count),
                    json!({ "results_found": count, "has_answer": has_answer }),
                );
            }
            Err(e) => {
                warn!(error = %e, "Web search failed");
                state.search_results.clear();
                state.search_answer = None;
                state.degrade(if e.is_unavailable() {
                    Degradation::SearchUnavailable
                } else {
                    Degradation::SearchFailed
                });
                state
                    .step_log
                    .fail(&e, "Web search failed", json!({ "results_found": 0 }));
            }
        }
    }

    async fn synthesize(&self, state: &mut WorkflowState) {
        let intent = state.intent().resolved();
        if intent != Intent::Plan {
            state.step_log.skip(
                StepName::CreatePlan,
                "Skipped: no study plan requested",
                json!({ "intent": intent }),
            );
            return;
        }

        state.step_log.begin(StepName::CreatePlan, "Creating study plan");

        let limit = self.settings.context_limit.min(state.context_snippets.len());
        let result = self
            .planner
            .synthesize_plan(
                state.query(),
                &state.context_snippets[..limit],
                state.preferences.as_ref(),
            )
            .await;

        match result {
            Ok(mut plan) => {
                if !plan.has_title() {
                    plan.title = default_plan_title(state.query());
                }
                state.step_log.complete(
                    format!("Created study plan: {}", plan.title),
                    json!({
                        "title": plan.title,
                        "sections": plan.sections.len(),
                        "structured": plan.is_structured(),
                    }),
                );
                state.plan = Some(plan);
            }
            Err(AppError::PlanParse { reason, raw }) if !raw.trim().is_empty() => {
                warn!(reason = %reason, "Plan output was not structured, keeping raw text");
                let plan = StudyPlan::from_raw_text(state.query(), &raw);
                state.degrade(Degradation::PlanParseFallback);
                state.step_log.complete(
                    format!("Created study plan: {}", plan.title),
                    json!({
                        "title": plan.title,
                        "structured": plan.is_structured(),
                        "parse_error": reason,
                    }),
                );
                state.plan = Some(plan);
            }
            Err(e) => {
                warn!(error = %e, "Study plan creation failed");
                state.plan = None;
                state.degrade(Degradation::PlanUnavailable);
                state
                    .step_log
                    .fail(&e, "Study plan creation failed", json!({}));
            }
        }
    }

    async fn compose(&self, state: &mut WorkflowState) {
        state
            .step_log
            .begin(StepName::GenerateResponse, "Composing final response");

        let composition = self.composer.compose(state).await;

        for degradation in composition.degradations {
            state.degrade(degradation);
        }
        state.sources = composition.sources;
        state.confidence = composition.confidence;
        state.final_response = composition.text;

        let details = json!({
            "intent": state.intent().resolved(),
            "response_length": state.final_response.len(),
        });
        match composition.error {
            Some(e) => {
                state
                    .step_log
                    .fail(&e, "Response generation failed, fallback used", details);
            }
            None => {
                state
                    .step_log
                    .complete("Response generated successfully", details);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Record a panicked stage and reset its output to the safe default.
fn absorb_panic(stage: Stage, state: &mut WorkflowState, message: &str) {
    if !state.step_log.is_open() {
        state.step_log.begin(stage.step_name(), "Recovering from stage failure");
    }
    let error = AppError::Internal(format!("stage panicked: {}", message));
    state
        .step_log
        .fail(&error, "Stage failed unexpectedly", json!({}));

    match stage {
        Stage::Classify => {
            state.set_intent(Intent::Chat);
            state.degrade(Degradation::ClassificationDefaulted);
        }
        Stage::Retrieve => {
            state.context_snippets.clear();
            state.degrade(Degradation::RetrievalFailed);
        }
        Stage::Search => {
            state.search_results.clear();
            state.search_answer = None;
            state.degrade(Degradation::SearchFailed);
        }
        Stage::Synthesize => {
            state.plan = None;
            state.degrade(Degradation::PlanUnavailable);
        }
        Stage::Compose => {
            state.final_response = COMPOSE_FALLBACK.to_string();
            state.degrade(Degradation::GenerationFailed);
        }
    }
}
