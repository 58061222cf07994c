//! Planner Agent
//!
//! Turns a topic (plus optional document snippets and learner preferences)
//! into a structured multi-section study plan. The generator is asked for
//! JSON; output that cannot be parsed is reported as `AppError::PlanParse`
//! carrying the raw text so the caller can fall back to a text-only plan.

use crate::llm::TextGenerator;
use crate::models::{ContextChunk, PlanPreferences, StudyPlan};
use crate::types::{AppError, AppResult};
use crate::utils::extract_json_block;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// `SynthesizePlan`
#[async_trait]
pub trait PlanSynthesizer: Send + Sync {
    async fn synthesize_plan(
        &self,
        topic: &str,
        context: &[ContextChunk],
        preferences: Option<&PlanPreferences>,
    ) -> AppResult<StudyPlan>;
}

const PLANNER_SYSTEM_PROMPT: &str = r#"You are an expert educational planner. Create comprehensive, structured study plans that are:
1. Well-organized with clear sections and subsections
2. Progressive in difficulty
3. Include specific learning objectives
4. Suggest practical exercises and assessments
5. Provide estimated time requirements
6. Reference source materials when available

Format your response as a JSON object with this structure:
{
    "title": "Study Plan Title",
    "overview": "Brief overview of the plan",
    "duration": "Estimated duration (e.g., '4 weeks', '2 months')",
    "difficulty": "Beginner/Intermediate/Advanced",
    "source_references": ["Page references from provided context"],
    "sections": [
        {
            "id": "section_1",
            "title": "Section Title",
            "description": "What this section covers",
            "duration": "Estimated time",
            "learning_objectives": ["Objective 1", "Objective 2"],
            "source_pages": ["Relevant page references"],
            "subsections": [
                {
                    "id": "subsection_1_1",
                    "title": "Subsection Title",
                    "content": "Detailed content description",
                    "activities": ["Activity 1", "Activity 2"],
                    "resources": ["Resource 1", "Resource 2"],
                    "estimated_time": "X hours",
                    "source_reference": "Page reference if applicable"
                }
            ]
        }
    ],
    "prerequisites": ["Prerequisite 1", "Prerequisite 2"],
    "final_assessment": "Description of final assessment or project"
}

Respond with ONLY the JSON object."#;

const REFINE_SYSTEM_PROMPT: &str = r#"You are an expert educational planner. The user has a study plan and wants to refine it.
Make the requested changes while maintaining the overall structure and quality of the plan.
Return the complete updated plan as a JSON object in the same format, and nothing else."#;

pub struct PlannerAgent {
    llm: Arc<dyn TextGenerator>,
    context_limit: usize,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn TextGenerator>, context_limit: usize) -> Self {
        Self { llm, context_limit }
    }

    /// Revise an existing plan according to a free-form request.
    ///
    /// On unparseable output the caller keeps `current`.
    pub async fn refine_plan(&self, current: &StudyPlan, request: &str) -> AppResult<StudyPlan> {
        let current_json = serde_json::to_string_pretty(current)
            .map_err(|e| AppError::Internal(format!("failed to serialize plan: {}", e)))?;

        let user_prompt = format!(
            "Current plan:\n{}\n\nRefinement request: {}\n\nPlease update the plan accordingly and return the complete updated JSON.",
            current_json, request
        );

        let raw = self.llm.complete_text(REFINE_SYSTEM_PROMPT, &user_prompt).await?;
        let refined = Self::parse_plan(&raw)?;
        info!(title = %refined.title, "Refined study plan");
        Ok(refined)
    }

    fn create_plan_prompt(
        topic: &str,
        context: &[ContextChunk],
        preferences: Option<&PlanPreferences>,
    ) -> String {
        let mut prompt = format!(
            "Create a detailed study plan for: {}\n\n\
             Make sure the plan is comprehensive, well-structured, and suitable for self-study.\n\
             When referencing information from the provided context, include page references in the appropriate fields.",
            topic
        );

        if !context.is_empty() {
            let parts: Vec<String> = context
                .iter()
                .map(|c| format!("[From {}, Page {}]\n{}", c.source_label(), c.page_label(), c.text))
                .collect();
            prompt.push_str("\n\nRelevant context from documents:\n");
            prompt.push_str(&parts.join("\n---\n"));
        }

        if let Some(prefs) = preferences.filter(|p| !p.is_empty()) {
            // PlanPreferences only holds strings; serialization cannot fail
            if let Ok(json) = serde_json::to_string(prefs) {
                prompt.push_str(&format!("\n\nUser preferences: {}", json));
            }
        }

        prompt
    }

    /// Parse generator output into a plan.
    pub fn parse_plan(raw: &str) -> AppResult<StudyPlan> {
        let json_str = extract_json_block(raw);
        let plan: StudyPlan = serde_json::from_str(json_str).map_err(|e| AppError::PlanParse {
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;
        Ok(plan)
    }

    fn source_references(context: &[ContextChunk]) -> Vec<String> {
        context
            .iter()
            .map(|c| format!("{} (Page {})", c.source_label(), c.page_label()))
            .collect()
    }
}

#[async_trait]
impl PlanSynthesizer for PlannerAgent {
    async fn synthesize_plan(
        &self,
        topic: &str,
        context: &[ContextChunk],
        preferences: Option<&PlanPreferences>,
    ) -> AppResult<StudyPlan> {
        let context = &context[..context.len().min(self.context_limit)];
        info!(topic = %topic, context_chunks = context.len(), "Creating study plan");

        let prompt = Self::create_plan_prompt(topic, context, preferences);
        let raw = self.llm.complete_text(PLANNER_SYSTEM_PROMPT, &prompt).await?;

        let mut plan = match Self::parse_plan(&raw) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Could not parse plan as JSON");
                return Err(e);
            }
        };

        if plan.source_references.is_empty() && !context.is_empty() {
            plan.source_references = Self::source_references(context);
        }

        info!(title = %plan.title, sections = plan.sections.len(), "Study plan created");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fakes::{chunk, ScriptedGenerator};

    const PLAN_JSON: &str = r#"{
        "title": "Machine Learning Foundations",
        "overview": "From regression to neural networks",
        "duration": "6 weeks",
        "difficulty": "Intermediate",
        "sections": [
            {"id": "section_1", "title": "Linear Models", "description": "Regression basics",
             "learning_objectives": ["Fit OLS"], "subsections": []}
        ]
    }"#;

    #[test]
    fn test_parse_plan_from_fenced_output() {
        let plan = PlannerAgent::parse_plan(&format!("Here you go:\n```json\n{}\n```", PLAN_JSON)).unwrap();
        assert_eq!(plan.title, "Machine Learning Foundations");
        assert_eq!(plan.sections.len(), 1);
    }

    #[test]
    fn test_parse_plan_error_keeps_raw() {
        let err = PlannerAgent::parse_plan("Week 1: read chapter one").unwrap_err();
        match err {
            AppError::PlanParse { raw, .. } => assert_eq!(raw, "Week 1: read chapter one"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_includes_context_and_preferences() {
        let prefs = PlanPreferences {
            difficulty: Some("Beginner".into()),
            ..Default::default()
        };
        let prompt = PlannerAgent::create_plan_prompt(
            "statistics",
            &[chunk("Variance measures spread", 0.9, Some(12))],
            Some(&prefs),
        );
        assert!(prompt.contains("Create a detailed study plan for: statistics"));
        assert!(prompt.contains("[From notes.pdf, Page 12]"));
        assert!(prompt.contains(r#""difficulty":"Beginner""#));
    }

    #[tokio::test]
    async fn test_synthesize_fills_source_references() {
        let llm = Arc::new(ScriptedGenerator::replying(PLAN_JSON));
        let planner = PlannerAgent::new(llm.clone(), 2);
        let context = vec![
            chunk("a", 0.9, Some(1)),
            chunk("b", 0.8, Some(2)),
            chunk("c", 0.7, Some(3)),
        ];

        let plan = planner.synthesize_plan("ML", &context, None).await.unwrap();
        assert_eq!(
            plan.source_references,
            vec!["notes.pdf (Page 1)".to_string(), "notes.pdf (Page 2)".to_string()]
        );
        // limit applies to the prompt as well
        assert!(!llm.calls()[0].1.contains("Page 3"));
    }

    #[tokio::test]
    async fn test_synthesize_reports_parse_error() {
        let planner = PlannerAgent::new(Arc::new(ScriptedGenerator::replying("not json")), 3);
        let err = planner.synthesize_plan("ML", &[], None).await.unwrap_err();
        assert!(matches!(err, AppError::PlanParse { .. }));
    }

    #[tokio::test]
    async fn test_refine_plan() {
        let llm = Arc::new(ScriptedGenerator::replying(PLAN_JSON));
        let planner = PlannerAgent::new(llm.clone(), 3);
        let current = StudyPlan {
            title: "Old".into(),
            ..Default::default()
        };

        let refined = planner.refine_plan(&current, "make it six weeks").await.unwrap();
        assert_eq!(refined.duration, "6 weeks");
        assert!(llm.calls()[0].1.contains("Refinement request: make it six weeks"));
        assert!(llm.calls()[0].1.contains("\"title\": \"Old\""));
    }
}
