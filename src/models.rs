// Value types owned by the collaborators (retrieval, web search, plan synthesis).
// The orchestrator only reads them.

use serde::{Deserialize, Serialize};

/// A ranked snippet from the knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    /// Relevance in `0.0..=1.0`
    pub score: f32,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
}

impl ContextChunk {
    /// Human-readable document label, falling back to the source id.
    pub fn source_label(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.source_id)
    }

    pub fn page_label(&self) -> String {
        self.page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// A ranked web result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Everything a web search provider hands back for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Optional knobs forwarded to plan synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl PlanPreferences {
    pub fn is_empty(&self) -> bool {
        self.difficulty.is_none() && self.duration.is_none() && self.style.is_none()
    }
}

/// Structured study plan.
///
/// Every field is defaulted so that partially-formed generator output still
/// deserializes. A plan whose generator output could not be parsed at all is
/// carried as raw text in `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub sections: Vec<PlanSection>,
    #[serde(default)]
    pub source_references: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StudyPlan {
    /// Wrap unstructured generator output as a plan.
    pub fn from_raw_text(topic: &str, raw: &str) -> Self {
        Self {
            title: default_plan_title(topic),
            content: Some(raw.trim().to_string()),
            ..Default::default()
        }
    }

    /// True when the plan came from parsed JSON rather than a raw-text wrapper.
    pub fn is_structured(&self) -> bool {
        self.content.is_none()
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

pub fn default_plan_title(topic: &str) -> String {
    format!("Study Plan: {}", topic.trim())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub source_pages: Vec<String>,
    #[serde(default)]
    pub subsections: Vec<PlanSubsection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSubsection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub estimated_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
}

/// Provenance for one snippet used in a grounded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// 1-based label as referenced in the answer (`[Source N]`)
    pub id: usize,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub score: f32,
}
