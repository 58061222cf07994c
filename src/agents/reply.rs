//! Reply Agent
//!
//! Formats the final user-facing answer from the accumulated workflow state.
//! This is the last stage of every route. The strategy is chosen purely from
//! the resolved intent; only the conversational path calls the generator.

use crate::llm::TextGenerator;
use crate::models::{ContextChunk, SearchResult, SourceCitation, StudyPlan};
use crate::utils::truncate_chars;
use crate::workflow::{Degradation, Intent, WorkflowState};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Web results rendered for the `search` intent
const SEARCH_RESULT_LIMIT: usize = 3;
const SEARCH_SNIPPET_CHARS: usize = 300;
/// Snippets a grounded answer may cite, whatever the retrieval limit
const MAX_CITED_SNIPPETS: usize = 3;

const TUTOR_SYSTEM_PROMPT: &str = "You are StudyBuddy, an expert AI tutor focused on helping students learn effectively. Always cite your sources and provide educational value.";

pub const CHAT_APOLOGY: &str = "I'd be happy to help with that question, but I encountered an error while writing the answer. Please try again or rephrase your question.";

pub const UNGROUNDED_NOTICE: &str = "Note: I couldn't find anything relevant in your documents, so this answer is not grounded in your documents.";

pub const HELP_TEXT: &str = "# StudyBuddy Help

I'm here to help you with your studies! Here's what I can do:

**Create Study Plans**
- Ask me to \"create a study plan for [topic]\"
- I'll generate a structured, comprehensive learning plan

**Search for Resources**
- Ask me to \"find resources about [topic]\"
- I'll search the web for educational materials, tutorials, and more

**Answer Questions**
- Ask questions about your uploaded documents
- I'll provide answers based on your materials, with page references

Just ask me anything, and I'll do my best to help you learn effectively!";

/// What the composer produced for one run.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    pub text: String,
    pub sources: Vec<SourceCitation>,
    /// Mean relevance of the snippets an answer was grounded on, as a percentage
    pub confidence: Option<f32>,
    pub degradations: Vec<Degradation>,
    /// Set when the generator failed and a fixed fallback was used
    pub error: Option<String>,
}

impl Composition {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

pub struct ReplyAgent {
    llm: Arc<dyn TextGenerator>,
    context_limit: usize,
}

impl ReplyAgent {
    pub fn new(llm: Arc<dyn TextGenerator>, context_limit: usize) -> Self {
        Self {
            llm,
            context_limit: context_limit.min(MAX_CITED_SNIPPETS),
        }
    }

    /// `ComposeResponse`. Never fails; the returned text is always non-empty.
    pub async fn compose(&self, state: &WorkflowState) -> Composition {
        let intent = state.intent().resolved();
        info!(intent = %intent, "Generating reply");

        let composition = match intent {
            Intent::Plan => self.compose_plan(state),
            Intent::Search => Self::compose_search(state),
            Intent::Help => Composition::text(HELP_TEXT),
            Intent::Chat | Intent::Unset => self.compose_chat(state).await,
        };

        info!(response_len = composition.text.len(), "Reply generated");
        composition
    }

    fn snippets<'a>(&self, state: &'a WorkflowState) -> &'a [ContextChunk] {
        let snippets = &state.context_snippets;
        &snippets[..snippets.len().min(self.context_limit)]
    }

    fn compose_plan(&self, state: &WorkflowState) -> Composition {
        match &state.plan {
            Some(plan) => Composition {
                text: render_plan(plan),
                sources: citations(self.snippets(state)),
                ..Default::default()
            },
            None => {
                warn!("No study plan available to render");
                Composition::text(format!(
                    "I wasn't able to create a study plan for \"{}\" this time. \
                     Please try again in a moment, or rephrase the topic you'd like to study.",
                    state.query().trim()
                ))
            }
        }
    }

    fn compose_search(state: &WorkflowState) -> Composition {
        let query = state.query().trim();

        if state.search_results.is_empty() {
            let text = if state.degradations.contains(&Degradation::SearchUnavailable) {
                format!(
                    "Web search isn't available right now, so I couldn't look up '{}'. \
                     You can still ask me questions about your uploaded documents.",
                    query
                )
            } else {
                format!(
                    "I searched for information about '{}' but didn't find relevant results. \
                     Please try a different search term.",
                    query
                )
            };
            return Composition::text(text);
        }

        let mut response = format!("Here's what I found about '{}':\n\n", query);
        if let Some(answer) = state.search_answer.as_deref().filter(|a| !a.trim().is_empty()) {
            response.push_str(&format!("**Quick answer:** {}\n\n", answer.trim()));
        }
        response.push_str(&render_results(&state.search_results));
        Composition::text(response)
    }

    async fn compose_chat(&self, state: &WorkflowState) -> Composition {
        let snippets = self.snippets(state);
        let grounded = !snippets.is_empty();
        let prompt = Self::create_chat_prompt(state.query(), snippets);

        let answer = match self.llm.complete_text(TUTOR_SYSTEM_PROMPT, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Generator returned an empty answer");
                return Self::apology("generator returned an empty completion".to_string());
            }
            Err(e) => {
                error!(error = %e, "Chat generation failed");
                return Self::apology(e.to_string());
            }
        };

        if !grounded {
            return Composition {
                text: format!("{}\n\n{}", UNGROUNDED_NOTICE, answer),
                degradations: vec![Degradation::UngroundedAnswer],
                ..Default::default()
            };
        }

        Composition {
            text: answer,
            sources: citations(snippets),
            confidence: Some(confidence(snippets)),
            ..Default::default()
        }
    }

    fn apology(error: String) -> Composition {
        Composition {
            text: CHAT_APOLOGY.to_string(),
            degradations: vec![Degradation::GenerationFailed],
            error: Some(error),
            ..Default::default()
        }
    }

    fn create_chat_prompt(question: &str, snippets: &[ContextChunk]) -> String {
        if snippets.is_empty() {
            return format!(
                r#"Student's Question: {question}

No relevant passages were found in the student's uploaded documents.

Instructions:
1. Answer from general knowledge as clearly and accurately as you can
2. Do not claim that the answer comes from the student's documents
3. Suggest what kind of material the student could upload to get a grounded answer

Response:"#
            );
        }

        let context = snippets
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "[Source {}: {}, Page {}]\n{}",
                    i + 1,
                    c.source_label(),
                    c.page_label(),
                    c.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Context from uploaded documents:
{context}

Student's Question: {question}

Instructions:
1. Provide a clear, educational answer based on the context
2. Explain concepts with examples when helpful
3. When referencing information, cite sources using [Source X] format
4. If the context doesn't fully answer the question, say so and provide what you can
5. Be encouraging and supportive in your tone

Response:"#
        )
    }
}

/// Markdown rendering of a study plan.
pub fn render_plan(plan: &StudyPlan) -> String {
    if let Some(content) = plan.content.as_deref() {
        return format!("I've created a study plan for you:\n\n# {}\n\n{}", plan.title, content);
    }

    let or_na = |s: &str| if s.trim().is_empty() { "N/A".to_string() } else { s.to_string() };

    let mut response = format!("# {}\n\n", plan.title);
    response.push_str(&format!("**Overview:** {}\n\n", or_na(&plan.overview)));
    response.push_str(&format!("**Duration:** {}\n\n", or_na(&plan.duration)));
    response.push_str(&format!("**Difficulty:** {}\n\n", or_na(&plan.difficulty)));

    if !plan.sections.is_empty() {
        response.push_str("## Study Plan Sections\n\n");
        for (i, section) in plan.sections.iter().enumerate() {
            response.push_str(&format!("### {}. {}\n", i + 1, section.title));
            if !section.description.is_empty() {
                response.push_str(&format!("{}\n", section.description));
            }
            if !section.duration.is_empty() {
                response.push_str(&format!("*Time: {}*\n", section.duration));
            }
            if !section.learning_objectives.is_empty() {
                response.push_str("\nLearning objectives:\n");
                for objective in &section.learning_objectives {
                    response.push_str(&format!("- {}\n", objective));
                }
            }
            response.push('\n');
        }
    }

    if !plan.prerequisites.is_empty() {
        response.push_str("## Prerequisites\n\n");
        for prerequisite in &plan.prerequisites {
            response.push_str(&format!("- {}\n", prerequisite));
        }
        response.push('\n');
    }

    if let Some(assessment) = plan.final_assessment.as_deref().filter(|a| !a.is_empty()) {
        response.push_str(&format!("## Final Assessment\n\n{}\n\n", assessment));
    }

    if !plan.source_references.is_empty() {
        response.push_str("## Sources\n\n");
        for reference in &plan.source_references {
            response.push_str(&format!("- {}\n", reference));
        }
    }

    response.trim_end().to_string()
}

fn render_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(SEARCH_RESULT_LIMIT)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "**{}. {}**\n{}\nSource: {}\n",
                i + 1,
                r.title,
                truncate_chars(&r.content, SEARCH_SNIPPET_CHARS),
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn citations(snippets: &[ContextChunk]) -> Vec<SourceCitation> {
    snippets
        .iter()
        .enumerate()
        .map(|(i, c)| SourceCitation {
            id: i + 1,
            source: c.source_label().to_string(),
            page: c.page,
            section: c.section_title.clone(),
            score: c.score,
        })
        .collect()
}

/// Mean snippet score as a percentage, capped at 95 and rounded to one decimal.
fn confidence(snippets: &[ContextChunk]) -> f32 {
    if snippets.is_empty() {
        return 0.0;
    }
    let mean = snippets.iter().map(|c| c.score).sum::<f32>() / snippets.len() as f32;
    ((mean * 100.0).min(95.0) * 10.0).round() / 10.0
}
