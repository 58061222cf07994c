//! Intent Classifier
//!
//! Maps a raw query onto one of the four routable intents with a single
//! completion call. Output that is not exactly one of the labels is
//! normalized to `chat`.

use crate::llm::TextGenerator;
use crate::types::AppResult;
use crate::workflow::Intent;
use std::sync::Arc;
use tracing::{info, warn};

const CLASSIFIER_PROMPT: &str = r#"Analyze the user's query and determine their intent. Respond with one of:
- "plan": User wants to create or modify a study plan
- "search": User wants to search for information or resources
- "chat": User wants to have a conversation or ask questions about their documents
- "help": User needs general help or guidance

Consider these examples:
- "Create a study plan for machine learning" -> "plan"
- "Find resources about Python programming" -> "search"
- "What does this document say about neural networks?" -> "chat"
- "How do I use this application?" -> "help"

Respond with only the intent category."#;

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// What the generator actually returned
    pub raw: String,
    /// True when `raw` was not a valid label and `chat` was substituted
    pub defaulted: bool,
}

pub struct IntentClassifier {
    llm: Arc<dyn TextGenerator>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Classify `query`. Errors only when the completion call itself fails.
    pub async fn classify(&self, query: &str) -> AppResult<Classification> {
        let user_prompt = format!("Query: {}", query);
        let raw = self.llm.complete_text(CLASSIFIER_PROMPT, &user_prompt).await?;

        let classification = Self::normalize(&raw);
        if classification.defaulted {
            warn!(raw = %raw.trim(), "Unrecognized intent label, defaulting to chat");
        } else {
            info!(intent = %classification.intent, "Analyzed intent");
        }
        Ok(classification)
    }

    /// Turn generator output into a routable intent.
    pub fn normalize(raw: &str) -> Classification {
        match Intent::from_label(raw) {
            Some(intent) => Classification {
                intent,
                raw: raw.to_string(),
                defaulted: false,
            },
            None => Classification {
                intent: Intent::Chat,
                raw: raw.to_string(),
                defaulted: true,
            },
        }
    }
}
