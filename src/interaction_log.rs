// Interaction log: one JSON entry per workflow run, kept in a bounded JSON array file

use crate::utils::truncate_chars;
use crate::workflow::{Intent, StepRecord, WorkflowOutcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

pub const MAX_ENTRIES: usize = 1000;
const CHUNK_PREVIEW_CHARS: usize = 200;
pub const DEFAULT_LOG_PATH: &str = "logs/interaction_logs.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub intent: Option<Intent>,
    pub success: bool,
    pub response: String,
    pub context_chunks: Vec<LoggedChunk>,
    pub agent_steps: Vec<StepRecord>,
    pub metadata: InteractionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedChunk {
    pub source_id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionMetadata {
    pub num_chunks_retrieved: usize,
    pub num_agent_steps: usize,
    pub num_search_results: usize,
}

impl InteractionEntry {
    pub fn from_outcome(outcome: &WorkflowOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: outcome.run_id,
            query: outcome.query.clone(),
            intent: outcome.intent,
            success: outcome.success,
            response: outcome.response.clone(),
            context_chunks: outcome
                .context_snippets
                .iter()
                .map(|c| LoggedChunk {
                    source_id: c.source_id.clone(),
                    text: truncate_chars(&c.text, CHUNK_PREVIEW_CHARS),
                    score: c.score,
                    page: c.page,
                })
                .collect(),
            agent_steps: outcome.steps.clone(),
            metadata: InteractionMetadata {
                num_chunks_retrieved: outcome.context_snippets.len(),
                num_agent_steps: outcome.steps.len(),
                num_search_results: outcome.search_results.len(),
            },
        }
    }
}

/// Appends run records to a JSON file. Writes are serialized per logger.
pub struct InteractionLogger {
    path: PathBuf,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl InteractionLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_entries: MAX_ENTRIES,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one run. Failures are logged and swallowed.
    pub async fn log(&self, outcome: &WorkflowOutcome) {
        let entry = InteractionEntry::from_outcome(outcome);
        match self.append(entry).await {
            Ok(()) => info!(run_id = %outcome.run_id, "Logged interaction"),
            Err(e) => error!(error = %format!("{e:#}"), "Error logging interaction"),
        }
    }

    /// The most recent `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<InteractionEntry>> {
        let mut entries = self.load().await?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    async fn append(&self, entry: InteractionEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(&entries).context("serializing interaction log")?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<InteractionEntry>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }
}
