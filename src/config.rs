use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LLMConfig,
    pub retrieval: RetrievalConfig,
    pub search: SearchConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub classifier_temperature: f32,
    pub response_temperature: f32,
    pub planner_temperature: f32,
    /// Completion cap for plan synthesis and refinement; plans are long nested JSON
    pub planner_max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Embeddings always go through OpenAI, whichever chat provider is active
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub score_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub provider: String,
    pub tavily_api_key: String,
    pub serpapi_key: String,
    pub max_results: usize,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Snippet limit applied to retrieval top-K, plan synthesis and composition
    pub context_limit: usize,
    pub max_query_chars: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            context_limit: 3,
            max_query_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub interaction_log_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let provider = var("LLM_PROVIDER", "openai").to_lowercase();
        let key_var = match provider.as_str() {
            "groq" => "GROQ_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => "OPENAI_API_KEY",
        };

        let config = Self {
            llm: LLMConfig {
                api_key: var(key_var, ""),
                api_base: lookup("LLM_API_BASE").filter(|v| !v.trim().is_empty()),
                model: var("LLM_MODEL", "gpt-4o-mini"),
                timeout_secs: parse_var("LLM_TIMEOUT_SECS", &var("LLM_TIMEOUT_SECS", "60"))?,
                max_retries: parse_var("LLM_MAX_RETRIES", &var("LLM_MAX_RETRIES", "2"))?,
                classifier_temperature: parse_var(
                    "CLASSIFIER_TEMPERATURE",
                    &var("CLASSIFIER_TEMPERATURE", "0.0"),
                )?,
                response_temperature: parse_var(
                    "RESPONSE_TEMPERATURE",
                    &var("RESPONSE_TEMPERATURE", "0.3"),
                )?,
                planner_temperature: parse_var(
                    "PLANNER_TEMPERATURE",
                    &var("PLANNER_TEMPERATURE", "0.7"),
                )?,
                planner_max_tokens: parse_var(
                    "PLANNER_MAX_TOKENS",
                    &var("PLANNER_MAX_TOKENS", "4096"),
                )?,
                provider,
            },
            retrieval: RetrievalConfig {
                embedding_api_key: var("OPENAI_API_KEY", ""),
                embedding_model: var("EMBEDDING_MODEL", "text-embedding-ada-002"),
                qdrant_url: var("QDRANT_URL", "http://localhost:6333"),
                qdrant_collection: var("QDRANT_COLLECTION", "studybuddy_docs"),
                score_threshold: parse_var(
                    "RETRIEVAL_SCORE_THRESHOLD",
                    &var("RETRIEVAL_SCORE_THRESHOLD", "0.5"),
                )?,
            },
            search: SearchConfig {
                provider: var("SEARCH_PROVIDER", "tavily").to_lowercase(),
                tavily_api_key: var("TAVILY_API_KEY", ""),
                serpapi_key: var("SERPAPI_KEY", ""),
                max_results: parse_var("SEARCH_MAX_RESULTS", &var("SEARCH_MAX_RESULTS", "5"))?,
            },
            workflow: WorkflowConfig {
                context_limit: parse_var("CONTEXT_LIMIT", &var("CONTEXT_LIMIT", "3"))?,
                max_query_chars: parse_var("MAX_QUERY_CHARS", &var("MAX_QUERY_CHARS", "4000"))?,
            },
            logging: LoggingConfig {
                log_dir: lookup("LOG_DIR").filter(|v| !v.is_empty()).map(PathBuf::from),
                interaction_log_path: lookup("INTERACTION_LOG_PATH")
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from),
            },
        };

        if config.workflow.context_limit == 0 {
            anyhow::bail!("CONTEXT_LIMIT must be at least 1");
        }
        if config.workflow.max_query_chars == 0 {
            anyhow::bail!("MAX_QUERY_CHARS must be at least 1");
        }
        if config.search.max_results == 0 {
            anyhow::bail!("SEARCH_MAX_RESULTS must be at least 1");
        }
        if config.llm.planner_max_tokens == 0 {
            anyhow::bail!("PLANNER_MAX_TOKENS must be at least 1");
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}
