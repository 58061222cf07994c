// StudyBuddy Conductor - intent-routed workflow engine for study assistance

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod search;      // Web search (Tavily, SerpAPI Google Light)
pub mod embeddings;  // Query embedding + vector store retrieval
pub mod workflow;
pub mod interaction_log;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use workflow::{Conductor, Intent, WorkflowOutcome, WorkflowRequest};
// Note: import specific items from types rather than glob-importing it
// e.g., use studybuddy_conductor::types::{AppError, AppResult};
