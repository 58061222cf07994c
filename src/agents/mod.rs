//! Agent System
//!
//! The stage agents the workflow engine sequences:
//!
//! - **Intent Classifier**: labels a query as plan, search, chat or help
//! - **Planner Agent**: turns a topic and document snippets into a study plan
//! - **Reply Agent**: formats the final answer from the accumulated state
//!
//! ## Pipeline Overview
//!
//! ```text
//! User Query
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Intent    │  → plan / search / chat / help
//! │ Classifier  │
//! └─────────────┘
//!      │
//!      ▼
//!  retrieval or web search (see `embeddings`, `search`)
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Planner   │  → Study plan (plan intent only)
//! │    Agent    │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Reply    │  → User-facing response
//! │    Agent    │
//! └─────────────┘
//! ```

pub mod intent;
pub mod planner;
pub mod reply;

pub use intent::{Classification, IntentClassifier};
pub use planner::{PlanSynthesizer, PlannerAgent};
pub use reply::{render_plan, Composition, ReplyAgent};
