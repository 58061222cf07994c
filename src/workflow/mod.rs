//! Workflow orchestration
//!
//! ```text
//!            ┌──────────┐
//!  query ──▶ │ Classify │
//!            └──────────┘
//!      plan/chat │   search │      help │
//!                ▼          ▼           │
//!         ┌──────────┐ ┌────────┐       │
//!         │ Retrieve │ │ Search │       │
//!         └──────────┘ └────────┘       │
//!                └────┬─────┘           │
//!                     ▼                 │
//!              ┌────────────┐           │
//!              │ Synthesize │ (skipped  │
//!              └────────────┘  unless   │
//!                     │        plan)    │
//!                     ▼                 │
//!               ┌─────────┐             │
//!               │ Compose │ ◀───────────┘
//!               └─────────┘
//! ```
//!
//! Each run owns its `WorkflowState`; collaborators are shared read-only.

pub mod engine;
pub mod outcome;
pub mod state;
pub mod trace;

#[cfg(test)]
pub(crate) mod fakes;

pub use engine::{planned_route, route, Collaborators, Conductor, ConductorSettings, Stage};
pub use outcome::{WorkflowOutcome, WorkflowRequest};
pub use state::{Degradation, Intent, StepName, StepRecord, StepStatus, WorkflowState};
pub use trace::StepTrace;
