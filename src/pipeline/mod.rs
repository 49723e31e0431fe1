//! Turn pipeline: keyword extraction, retrieval, grounded answer, summary.

pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod services;

pub use events::TurnEvent;
pub use orchestrator::{Orchestrator, TurnRecord, TurnStream};
pub use registry::OrchestratorRegistry;
pub use services::PipelineServices;
