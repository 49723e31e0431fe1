//! Question answering over Chinese statute text.
//!
//! A turn runs four stages on one orchestrator per user: keyword extraction,
//! bucketed keyword retrieval, a streamed grounded answer and a streamed
//! summary of that answer. The HTTP surface lives in `server`.

pub mod agent;
pub mod core;
pub mod graph;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod state;
