// Turn Graph Module
// StateGraph that runs one question through the four stages

pub mod builder;
pub mod node;
pub mod runtime;
pub mod state;

pub mod nodes;

pub use builder::build_turn_graph;
pub use node::{GraphError, GraphErrorKind, Node, NodeContext, NodeOutput};
pub use runtime::GraphRuntime;
pub use state::{TurnStage, TurnState};
