// Graph Nodes
// One node per turn stage

pub mod answer;
pub mod keyword;
pub mod retrieve;
pub mod summarize;

pub use answer::AnswerNode;
pub use keyword::KeywordNode;
pub use retrieve::RetrieveNode;
pub use summarize::SummarizeNode;
