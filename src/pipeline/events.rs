use serde::Serialize;

pub const RETRIEVAL_MARKER: &str = "检索结果:";
pub const SUMMARY_MARKER: &str = "\n总结agent:\n";

/// What a turn emits, in order: one `Retrieval`, any number of `Answer`
/// fragments, one `SummaryStart`, any number of `Summary` fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TurnEvent {
    Retrieval { keyword: String, payload: String },
    Answer(String),
    SummaryStart,
    Summary(String),
}

impl TurnEvent {
    /// Plain-text form used by the chat endpoint.
    pub fn render(&self) -> String {
        match self {
            TurnEvent::Retrieval { payload, .. } => format!("{RETRIEVAL_MARKER}{payload}\n"),
            TurnEvent::Answer(fragment) | TurnEvent::Summary(fragment) => fragment.clone(),
            TurnEvent::SummaryStart => SUMMARY_MARKER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_markers() {
        let retrieval = TurnEvent::Retrieval {
            keyword: "试用期".to_string(),
            payload: "[[],[]]".to_string(),
        };
        assert_eq!(retrieval.render(), "检索结果:[[],[]]\n");
        assert_eq!(TurnEvent::SummaryStart.render(), "\n总结agent:\n");
        assert_eq!(TurnEvent::Answer("第".to_string()).render(), "第");
    }
}
