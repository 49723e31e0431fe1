use std::sync::LazyLock;

use regex::Regex;

/// Text after the last `delimiter` (e.g. `</think>`), trimmed. Output with no
/// delimiter is returned whole.
pub fn after_reasoning(output: &str, delimiter: &str) -> String {
    if delimiter.is_empty() {
        return output.trim().to_string();
    }
    match output.rfind(delimiter) {
        Some(pos) => output[pos + delimiter.len()..].trim().to_string(),
        None => output.trim().to_string(),
    }
}

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think block regex is valid"));

/// Reduces a keyword-extraction reply to one searchable term: reasoning
/// blocks, wrapping quotes and trailing punctuation are removed and only the
/// first non-empty line is kept. May return an empty string.
pub fn normalize_keyword(raw: &str, delimiter: &str) -> String {
    let visible = after_reasoning(raw, delimiter);
    let visible = THINK_BLOCK_RE.replace_all(&visible, "");

    let line = visible
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let line = line
        .strip_prefix("关键词：")
        .or_else(|| line.strip_prefix("关键词:"))
        .unwrap_or(line);

    line.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                '"' | '\'' | '“' | '”' | '‘' | '’' | '「' | '」' | '《' | '》' | '`' | '*'
                    | '。' | '，' | ',' | '.' | '！' | '!' | '？' | '?' | '；' | ';' | '：' | ':'
            )
    })
    .to_string()
}
