//! Parsing of model responses into title lists.
//!
//! Models asked for "one quoted title per line" still wrap answers in code
//! fences, end them with a stray period, or pad them with blank lines.
//! [`parse_titles`] applies a fixed, enumerable set of cleanup rules so the
//! result can be checked against the expected batch size.

/// Lines dropped outright, beyond blank lines and bare backtick runs.
const STOPLIST: &[&str] = &["."];

/// Parse a raw model response into an ordered list of titles.
///
/// Rules, applied per line:
/// 1. Split on `\n` and trim surrounding whitespace.
/// 2. Drop empty lines, lines made only of backticks, and lines in the stoplist.
/// 3. Strip one layer of surrounding double quotes (no unescaping).
///
/// # Example
///
/// ```
/// use llm_batch::parsing::parse_titles;
///
/// let titles = parse_titles("```\n\"Alien\"\n.\n\"Heat\"");
/// assert_eq!(titles, vec!["Alien", "Heat"]);
/// ```
pub fn parse_titles(response: &str) -> Vec<String> {
    response
        .split('\n')
        .map(str::trim)
        .filter(|line| !is_artifact(line))
        .map(|line| strip_one_quote_layer(line).to_string())
        .collect()
}

/// Whether a trimmed line is wrapper noise rather than content.
fn is_artifact(line: &str) -> bool {
    line.is_empty() || line.chars().all(|c| c == '`') || STOPLIST.contains(&line)
}

/// Remove at most one leading and one trailing `"`.
fn strip_one_quote_layer(line: &str) -> &str {
    let line = line.strip_prefix('"').unwrap_or(line);
    line.strip_suffix('"').unwrap_or(line)
}
