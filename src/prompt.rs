//! Prompt construction for title-extraction batches.
//!
//! [`build_prompt`] turns a [`Batch`] into the three messages sent to the
//! model: a system directive, the context block listing every record, and a
//! trailing format reminder. Both directives are static templates whose only
//! parameter is the expected title count.

use crate::types::Batch;

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Line separating record blocks inside the context.
pub const RECORD_DELIMITER: &str = "-----";

const SYSTEM_TEMPLATE: &str = r#"You will receive some [context]. Respond with the list of titles found in the [context], one per line, each wrapped in double quotes.
Never wrap your response in ``` or `.
Use only the [context] to formulate your response.
[response_format]
"title goes here"
"title goes here"
"title goes here"
[/response_format]

- Separate titles with a single newline. One title per line.
- Wrap every title in double quotes and escape any double quote inside a title as \".
- Do not add numbering, commentary, or markdown code fences.
- The list must contain exactly {expected_count} titles.
Respond in exactly this format or the response cannot be read."#;

const FORMAT_TEMPLATE: &str = r#"[response_format]
"title goes here"
"title goes here"
"title goes here"
[/response_format]

ONLY RESPOND IN THIS FORMAT. ONE TITLE PER LINE, WRAPPED IN DOUBLE QUOTES.
Never use ``` code fences.
EXPECTED LIST SIZE: {expected_count}
ALWAYS SEPARATE USING A SINGLE NEWLINE. NEVER SEPARATE USING SPACES, COMMAS, OR ANYTHING ELSE."#;

/// The three messages sent to the model for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPrompt {
    /// Sent with the `system` role.
    pub system: String,
    /// Context block plus the extraction instruction, sent as the first `user` turn.
    pub context: String,
    /// Format reminder, sent as the second `user` turn.
    pub format: String,
}

/// Build the prompt for a batch expecting `expected_count` titles back.
///
/// # Example
///
/// ```
/// use llm_batch::prompt::build_prompt;
/// use llm_batch::types::{Batch, Record};
///
/// let batch = Batch::new(1, vec![Record::new("Alien"), Record::untitled()]);
/// let prompt = build_prompt(&batch, batch.len());
/// assert!(prompt.context.contains("Title: Alien"));
/// assert!(prompt.context.contains("Title: N/A"));
/// assert!(prompt.format.contains("EXPECTED LIST SIZE: 2"));
/// ```
pub fn build_prompt(batch: &Batch, expected_count: usize) -> BatchPrompt {
    let count = expected_count.to_string();
    let vars = [("expected_count", count.as_str())];

    let context = format!(
        "Given the [context]\n\n[context]\n{}\n\n[/context]\n\n\
         Respond with the list of the titles in the [context]; titles only, \
         separated by a single newline and wrapped in double quotes. Escape quotes when needed. \
         You must only use the [context] to formulate your response.",
        context_block(batch)
    );

    BatchPrompt {
        system: render(SYSTEM_TEMPLATE, &vars),
        context,
        format: render(FORMAT_TEMPLATE, &vars),
    }
}

/// Render each record as a `Title:` block followed by [`RECORD_DELIMITER`].
pub fn context_block(batch: &Batch) -> String {
    batch
        .titles()
        .map(|title| format!("Title: {}\n{}\n", title, RECORD_DELIMITER))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute `{key}` placeholders in a template.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute placeholders
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}
