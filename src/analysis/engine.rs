use serde::Deserialize;
use tracing::debug;

use super::llm::{CompletionApi, LlmError};
use crate::pr::DiffFile;
use crate::report::types::ReviewComment;

/// One entry of the model's reviews list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub line_number: u64,
    pub review_comment: String,
}

/// Outcome of parsing one model reply. `Unparsed` maps to zero comments
/// externally, but stays distinct so tests can tell "model reported no
/// issues" from "model output was not usable".
#[derive(Debug)]
pub enum ParseOutcome {
    Reviews(Vec<ReviewEntry>),
    Unparsed,
}

/// Review one file of the diff: flatten its hunks, ask the model for
/// line-anchored feedback, and parse the reply.
///
/// The only error surfaced is a failed completion call; the orchestrator
/// records it against the file and moves on. A reply that cannot be
/// parsed yields zero comments rather than an error, since models
/// frequently wrap near-JSON in prose.
pub async fn review_file(
    file: &DiffFile,
    pr_title: &str,
    pr_description: &str,
    api: &dyn CompletionApi,
) -> Result<Vec<ReviewComment>, LlmError> {
    // Lock files can slip past the glob filter under renamed paths
    if file.hunks.is_empty() || file.path().contains(".lock") {
        return Ok(Vec::new());
    }

    let content = flatten_hunks(file);
    let prompt = build_prompt(&content, pr_title, pr_description);
    let raw = api.complete(&prompt).await?;

    match parse_review_response(&raw) {
        ParseOutcome::Reviews(entries) => Ok(entries
            .into_iter()
            .map(|entry| ReviewComment {
                file: file.path().to_string(),
                line: entry.line_number,
                comment: entry.review_comment,
            })
            .collect()),
        ParseOutcome::Unparsed => {
            debug!(file = %file.path(), "model reply was not parseable, treating as no issues");
            Ok(Vec::new())
        }
    }
}

/// Flatten all hunks into one text block: each change is its one-char
/// marker immediately followed by the line text, changes within a hunk
/// joined with no separator, hunks joined with a newline.
pub fn flatten_hunks(file: &DiffFile) -> String {
    file.hunks
        .iter()
        .map(|hunk| {
            hunk.changes
                .iter()
                .map(|c| format!("{}{}", c.kind.marker(), c.content))
                .collect::<Vec<_>>()
                .join("")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(file_content: &str, pr_title: &str, pr_description: &str) -> String {
    format!(
        r#"Review the following code changes and provide specific, actionable feedback.
PR Title: {pr_title}
PR Description: {pr_description}

Code:
```
{file_content}
```

Respond with a JSON object containing an array of reviews:
{{
  "reviews": [
    {{
      "lineNumber": <line_number>,
      "reviewComment": "<feedback>"
    }}
  ]
}}

Only include reviews for actual issues found. If no issues, respond with {{"reviews": []}}."#
    )
}

/// Recover a reviews structure from raw model output.
///
/// Strips fenced code-block markers, then slices from the first `{` to
/// the last `}` to shed any surrounding prose, and finally parses the
/// remainder. Anything that still fails to parse, or parses without a
/// reviews list, is `Unparsed`.
pub fn parse_review_response(raw: &str) -> ParseOutcome {
    #[derive(Deserialize)]
    struct ReviewsResponse {
        reviews: Vec<ReviewEntry>,
    }

    let stripped = raw.replace("```json", "").replace("```", "");
    let mut content = stripped.trim();

    if let (Some(first), Some(last)) = (content.find('{'), content.rfind('}')) {
        if last > first {
            content = &content[first..=last];
        }
    }

    match serde_json::from_str::<ReviewsResponse>(content) {
        Ok(response) => ParseOutcome::Reviews(response.reviews),
        Err(_) => ParseOutcome::Unparsed,
    }
}
