pub mod engine;
pub mod filter;
pub mod llm;

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::pr::{diff, GithubClient, PrUrl};
use crate::report::AnalysisResult;
use filter::FileFilter;
use llm::CompletionApi;

/// Errors that abort the whole analysis: everything that happens before
/// (or outside) the per-file review loop. Per-file failures are recorded
/// in the result instead and never surface here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Pr(#[from] crate::pr::PrError),

    #[error("Failed to build file filter: {0}")]
    Filter(#[from] globset::Error),
}

/// Drives the diff-to-review pipeline: fetch metadata and diff, parse,
/// filter, review each surviving file sequentially, aggregate.
pub struct Analyzer {
    github: GithubClient,
    completion: Box<dyn CompletionApi>,
    filter: FileFilter,
}

impl Analyzer {
    pub fn new(
        github: GithubClient,
        completion: Box<dyn CompletionApi>,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            github,
            completion,
            filter: FileFilter::new()?,
        })
    }

    /// Run the full pipeline for one PR. Never fails: fatal errors are
    /// folded into the result with `success = false`, per-file errors are
    /// recorded while the batch keeps going.
    pub async fn analyze_pr(&self, pr: &PrUrl) -> AnalysisResult {
        let mut result = AnalysisResult::new(pr.pr_number, pr.repository());
        if let Err(err) = self.run_pipeline(pr, &mut result).await {
            warn!(error = %err, "analysis failed");
            result.errors.push(err.to_string());
            result.success = false;
        }
        result
    }

    async fn run_pipeline(
        &self,
        pr: &PrUrl,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let info = self.github.fetch_pr_info(pr).await?;
        info!(pr = info.number, title = %info.title, "analyzing pull request");

        let diff_text = self.github.fetch_diff(pr).await?;

        // No files changed, or all changes binary: nothing to review
        if diff_text.trim().is_empty() {
            debug!("empty diff, skipping review");
            result.success = true;
            return Ok(());
        }

        let files = diff::parse_diff(&diff_text)?;
        let files: Vec<_> = files
            .into_iter()
            .filter(|file| !self.filter.is_excluded(file.path()))
            .collect();
        info!(files = files.len(), "files to analyze after filtering");

        result.total_files_analyzed = files.len();

        for file in &files {
            let span = info_span!("review_file", file = %file.path());
            match engine::review_file(file, &info.title, &info.body, self.completion.as_ref())
                .instrument(span)
                .await
            {
                Ok(comments) => {
                    debug!(file = %file.path(), comments = comments.len(), "file reviewed");
                    result.comments.extend(comments);
                }
                Err(err) => {
                    let message = format!("Error analyzing {}: {}", file.path(), err);
                    warn!("{message}");
                    result.errors.push(message);
                }
            }
        }

        result.total_comments = result.comments.len();
        result.success = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::types::{Change, ChangeKind, DiffFile, Hunk};
    use async_trait::async_trait;
    use super::llm::LlmError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Helper to create a DiffFile with custom content for testing.
    pub fn test_diff_file(path: &str, changes: Vec<(ChangeKind, usize, &str)>) -> DiffFile {
        DiffFile {
            from_path: Some(path.to_string()),
            to_path: Some(path.to_string()),
            hunks: vec![Hunk {
                old_start: 1,
                old_count: changes.len(),
                new_start: 1,
                new_count: changes.len(),
                changes: changes
                    .into_iter()
                    .map(|(kind, line_number, content)| Change {
                        kind,
                        line_number,
                        content: content.to_string(),
                    })
                    .collect(),
            }],
        }
    }

    /// Completion stub that always answers with the same text and
    /// records every prompt it receives. Clones share the call log, so a
    /// test can keep a handle after moving one into the Analyzer.
    #[derive(Clone)]
    pub struct CallCountApi {
        response: String,
        state: Arc<CallState>,
    }

    #[derive(Default)]
    pub struct CallState {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl CallCountApi {
        pub fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                state: Arc::new(CallState::default()),
            }
        }

        pub fn calls(&self) -> usize {
            self.state.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> String {
            self.state
                .prompts
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionApi for CallCountApi {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.state.calls.fetch_add(1, Ordering::SeqCst);
            self.state.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    pub fn scripted_api(response: &str) -> CallCountApi {
        CallCountApi::new(response)
    }

    /// Completion stub that replays a fixed sequence of outcomes, one
    /// per call; `Err` entries produce a decode error.
    pub struct SequenceApi {
        responses: Mutex<VecDeque<Result<String, ()>>>,
    }

    impl SequenceApi {
        pub fn new(responses: Vec<Result<&str, ()>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl CompletionApi for SequenceApi {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(())) | None => Err(LlmError::Decode(
                    serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
                )),
            }
        }
    }

    fn pr_url(number: u64) -> PrUrl {
        PrUrl {
            owner: "org".to_string(),
            repo: "repo".to_string(),
            pr_number: number,
        }
    }

    async fn mock_metadata(server: &mut mockito::Server, number: u64) {
        server
            .mock("GET", format!("/repos/org/repo/pulls/{number}").as_str())
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"number": {number}, "title": "Test PR", "body": "A change"}}"#
            ))
            .create_async()
            .await;
    }

    async fn mock_diff(server: &mut mockito::Server, number: u64, diff: &str) {
        server
            .mock("GET", format!("/repos/org/repo/pulls/{number}").as_str())
            .match_header("accept", "application/vnd.github.diff")
            .with_status(200)
            .with_body(diff)
            .create_async()
            .await;
    }

    fn analyzer(server: &mockito::Server, api: Box<dyn CompletionApi>) -> Analyzer {
        let github = GithubClient::with_base_url("tok".to_string(), server.url());
        Analyzer::new(github, api).unwrap()
    }

    const TWO_FILE_DIFF: &str = "diff --git a/dist/bundle.min.js b/dist/bundle.min.js\n\
--- a/dist/bundle.min.js\n\
+++ b/dist/bundle.min.js\n\
@@ -1 +1 @@\n\
-old\n\
+new\n\
diff --git a/src/foo.ts b/src/foo.ts\n\
--- a/src/foo.ts\n\
+++ b/src/foo.ts\n\
@@ -11,2 +11,3 @@\n\
 function get(arr, i) {\n\
+  return arr[i + 1];\n\
 }\n";

    #[tokio::test]
    async fn test_empty_diff_short_circuits() {
        let mut server = mockito::Server::new_async().await;
        mock_metadata(&mut server, 1).await;
        mock_diff(&mut server, 1, "   \n").await;

        let api = CallCountApi::new(r#"{"reviews": []}"#);
        let analyzer = analyzer(&server, Box::new(api.clone()));
        let result = analyzer.analyze_pr(&pr_url(1)).await;

        assert!(result.success);
        assert_eq!(result.total_files_analyzed, 0);
        assert_eq!(result.total_comments, 0);
        assert!(result.comments.is_empty());
        assert!(result.errors.is_empty());
        // No file-level completion calls occurred
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_filtering_sets_total_files_analyzed() {
        let mut server = mockito::Server::new_async().await;
        mock_metadata(&mut server, 2).await;
        mock_diff(&mut server, 2, TWO_FILE_DIFF).await;

        let analyzer = analyzer(
            &server,
            Box::new(CallCountApi::new(
                r#"{"reviews": [{"lineNumber": 12, "reviewComment": "off-by-one"}]}"#,
            )),
        );
        let result = analyzer.analyze_pr(&pr_url(2)).await;

        assert!(result.success);
        // dist/bundle.min.js is excluded before review
        assert_eq!(result.total_files_analyzed, 1);
        assert_eq!(result.total_comments, 1);
        assert_eq!(result.comments[0].file, "src/foo.ts");
        assert_eq!(result.comments[0].line, 12);
        assert_eq!(result.comments[0].comment, "off-by-one");
    }

    #[tokio::test]
    async fn test_per_file_failure_does_not_stop_batch() {
        let diff = "diff --git a/src/a.rs b/src/a.rs\n\
--- a/src/a.rs\n\
+++ b/src/a.rs\n\
@@ -1 +1 @@\n\
-x\n\
+y\n\
diff --git a/src/b.rs b/src/b.rs\n\
--- a/src/b.rs\n\
+++ b/src/b.rs\n\
@@ -1 +1 @@\n\
-p\n\
+q\n";
        let mut server = mockito::Server::new_async().await;
        mock_metadata(&mut server, 3).await;
        mock_diff(&mut server, 3, diff).await;

        let api = SequenceApi::new(vec![
            Err(()),
            Ok(r#"{"reviews": [{"lineNumber": 1, "reviewComment": "rename q"}]}"#),
        ]);
        let analyzer = analyzer(&server, Box::new(api));
        let result = analyzer.analyze_pr(&pr_url(3)).await;

        assert!(result.success);
        assert_eq!(result.total_files_analyzed, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("src/a.rs"));
        assert_eq!(result.total_comments, 1);
        assert_eq!(result.comments[0].file, "src/b.rs");
    }

    #[tokio::test]
    async fn test_metadata_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/4")
            .with_status(500)
            .create_async()
            .await;

        let analyzer = analyzer(&server, Box::new(CallCountApi::new(r#"{"reviews": []}"#)));
        let result = analyzer.analyze_pr(&pr_url(4)).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.total_files_analyzed, 0);
        assert!(result.comments.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_model_output_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        mock_metadata(&mut server, 5).await;
        mock_diff(&mut server, 5, TWO_FILE_DIFF).await;

        let analyzer = analyzer(&server, Box::new(CallCountApi::new("plain prose, no JSON here")));
        let result = analyzer.analyze_pr(&pr_url(5)).await;

        assert!(result.success);
        assert_eq!(result.total_files_analyzed, 1);
        assert_eq!(result.total_comments, 0);
        assert!(result.errors.is_empty());
    }
}
