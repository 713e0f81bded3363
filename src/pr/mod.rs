pub mod diff;
pub mod types;

pub use types::{DiffFile, PrInfo, PrUrl};

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "ai-pr-reviewer";

/// Number of changed files requested per page when assembling the
/// fallback diff.
const FILES_PER_PAGE: usize = 100;
/// Files processed per batch in the fallback, with a pause between
/// batches to stay under GitHub's secondary rate limits.
const FALLBACK_BATCH_SIZE: usize = 10;
const FALLBACK_BATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("PR number is required when the repository is given as owner/repo")]
    MissingPrNumber,

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),
}

/// Resolve the CLI's repository argument into a PrUrl.
///
/// Accepts either a full PR URL (https://github.com/{owner}/{repo}/pull/{n})
/// or an "owner/repo" shorthand paired with an explicit PR number.
pub fn parse_pr_target(target: &str, pr_number: Option<u64>) -> Result<PrUrl, PrError> {
    if target.contains("github.com") {
        return parse_pr_url(target);
    }

    let cleaned = target.trim().trim_end_matches(".git");
    let mut parts = cleaned.split('/').filter(|s| !s.is_empty());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) => Ok(PrUrl {
            owner: owner.to_string(),
            repo: repo.to_string(),
            pr_number: pr_number.ok_or(PrError::MissingPrNumber)?,
        }),
        _ => Err(PrError::InvalidUrl(target.to_string())),
    }
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// One entry from the paged changed-files listing. Binary files carry no
/// patch and contribute nothing to the fallback diff.
#[derive(Debug, Deserialize)]
struct PrFileEntry {
    filename: String,
    patch: Option<String>,
}

/// Thin client over the GitHub REST API endpoints the pipeline needs:
/// PR metadata, the diff representation, and the paged file listing used
/// by the large-diff fallback.
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, GITHUB_API_URL.to_string())
    }

    /// Point the client at a different API root (GitHub Enterprise, or a
    /// mock server in tests).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn pull_url(&self, pr: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_url, pr.owner, pr.repo, pr.pr_number
        )
    }

    /// Fetch PR metadata (title and description feed the review prompt).
    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    pub async fn fetch_pr_info(&self, pr: &PrUrl) -> Result<PrInfo, PrError> {
        #[derive(Deserialize)]
        struct PullResponse {
            number: u64,
            title: String,
            body: Option<String>,
        }

        debug!("fetching PR metadata from GitHub API");
        let response = self
            .client
            .get(self.pull_url(pr))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        let metadata = response.json::<PullResponse>().await?;
        debug!(title = %metadata.title, "received PR metadata");

        Ok(PrInfo {
            number: metadata.number,
            title: metadata.title,
            body: metadata.body.unwrap_or_default(),
        })
    }

    /// Fetch the PR's unified diff.
    ///
    /// GitHub refuses to render very large diffs in the diff media type
    /// and answers 406 Not Acceptable; in that case the diff is assembled
    /// from the per-file patches instead. Any other failure propagates.
    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    pub async fn fetch_diff(&self, pr: &PrUrl) -> Result<String, PrError> {
        debug!("fetching PR diff from GitHub API");
        let response = self
            .client
            .get(self.pull_url(pr))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github.diff")
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_ACCEPTABLE {
            info!("diff too large to render, assembling from per-file patches");
            return self.fetch_diff_from_files(pr).await;
        }

        let diff_text = response.error_for_status()?.text().await?;
        debug!(diff_bytes = diff_text.len(), "received PR diff");
        Ok(diff_text)
    }

    /// Fallback for diffs too large for the diff media type: page through
    /// the changed-files listing and concatenate each file's patch under a
    /// synthesized `diff --git` header, in listing order.
    async fn fetch_diff_from_files(&self, pr: &PrUrl) -> Result<String, PrError> {
        let mut entries = Vec::new();
        let mut page = 1usize;
        loop {
            let url = format!(
                "{}/files?per_page={}&page={}",
                self.pull_url(pr),
                FILES_PER_PAGE,
                page
            );
            let batch: Vec<PrFileEntry> = self
                .client
                .get(&url)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/vnd.github+json")
                .bearer_auth(&self.token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let count = batch.len();
            entries.extend(batch);
            if count < FILES_PER_PAGE {
                break;
            }
            page += 1;
        }
        debug!(files = entries.len(), "listed changed files for fallback diff");

        let mut combined = String::new();
        let mut batches = entries.chunks(FALLBACK_BATCH_SIZE).peekable();
        while let Some(batch) = batches.next() {
            for entry in batch {
                if let Some(patch) = &entry.patch {
                    combined.push_str(&format!(
                        "diff --git a/{path} b/{path}\n{patch}\n",
                        path = entry.filename,
                        patch = patch
                    ));
                }
            }
            // No pause after the final batch
            if batches.peek().is_some() {
                tokio::time::sleep(FALLBACK_BATCH_PAUSE).await;
            }
        }
        Ok(combined)
    }
}
