mod analysis;
mod config;
mod pr;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// AI PR Reviewer — CLI tool that fetches a GitHub Pull Request diff,
/// asks a completion model to review each changed file, and prints
/// line-anchored feedback.
#[derive(Parser, Debug)]
#[command(name = "ai-pr-reviewer", version, about)]
struct Cli {
    /// GitHub PR URL (e.g., https://github.com/org/repo/pull/42) or an
    /// "owner/repo" shorthand paired with a PR number
    repo: String,

    /// PR number, required when the repository is given as "owner/repo"
    pr_number: Option<u64>,

    /// Model identifier sent to the completion API
    #[arg(long)]
    model: Option<String>,

    /// Completion API key (overrides config file and environment)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion endpoint
    #[arg(long)]
    api_base_url: Option<String>,

    /// Optional output file path for a markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let _main_span = info_span!("pr_review", target = %cli.repo).entered();

    info!("parsing PR target");
    let pr_url = pr::parse_pr_target(&cli.repo, cli.pr_number)?;
    debug!(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number, "parsed PR target");

    info!("loading configuration");
    let mut config = config::Config::load()?;
    if let Some(model) = cli.model {
        config.api.model = Some(model);
    }
    if let Some(key) = cli.api_key {
        config.api.key = Some(key);
    }
    if let Some(base_url) = cli.api_base_url {
        config.api.base_url = Some(base_url);
    }

    // Credentials are validated up front, before any network activity
    let github_token = config.github_token().ok_or(
        "GitHub token not found. Set GITHUB_TOKEN or [github].token in .ai-pr-reviewer.toml",
    )?;
    let api_key = config.api_key().ok_or(
        "Completion API key not found. Set OPENROUTER_API_KEY, OPENAI_API_KEY or [api].key in .ai-pr-reviewer.toml",
    )?;

    let github = pr::GithubClient::new(github_token);
    let completion = analysis::llm::CompletionClient::new(
        config.api_base_url(),
        api_key,
        config.model().to_string(),
    );

    info!(model = %config.model(), "starting analysis");
    let analyzer = analysis::Analyzer::new(github, Box::new(completion))?;
    let result = analyzer.analyze_pr(&pr_url).await;
    info!(
        success = result.success,
        files = result.total_files_analyzed,
        comments = result.total_comments,
        "analysis finished"
    );

    report::output(&result, cli.output.as_deref())?;

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
