pub mod types;

pub use types::AnalysisResult;

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Output the result to terminal (default) or to a markdown file.
#[instrument(skip(result), fields(pr = result.pr_number, success = result.success))]
pub fn output(result: &AnalysisResult, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(result);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(result, path)
        }
    }
}

/// Format and print the result to the terminal with colors.
fn print_terminal_report(result: &AnalysisResult) {
    println!();
    if result.success {
        println!("{}", "Analysis Complete".green().bold());
        println!("  Repository: {}", result.repository);
        println!("  PR Number: #{}", result.pr_number);
        println!("  Files Analyzed: {}", result.total_files_analyzed);
        println!("  Issues Found: {}", result.total_comments);

        if !result.comments.is_empty() {
            println!();
            println!("Issues:");
            for (index, comment) in result.comments.iter().enumerate() {
                println!(
                    "  {}. [{}:{}]",
                    index + 1,
                    comment.file.bold(),
                    comment.line
                );
                println!("     {}", comment.comment);
                println!();
            }
        }

        if !result.errors.is_empty() {
            println!();
            println!("{}", "Warnings:".yellow().bold());
            for error in &result.errors {
                println!("  • {}", error);
            }
        }
    } else {
        println!("{}", "Analysis Failed".red().bold());
        println!("  Repository: {}", result.repository);
        println!("  PR Number: #{}", result.pr_number);
        if !result.errors.is_empty() {
            println!();
            println!("Errors:");
            for error in &result.errors {
                println!("  • {}", error);
            }
        }
    }
    println!();
}

/// Write the result as a markdown file: summary header, one section per
/// comment, errors at the end.
fn write_markdown_report(result: &AnalysisResult, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!(
        "# Review of {} #{}\n\n",
        result.repository, result.pr_number
    ));
    md.push_str(&format!(
        "**Status:** {} | **Files analyzed:** {} | **Issues found:** {}\n\n",
        if result.success { "complete" } else { "failed" },
        result.total_files_analyzed,
        result.total_comments
    ));

    if !result.comments.is_empty() {
        md.push_str("## Issues\n\n");
        for (index, comment) in result.comments.iter().enumerate() {
            md.push_str(&format!(
                "{}. `{}:{}` {}\n",
                index + 1,
                comment.file,
                comment.line,
                comment.comment
            ));
        }
        md.push('\n');
    }

    if !result.errors.is_empty() {
        md.push_str("## Errors\n\n");
        for error in &result.errors {
            md.push_str(&format!("- {}\n", error));
        }
        md.push('\n');
    }

    std::fs::write(path, md)?;
    Ok(())
}
