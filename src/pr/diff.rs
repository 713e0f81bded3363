use super::types::{Change, ChangeKind, DiffFile, Hunk};
use super::PrError;

/// Parse a unified diff string into a vector of DiffFile structs.
///
/// The input is the raw text from GitHub's diff endpoint (or the
/// synthesized fallback diff assembled from per-file patches).
///
/// Each file section starts with:
///   diff --git a/{path} b/{path}
///
/// New files have: `--- /dev/null`
/// Deleted files have: `+++ /dev/null`
///
/// Hunks start with: @@ -{old_start},{old_count} +{new_start},{new_count} @@
///
/// Lines are prefixed with '+' (added), '-' (removed) or ' ' (context).
/// Each change records a line number: the new-file line for added and
/// context lines, the old-file line for removed lines.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<DiffFile>, PrError> {
    if raw_diff.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut current_file: Option<DiffFile> = None;
    let mut current_hunk: Option<Hunk> = None;
    // Running line counters within the current hunk
    let mut old_line = 0usize;
    let mut new_line = 0usize;

    let finish_hunk = |file: &mut Option<DiffFile>, hunk: &mut Option<Hunk>| {
        if let (Some(file), Some(hunk)) = (file.as_mut(), hunk.take()) {
            file.hunks.push(hunk);
        }
    };

    let finish_file =
        |files: &mut Vec<DiffFile>, file: &mut Option<DiffFile>, hunk: &mut Option<Hunk>| {
            finish_hunk(file, hunk);
            if let Some(file) = file.take() {
                files.push(file);
            }
        };

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(&mut files, &mut current_file, &mut current_hunk);
            let mut parts = rest.split_whitespace();
            let a_path = parts
                .next()
                .ok_or_else(|| PrError::DiffParse("Missing a/ path in diff header".to_string()))?;
            let b_path = parts
                .next()
                .ok_or_else(|| PrError::DiffParse("Missing b/ path in diff header".to_string()))?;
            let from_path = a_path.strip_prefix("a/").unwrap_or(a_path).to_string();
            let to_path = b_path.strip_prefix("b/").unwrap_or(b_path).to_string();
            current_file = Some(DiffFile {
                from_path: Some(from_path),
                to_path: Some(to_path),
                hunks: Vec::new(),
            });
            continue;
        }

        if line.starts_with("@@") {
            finish_hunk(&mut current_file, &mut current_hunk);
            let (old_start, old_count, new_start, new_count) = parse_hunk_header(line)?;
            old_line = old_start;
            new_line = new_start;
            current_hunk = Some(Hunk {
                old_start,
                old_count,
                new_start,
                new_count,
                changes: Vec::new(),
            });
            continue;
        }

        if line.starts_with("--- ") || line.starts_with("+++ ") {
            if let Some(file) = current_file.as_mut() {
                let path = line[4..].trim();
                if line.starts_with("--- ") && path == "/dev/null" {
                    file.from_path = None;
                }
                if line.starts_with("+++ ") && path == "/dev/null" {
                    file.to_path = None;
                }
            }
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if current_file.is_none() {
                continue;
            }
            let (kind, line_number) = if line.starts_with('+') {
                let n = new_line;
                new_line += 1;
                (ChangeKind::Added, n)
            } else if line.starts_with('-') {
                let n = old_line;
                old_line += 1;
                (ChangeKind::Removed, n)
            } else if line.starts_with(' ') || line.is_empty() {
                // An entirely blank line is a context line whose content
                // was stripped of trailing whitespace.
                let n = new_line;
                old_line += 1;
                new_line += 1;
                (ChangeKind::Context, n)
            } else {
                // "\ No newline at end of file" and similar markers
                continue;
            };
            let content = if line.is_empty() { "" } else { &line[1..] };
            hunk.changes.push(Change {
                kind,
                line_number,
                content: content.to_string(),
            });
        }
    }

    finish_file(&mut files, &mut current_file, &mut current_hunk);
    Ok(files)
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize), PrError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| PrError::DiffParse("Invalid hunk header".to_string()))?
        .trim();
    let header = match header.find("@@") {
        Some(pos) => header[..pos].trim(),
        None => header,
    };
    let mut parts = header.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing old range".to_string()))?;
    let new_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing new range".to_string()))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;

    Ok((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str, prefix: char) -> Result<(usize, usize), PrError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| PrError::DiffParse("Invalid range prefix".to_string()))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str
        .parse::<usize>()
        .map_err(|_| PrError::DiffParse(format!("Invalid range start in {}", part)))?;
    let count = count_str
        .parse::<usize>()
        .map_err(|_| PrError::DiffParse(format!("Invalid range count in {}", part)))?;
    Ok((start, count))
}
