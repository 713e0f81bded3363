/// Identifies the pull request under review. Constructed once per
/// invocation and threaded through the whole pipeline.
#[derive(Debug, Clone)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

impl PrUrl {
    /// "owner/repo" form used in reports and error messages.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// PR metadata fetched from the GitHub API. Title and body feed the
/// review prompt; body is normalized to an empty string when GitHub
/// returns null.
#[derive(Debug, Clone)]
pub struct PrInfo {
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// A single file within the PR diff.
#[derive(Debug, Clone)]
pub struct DiffFile {
    /// Pre-change path ("a/" side), absent for newly added files
    pub from_path: Option<String>,
    /// Post-change path ("b/" side), absent for deleted files
    pub to_path: Option<String>,
    /// Hunks (contiguous changed regions)
    pub hunks: Vec<Hunk>,
}

impl DiffFile {
    /// Effective path for filtering and reporting: the post-change path,
    /// falling back to the pre-change path when the file was deleted.
    pub fn path(&self) -> &str {
        self.to_path
            .as_deref()
            .or(self.from_path.as_deref())
            .unwrap_or("unknown")
    }
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone)]
#[allow(dead_code)] // Structural range fields populated by the parser, consumed as the API grows
pub struct Hunk {
    /// Starting line number in the old file
    pub old_start: usize,
    /// Number of lines in the old file
    pub old_count: usize,
    /// Starting line number in the new file
    pub new_start: usize,
    /// Number of lines in the new file
    pub new_count: usize,
    /// Changed and context lines in diff order
    pub changes: Vec<Change>,
}

/// One line of a hunk.
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    /// New-file line number for added/context lines, old-file line
    /// number for removed lines.
    pub line_number: usize,
    /// Line text without the leading diff marker
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Context,
}

impl ChangeKind {
    /// One-character marker used when flattening hunks for the model.
    pub fn marker(&self) -> char {
        match self {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
            ChangeKind::Context => ' ',
        }
    }
}
