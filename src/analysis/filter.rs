use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Paths that never reach the model: dependency directories,
/// version-control metadata, build output, lock files, minified bundles
/// and coverage reports.
const EXCLUDE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/*.lock",
    "**/*.min.js",
    "**/coverage/**",
];

/// Matches file paths against the fixed exclusion patterns. `**` crosses
/// path separators, `*` stays within a segment.
pub struct FileFilter {
    set: GlobSet,
}

impl FileFilter {
    pub fn new() -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in EXCLUDE_PATTERNS {
            builder.add(
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()?,
            );
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    /// True when any exclusion pattern matches the path.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}
