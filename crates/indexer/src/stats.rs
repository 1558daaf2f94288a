use serde::{Deserialize, Serialize};

/// Counters for one reload cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadStats {
    /// Candidate files the scanner produced.
    pub files: usize,
    /// Records published in the new index.
    pub posts: usize,
    /// Candidates that yielded no record this cycle (no usable date).
    pub skipped: usize,
    /// Records published with the sentinel title (absent or malformed
    /// front matter).
    pub degraded: usize,
    pub time_ms: u64,
    pub errors: Vec<String>,
}

impl ReloadStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
