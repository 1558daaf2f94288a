use crate::error::{IndexerError, Result};
use quill_post::{has_date_prefix, IndexMode};
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["md", "markdown"];

/// One file the scanner admitted for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub file_name: String,
    pub path: PathBuf,
}

/// Lists the blog directory and filters candidates by naming convention.
///
/// The listing is non-recursive. Files are kept when the extension is one
/// of the markdown extensions and, in hierarchical mode, the stem starts
/// with a `YYYY-MM-DD-` prefix; everything else is skipped silently
/// (logged at debug level). Candidates come back sorted by filename so
/// scan order is reproducible across reloads.
pub struct PostScanner {
    dir: PathBuf,
    mode: IndexMode,
}

impl PostScanner {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, mode: IndexMode) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            mode,
        }
    }

    pub async fn scan(&self) -> Result<Vec<Candidate>> {
        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|source| IndexerError::Scan {
                    path: self.dir.display().to_string(),
                    source,
                })?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| {
            IndexerError::Scan {
                path: self.dir.display().to_string(),
                source,
            }
        })? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !is_candidate_name(&file_name, self.mode) {
                log::debug!("Skipping {file_name}: fails naming convention");
                continue;
            }
            candidates.push(Candidate {
                file_name,
                path: entry.path(),
            });
        }

        candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(candidates)
    }
}

/// Whether a filename passes the extension and (mode-dependent) date
/// prefix checks.
#[must_use]
pub fn is_candidate_name(file_name: &str, mode: IndexMode) -> bool {
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() || !EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
        return false;
    }

    match mode {
        IndexMode::Flat => true,
        IndexMode::Hierarchical => has_date_prefix(stem),
    }
}
