use crate::config::BlogConfig;
use crate::error::{IndexerError, Result};
use crate::index::PostIndex;
use crate::scanner::{Candidate, PostScanner};
use crate::stats::ReloadStats;
use quill_post::{build_post, BuildOutcome, IndexMode, PlainRenderer, Post, Renderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};

const MAX_CONCURRENT_PARSES: usize = 16;

/// The reload-and-index engine.
///
/// One `Blog` owns the scanner, the renderer and the publish handle. A
/// reload cycle scans the directory, parses every candidate concurrently,
/// builds a fresh [`PostIndex`] in private working state and publishes it
/// in one atomic swap; readers snapshot the currently published index via
/// [`Blog::index`] and never observe a cycle in progress.
pub struct Blog {
    dir: PathBuf,
    mode: IndexMode,
    renderer: Arc<dyn Renderer>,
    published: watch::Sender<Arc<PostIndex>>,
    // Single-writer guard: at most one reload cycle builds at a time.
    reload_lock: Mutex<()>,
}

impl Blog {
    /// Open a blog directory and build the initial index. A directory
    /// that cannot be scanned is fatal here; on later [`Blog::reload`]
    /// calls the same failure only aborts that cycle.
    pub async fn open(dir: impl AsRef<Path>, config: BlogConfig) -> Result<Arc<Self>> {
        Self::open_with_renderer(dir, config, Arc::new(PlainRenderer)).await
    }

    /// Open with a custom body renderer.
    pub async fn open_with_renderer(
        dir: impl AsRef<Path>,
        config: BlogConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Arc<Self>> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mode = config.mode();
        let (published, _) = watch::channel(Arc::new(PostIndex::empty(mode)));
        let blog = Arc::new(Self {
            dir,
            mode,
            renderer,
            published,
            reload_lock: Mutex::new(()),
        });

        blog.reload().await?;
        Ok(blog)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Snapshot of the currently published index. Cheap (`Arc` clone) and
    /// never blocked by an in-flight reload.
    #[must_use]
    pub fn index(&self) -> Arc<PostIndex> {
        self.published.subscribe().borrow().clone()
    }

    /// Stream of published indexes, one value per completed reload.
    #[must_use]
    pub fn index_stream(&self) -> watch::Receiver<Arc<PostIndex>> {
        self.published.subscribe()
    }

    /// Run one reload cycle: scan, parse concurrently, build, publish.
    ///
    /// Concurrent callers serialize on the reload guard, so two cycles
    /// never interleave their working state. A scan failure aborts the
    /// cycle before any state changes and the previously published index
    /// stays visible; a single file's failure only degrades or drops that
    /// record.
    pub async fn reload(&self) -> Result<ReloadStats> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();
        let mut stats = ReloadStats::new();

        log::info!("Reloading posts from {}", self.dir.display());

        let scanner = PostScanner::new(&self.dir, self.mode);
        let candidates = scanner.scan().await?;
        stats.files = candidates.len();

        let mut posts = Vec::with_capacity(candidates.len());
        for outcome in self.parse_candidates(candidates).await {
            match outcome {
                Ok(BuildOutcome::Built(post)) => posts.push(post),
                Ok(BuildOutcome::Degraded(post)) => {
                    stats.degraded += 1;
                    posts.push(post);
                }
                Ok(BuildOutcome::Skipped) => stats.skipped += 1,
                Err(error) => {
                    log::warn!("Failed to process file: {error}");
                    stats.add_error(error);
                }
            }
        }

        stats.posts = posts.len();
        let index = PostIndex::build(self.mode, posts);
        self.published.send_replace(Arc::new(index));

        #[allow(clippy::cast_possible_truncation)]
        {
            stats.time_ms = started.elapsed().as_millis() as u64;
            if stats.time_ms == 0 {
                stats.time_ms = 1;
            }
        }
        log::info!(
            "Reload published {} posts ({} skipped, {} degraded, {} errors) in {}ms",
            stats.posts,
            stats.skipped,
            stats.degraded,
            stats.errors.len(),
            stats.time_ms
        );

        Ok(stats)
    }

    /// Fan out one parse task per candidate and collect every result.
    ///
    /// Tasks run in bounded batches; awaiting each `JoinHandle` exactly
    /// once is the completion signal, so no shared counter is ever
    /// decremented from concurrent callbacks. Outcomes come back in
    /// candidate (scan) order.
    async fn parse_candidates(
        &self,
        candidates: Vec<Candidate>,
    ) -> Vec<std::result::Result<BuildOutcome, String>> {
        let mut aggregated = Vec::with_capacity(candidates.len());

        for batch in candidates.chunks(MAX_CONCURRENT_PARSES) {
            let mut tasks = Vec::with_capacity(batch.len());
            for candidate in batch {
                let candidate = candidate.clone();
                let mode = self.mode;
                let renderer = self.renderer.clone();
                let task = tokio::spawn(async move {
                    let raw = tokio::fs::read_to_string(&candidate.path)
                        .await
                        .map_err(|e| format!("{}: {e}", candidate.path.display()))?;
                    Ok(build_post(
                        &candidate.file_name,
                        &raw,
                        mode,
                        renderer.as_ref(),
                    ))
                });
                tasks.push(task);
            }

            for task in tasks {
                match task.await {
                    Ok(outcome) => aggregated.push(outcome),
                    Err(e) => aggregated.push(Err(format!("Task panicked: {e}"))),
                }
            }
        }

        aggregated
    }

    // Thin delegates over the current snapshot, for consumers that do not
    // hold onto an index.

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.index().post_count()
    }

    #[must_use]
    pub fn post_count_for_tag(&self, tag: &str) -> usize {
        self.index().post_count_for_tag(tag)
    }

    #[must_use]
    pub fn posts(&self, offset: Option<usize>, count: Option<usize>) -> Vec<Arc<Post>> {
        self.index().posts(offset, count)
    }

    #[must_use]
    pub fn posts_for_tag(
        &self,
        tag: &str,
        offset: Option<usize>,
        count: Option<usize>,
    ) -> Vec<Arc<Post>> {
        self.index().posts_for_tag(tag, offset, count)
    }

    #[must_use]
    pub fn post_by_date(&self, year: i32, month: u32, day: u32, name: &str) -> Option<Arc<Post>> {
        self.index().post_by_date(year, month, day, name)
    }

    #[must_use]
    pub fn post_by_name(&self, name: &str) -> Option<Arc<Post>> {
        self.index().post_by_name(name)
    }
}
