//! # Quill Indexer
//!
//! Reload-and-index engine for a directory of markdown posts.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> Post Scanner (extension + date-prefix convention)
//!     │      └─> Candidate files
//!     │
//!     ├──> Concurrent parse tasks (front matter + record build)
//!     │      └─> Posts
//!     │
//!     └──> PostIndex (ordered + date hierarchy + tags)
//!            └─> Atomically published snapshot
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use quill_indexer::{open, BlogConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (blog, _watcher) = open("/path/to/posts", BlogConfig::default()).await?;
//!
//!     let index = blog.index();
//!     println!("{} posts", index.post_count());
//!     for post in index.posts(Some(0), Some(10)) {
//!         println!("{}: {}", post.date.date(), post.title);
//!     }
//!     Ok(())
//! }
//! ```

mod blog;
mod config;
mod error;
mod index;
mod scanner;
mod stats;
mod watcher;

pub use blog::Blog;
pub use config::{BlogConfig, WatcherConfig};
pub use error::{IndexerError, Result};
pub use index::PostIndex;
pub use scanner::{is_candidate_name, Candidate, PostScanner};
pub use stats::ReloadStats;
pub use watcher::{BlogWatcher, ReloadUpdate, WatcherHealth};

// Re-export the document-level types consumers touch through the index.
pub use quill_post::{
    Frontmatter, IndexMode, PlainRenderer, Post, Renderer, MISSING_METADATA_TITLE,
};

use std::path::Path;
use std::sync::Arc;

/// Open a blog and, when configured, start watching it.
///
/// A watcher that fails to start is not fatal: the blog degrades to an
/// index built once at startup, with a logged warning.
pub async fn open(
    dir: impl AsRef<Path>,
    config: BlogConfig,
) -> Result<(Arc<Blog>, Option<BlogWatcher>)> {
    let blog = Blog::open(&dir, config).await?;

    let watcher = if config.watch {
        match BlogWatcher::start(blog.clone(), WatcherConfig::default()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                log::warn!(
                    "Change watching unavailable for {}: {err}; index will not refresh",
                    dir.as_ref().display()
                );
                None
            }
        }
    } else {
        None
    };

    Ok((blog, watcher))
}
