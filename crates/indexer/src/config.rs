use quill_post::IndexMode;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct BlogConfig {
    /// Disable date-hierarchical indexing: identify posts by filename
    /// alone and date them from front matter.
    pub flat: bool,
    /// React to filesystem change notifications. When disabled (or when
    /// the watcher cannot start) the index is built once at startup and
    /// never refreshed.
    pub watch: bool,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            flat: false,
            watch: true,
        }
    }
}

impl BlogConfig {
    #[must_use]
    pub const fn mode(&self) -> IndexMode {
        if self.flat {
            IndexMode::Flat
        } else {
            IndexMode::Hierarchical
        }
    }
}

/// Watcher timing knobs.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period after the last event before a reload runs.
    pub debounce: Duration,
    /// Upper bound on how long a busy directory can defer a reload.
    pub max_batch_wait: Duration,
    /// Poll interval for notify backends that need one.
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            max_batch_wait: Duration::from_secs(3),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}
