use crate::blog::Blog;
use crate::config::WatcherConfig;
use crate::error::{IndexerError, Result};
use crate::stats::ReloadStats;
use log::{error, info, warn};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time;

const DEFAULT_REASON: &str = "fs_event";

/// Broadcast after every reload cycle the watcher runs.
#[derive(Debug, Clone)]
pub struct ReloadUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub stats: Option<ReloadStats>,
    pub success: bool,
    pub reason: String,
}

/// Rolling view of the watcher loop, published on a watch channel.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherHealth {
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_duration_ms: Option<u64>,
    pub pending_events: usize,
    pub reloading: bool,
}

impl WatcherHealth {
    fn initial() -> Self {
        Self {
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
            last_duration_ms: None,
            pending_events: 0,
            reloading: false,
        }
    }
}

/// Keeps the blog index current by reacting to filesystem notifications.
///
/// Change events are debounced and coalesced: the reload loop runs one
/// cycle at a time, and events arriving mid-cycle stay queued on the
/// event channel, producing exactly one follow-up cycle after the current
/// one publishes.
#[derive(Clone)]
pub struct BlogWatcher {
    inner: Arc<BlogWatcherInner>,
}

struct BlogWatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<ReloadUpdate>,
    health_tx: watch::Sender<WatcherHealth>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

enum WatcherCommand {
    Trigger { reason: String },
    Shutdown,
}

impl BlogWatcher {
    pub fn start(blog: Arc<Blog>, config: WatcherConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (health_tx, _) = watch::channel(WatcherHealth::initial());
        let (update_tx, _) = broadcast::channel(32);

        let watcher = create_fs_watcher(blog.dir(), event_tx, config.notify_poll_interval)?;

        spawn_reload_loop(
            blog,
            config,
            event_rx,
            command_rx,
            update_tx.clone(),
            health_tx.clone(),
        );

        Ok(Self {
            inner: Arc::new(BlogWatcherInner {
                command_tx,
                update_tx,
                health_tx,
                _watcher: std::sync::Mutex::new(Some(watcher)),
            }),
        })
    }

    /// Request a reload regardless of filesystem activity.
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Trigger {
                reason: reason.into(),
            })
            .await
            .map_err(|e| IndexerError::Other(format!("failed to send trigger: {e}")))?;
        Ok(())
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<ReloadUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> WatcherHealth {
        self.inner.health_tx.subscribe().borrow().clone()
    }

    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<WatcherHealth> {
        self.inner.health_tx.subscribe()
    }
}

impl Drop for BlogWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn create_fs_watcher(
    dir: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let dir = dir.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
    // The scanner is non-recursive, so the watch is too.
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", dir.display())))?;
    Ok(watcher)
}

fn spawn_reload_loop(
    blog: Arc<Blog>,
    config: WatcherConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<ReloadUpdate>,
    health_tx: watch::Sender<WatcherHealth>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);
        let mut health = WatcherHealth::initial();

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    if handle_event(event, &mut state) {
                        health.pending_events = state.pending();
                        let _ = health_tx.send(health.clone());
                    }
                }
                Some(cmd) = command_rx.recv() => {
                    match cmd {
                        WatcherCommand::Trigger { reason } => {
                            state.force_run(reason);
                            health.pending_events = state.pending();
                            let _ = health_tx.send(health.clone());
                        }
                        WatcherCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if state.should_run() && next_deadline.is_some() => {
                    health.reloading = true;
                    let _ = health_tx.send(health.clone());

                    let reason = state
                        .take_reason()
                        .unwrap_or_else(|| DEFAULT_REASON.to_string());
                    match run_reload_cycle(&blog, reason).await {
                        Ok((stats, duration, reason)) => {
                            health.last_success = Some(SystemTime::now());
                            health.last_error = None;
                            health.consecutive_failures = 0;
                            health.last_duration_ms = Some(duration);
                            health.reloading = false;
                            health.pending_events = 0;
                            let _ = health_tx.send(health.clone());
                            let _ = update_tx.send(ReloadUpdate {
                                completed_at: SystemTime::now(),
                                duration_ms: duration,
                                stats: Some(stats),
                                success: true,
                                reason,
                            });
                        }
                        Err((err, duration, reason)) => {
                            error!("Watched reload failure: {err}");
                            health.last_error = Some(err.clone());
                            health.consecutive_failures += 1;
                            health.last_duration_ms = Some(duration);
                            health.reloading = false;
                            health.pending_events = 0;
                            let _ = health_tx.send(health.clone());
                            let _ = update_tx.send(ReloadUpdate {
                                completed_at: SystemTime::now(),
                                duration_ms: duration,
                                stats: None,
                                success: false,
                                reason,
                            });
                        }
                    }

                    state.reset();
                }
            }
        }
    });
}

async fn run_reload_cycle(
    blog: &Blog,
    reason: String,
) -> std::result::Result<(ReloadStats, u64, String), (String, u64, String)> {
    let started = Instant::now();
    match blog.reload().await {
        Ok(stats) => {
            #[allow(clippy::cast_possible_truncation)]
            let duration = started.elapsed().as_millis() as u64;
            info!("Watched reload finished in {duration}ms");
            Ok((stats, duration, reason))
        }
        Err(e) => {
            #[allow(clippy::cast_possible_truncation)]
            let duration = started.elapsed().as_millis() as u64;
            Err((e.to_string(), duration, reason))
        }
    }
}

fn handle_event(event: notify::Result<Event>, state: &mut DebounceState) -> bool {
    match event {
        Ok(evt) => {
            if evt.paths.is_empty() {
                state.record_event(1, DEFAULT_REASON);
                return true;
            }

            let mut relevant = 0;
            for path in evt.paths {
                if is_relevant_path(&path) && state.record_path_if_new(&path) {
                    relevant += 1;
                }
            }
            if relevant > 0 {
                state.record_event(relevant, DEFAULT_REASON);
                return true;
            }
            false
        }
        Err(err) => {
            warn!("Watcher error: {err}");
            false
        }
    }
}

fn is_relevant_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_lowercase();
            ext == "md" || ext == "markdown"
        })
}

struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    dirty: bool,
    pending: usize,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    reason: Option<String>,
    force_immediate: bool,
    recent_paths: VecDeque<(String, Instant)>,
    dedup_window: Duration,
}

impl DebounceState {
    const fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            dirty: false,
            pending: 0,
            last_event: None,
            first_event: None,
            reason: None,
            force_immediate: false,
            recent_paths: VecDeque::new(),
            dedup_window: Duration::from_millis(750),
        }
    }

    fn record_event(&mut self, count: usize, reason: &str) {
        self.pending += count.max(1);
        self.reason = Some(reason.to_string());
        self.last_event = Some(Instant::now());
        self.first_event.get_or_insert_with(Instant::now);
        self.dirty = true;
    }

    fn force_run(&mut self, reason: String) {
        self.pending += 1;
        self.reason = Some(reason);
        self.force_immediate = true;
        self.dirty = true;
    }

    const fn pending(&self) -> usize {
        self.pending
    }

    const fn should_run(&self) -> bool {
        self.dirty
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if !self.dirty {
            return None;
        }

        if self.force_immediate {
            return Some(time::Instant::now());
        }

        let mut deadline = None;

        if let Some(last) = self.last_event {
            deadline = Some(last + self.debounce);
        }

        if let Some(first) = self.first_event {
            let forced = first + self.max_batch;
            deadline = Some(match deadline {
                Some(current) if forced < current => forced,
                Some(current) => current,
                None => forced,
            });
        }

        deadline.map(time::Instant::from_std)
    }

    fn take_reason(&mut self) -> Option<String> {
        self.reason.take()
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.pending = 0;
        self.last_event = None;
        self.first_event = None;
        self.reason = None;
        self.force_immediate = false;
        self.recent_paths.clear();
    }

    #[cfg(test)]
    const fn force_flag(&self) -> bool {
        self.force_immediate
    }

    fn record_path_if_new(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        let key = path.to_string_lossy().to_string();
        self.recent_paths
            .retain(|(_, ts)| now.duration_since(*ts) <= self.dedup_window);
        let already = self.recent_paths.iter().any(|(p, _)| p == &key);
        if !already {
            self.recent_paths.push_back((key, now));
            true
        } else {
            false
        }
    }
}
