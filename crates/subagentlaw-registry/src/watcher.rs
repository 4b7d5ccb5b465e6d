//! Filesystem watcher for hot-reloading agent definitions on change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use subagentlaw_core::error::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches a set of directories for `.md` changes and calls `on_reload`
/// (debounced) whenever one settles. Owns only path filtering and burst
/// coalescing; the underlying OS-level event delivery is `notify`'s.
pub struct HotReloadWatcher {
    _watcher: RecommendedWatcher,
    handle: tokio::task::JoinHandle<()>,
}

impl HotReloadWatcher {
    pub fn start<F>(dirs: Vec<PathBuf>, on_reload: F) -> Result<Self, Error>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::configuration(e.to_string()))?;

        for dir in &dirs {
            if dir.is_dir() {
                if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                    warn!(dir = %dir.display(), error = %e, "failed to watch directory");
                }
            }
        }

        let handle = tokio::spawn(async move {
            let mut pending = false;
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) if is_relevant(&event) => {
                                debug!(?event.kind, "hot-reload candidate event");
                                pending = true;
                            }
                            Some(_) => {}
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(DEBOUNCE), if pending => {
                        pending = false;
                        on_reload();
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            handle,
        })
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

fn is_relevant(event: &Event) -> bool {
    let touches_md = event.paths.iter().any(|p| is_markdown(p));
    if !touches_md {
        return false;
    }
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}
