//! Reload a registry when its database file changes
//!
//! The watcher observes the file's parent directory, so replacing the
//! database by renaming a new file over it (the safe way to publish a new
//! version) is picked up the same way as an in-place write. Bursts of events
//! are debounced; the reload runs once the file has been quiet for
//! [`DEBOUNCE`].

use crate::registry::LocatorRegistry;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Quiet period after the last change before reloading
pub const DEBOUNCE: Duration = Duration::from_millis(200);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors starting a watcher
#[derive(Debug, Error)]
pub enum WatchError {
    /// The database path could not be resolved
    #[error("cannot watch {path}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The platform watcher refused the directory
    #[error("file watcher error")]
    Notify(#[from] notify::Error),
}

/// Background thread reloading a registry on file changes
///
/// Stops and joins its thread when dropped.
///
/// ```no_run
/// use iploc::{LocatorRegistry, ReloadWatcher};
/// use std::sync::Arc;
///
/// let registry = Arc::new(LocatorRegistry::new());
/// registry.initialize("17monipdb.dat")?;
/// let _watcher = ReloadWatcher::spawn(Arc::clone(&registry), "17monipdb.dat")?;
/// // Lookups now follow the file.
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ReloadWatcher {
    path: PathBuf,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    _watcher: RecommendedWatcher,
}

impl ReloadWatcher {
    /// Start watching `path`, reloading `registry` from it on change
    pub fn spawn(
        registry: Arc<LocatorRegistry>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, WatchError> {
        let path = path.into();
        let io_error = |source| WatchError::Io {
            path: path.display().to_string(),
            source,
        };

        // Resolve symlinks so event paths compare equal
        let path = path.canonicalize().map_err(io_error)?;
        let (dir, file_name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
            _ => {
                return Err(WatchError::Io {
                    path: path.display().to_string(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "not a file path"),
                })
            }
        };

        let (event_tx, event_rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // The loop may have exited; nothing to do then.
            let _ = event_tx.send(event);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let thread_path = path.clone();
        let handle = thread::Builder::new()
            .name("iploc-watch".to_string())
            .spawn(move || watch_loop(registry, thread_path, file_name, event_rx, shutdown_rx))
            .map_err(|source| WatchError::Io {
                path: path.display().to_string(),
                source,
            })?;

        log::debug!("watching {} for changes", path.display());
        Ok(Self {
            path,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            _watcher: watcher,
        })
    }

    /// Resolved path being watched
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching and wait for the thread to exit
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("watcher thread for {} panicked", self.path.display());
            }
        }
    }
}

fn watch_loop(
    registry: Arc<LocatorRegistry>,
    path: PathBuf,
    file_name: OsString,
    events: Receiver<notify::Result<Event>>,
    shutdown: Receiver<()>,
) {
    let mut last_change: Option<Instant> = None;

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(events) -> msg => match msg {
                Ok(Ok(event)) => {
                    if is_content_change(&event.kind) && touches(&event, &file_name) {
                        last_change = Some(Instant::now());
                    }
                }
                Ok(Err(e)) => log::warn!("file watcher error on {}: {}", path.display(), e),
                Err(_) => break,
            },
            default(POLL_INTERVAL) => {}
        }

        if last_change.is_some_and(|t| t.elapsed() >= DEBOUNCE) {
            last_change = None;
            // A failed reload is logged by the registry and the old
            // generation keeps serving.
            if let Ok(generation) = registry.reload(path.as_path()) {
                log::debug!("{} changed, now at generation {}", path.display(), generation);
            }
        }
    }

    log::debug!("stopped watching {}", path.display());
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
