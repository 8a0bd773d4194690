//! Low-level notification service seam.
//!
//! The registry talks to the OS only through [`WatchBackend`]; events
//! come back through [`EventStreams`]. [`NotifyBackend`] is the real
//! implementation over `notify`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use notify::{Event, RecursiveMode};

use crate::config::{BackendKind, WatcherConfig};

use super::error::{WatchError, WatchResult};
use super::op::Op;

/// One low-level change for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub op: Op,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Add/remove single-path watches against the notification service.
pub trait WatchBackend: Send {
    /// Start a non-recursive watch on `path`.
    fn add_watch(&mut self, path: &Path) -> WatchResult<()>;

    /// Stop the watch on `path`. Errors if no such watch exists.
    fn remove_watch(&mut self, path: &Path) -> WatchResult<()>;

    /// Shut the service down. Both streams close once pending items drain.
    fn close(&mut self);
}

/// Receiving halves of the service's event and error channels.
#[derive(Debug, Clone)]
pub struct EventStreams {
    pub events: Receiver<RawEvent>,
    pub errors: Receiver<WatchError>,
}

/// Sending halves matching an [`EventStreams`].
#[derive(Debug, Clone)]
pub struct EventSink {
    pub events: Sender<RawEvent>,
    pub errors: Sender<WatchError>,
}

impl EventStreams {
    /// Create a connected sink/stream pair.
    ///
    /// Unbounded: the router calls back into the backend while draining,
    /// so a full channel could stall the service thread it is waiting on.
    pub fn channel() -> (EventSink, EventStreams) {
        let (event_tx, event_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        (
            EventSink {
                events: event_tx,
                errors: error_tx,
            },
            EventStreams {
                events: event_rx,
                errors: error_rx,
            },
        )
    }
}

impl EventSink {
    /// Forward a `notify` callback result into the streams.
    pub fn forward(&self, res: notify::Result<Event>) {
        match res {
            Ok(event) => {
                for raw in translate(event) {
                    // Receiver gone means the router stopped; nothing to do.
                    let _ = self.events.send(raw);
                }
            }
            Err(e) => {
                let _ = self.errors.send(WatchError::Backend {
                    details: e.to_string(),
                });
            }
        }
    }
}

/// Split a `notify` event into per-path raw events.
pub fn translate(event: Event) -> Vec<RawEvent> {
    let op = Op::from_kind(&event.kind);
    if op.is_empty() {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .map(|path| RawEvent { path, op })
        .collect()
}

/// [`WatchBackend`] over a `notify` watcher.
pub struct NotifyBackend {
    watcher: Option<Box<dyn notify::Watcher + Send>>,
    kind: BackendKind,
}

impl NotifyBackend {
    /// Create the OS watcher described by `config`.
    pub fn new(config: &WatcherConfig) -> WatchResult<(Self, EventStreams)> {
        let (sink, streams) = EventStreams::channel();

        let watcher: Box<dyn notify::Watcher + Send> = match config.backend {
            BackendKind::Native => {
                let sink = sink.clone();
                Box::new(notify::recommended_watcher(move |res| sink.forward(res))?)
            }
            BackendKind::Poll => {
                let notify_config = notify::Config::default()
                    .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
                    .with_compare_contents(config.compare_contents);
                let sink = sink.clone();
                Box::new(notify::PollWatcher::new(
                    move |res| sink.forward(res),
                    notify_config,
                )?)
            }
        };

        crate::log_event!("backend", "started", "{:?}", config.backend);

        Ok((
            Self {
                watcher: Some(watcher),
                kind: config.backend,
            },
            streams,
        ))
    }

    /// Which notify implementation is in use.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("kind", &self.kind)
            .field("open", &self.watcher.is_some())
            .finish()
    }
}

impl WatchBackend for NotifyBackend {
    fn add_watch(&mut self, path: &Path) -> WatchResult<()> {
        let watcher = self.watcher.as_mut().ok_or_else(|| WatchError::AddWatch {
            path: path.to_path_buf(),
            reason: "watcher is closed".to_string(),
        })?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::AddWatch {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn remove_watch(&mut self, path: &Path) -> WatchResult<()> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or_else(|| WatchError::RemoveWatch {
                path: path.to_path_buf(),
                reason: "watcher is closed".to_string(),
            })?;
        watcher.unwatch(path).map_err(|e| WatchError::RemoveWatch {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn close(&mut self) {
        // Dropping the watcher drops its callback and with it the senders.
        if self.watcher.take().is_some() {
            crate::log_event!("backend", "closed");
        }
    }
}
