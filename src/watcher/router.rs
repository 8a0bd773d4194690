//! Event router and the public watcher handle.

use std::path::Path;

use crossbeam_channel::{never, select};
use parking_lot::Mutex;

use crate::config::WatcherConfig;

use super::backend::{EventStreams, NotifyBackend, RawEvent, WatchBackend};
use super::error::WatchResult;
use super::op::Op;
use super::probe::{FsProbe, PathProbe, normalize};
use super::registry::{Delivery, RegistryStats, WatchRegistry};
use super::subscriber::{SubscriberRef, deliver};

/// Shared file watcher.
///
/// Many subscribers can watch the same path; files inside a watched
/// directory share the directory's handle. Run [`observe`] on a dedicated
/// thread to deliver notifications.
///
/// # Locking
///
/// One mutex guards all registry state. It is never held while a
/// subscriber callback runs, so callbacks may call [`subscribe`] and
/// [`unsubscribe`]. Targets are snapshotted before callbacks run: a
/// subscriber removed mid-dispatch can still see that one event.
///
/// [`observe`]: Watcher::observe
/// [`subscribe`]: Watcher::subscribe
/// [`unsubscribe`]: Watcher::unsubscribe
pub struct Watcher {
    registry: Mutex<WatchRegistry>,
    streams: EventStreams,
}

impl Watcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> WatcherBuilder {
        WatcherBuilder::new()
    }

    /// Watcher over the platform's native notifications.
    pub fn new() -> WatchResult<Self> {
        WatcherBuilder::new().build()
    }

    /// Assemble a watcher from an arbitrary backend and probe.
    pub fn from_parts(
        backend: impl WatchBackend + 'static,
        streams: EventStreams,
        probe: impl PathProbe + 'static,
    ) -> Self {
        Self {
            registry: Mutex::new(WatchRegistry::new(Box::new(backend), Box::new(probe))),
            streams,
        }
    }

    /// Subscribe to changes of `path`, which need not exist yet.
    ///
    /// Fails with [`WatchError::NoCapability`] for a subscriber that handles
    /// nothing, or with the backend's error if the path can't be watched.
    ///
    /// [`WatchError::NoCapability`]: super::WatchError::NoCapability
    pub fn subscribe(&self, path: impl AsRef<Path>, subscriber: SubscriberRef) -> WatchResult<()> {
        let path = normalize(path.as_ref());
        self.registry.lock().subscribe(path, subscriber)
    }

    /// Remove `subscriber` from `path`, or every subscriber if `None`.
    ///
    /// Unknown paths and subscribers are a no-op.
    pub fn unsubscribe(
        &self,
        path: impl AsRef<Path>,
        subscriber: Option<&SubscriberRef>,
    ) -> WatchResult<()> {
        let path = normalize(path.as_ref());
        self.registry.lock().unsubscribe(&path, subscriber)
    }

    /// Dispatch notifications until the backend is closed.
    ///
    /// Blocks the calling thread. Backend errors are logged and do not
    /// stop the loop.
    pub fn observe(&self) {
        let mut events_open = true;
        let mut errors_open = true;

        crate::debug_event!("router", "observing");

        while events_open || errors_open {
            // A closed channel is swapped for `never` so select stops waking on it.
            let events = if events_open {
                self.streams.events.clone()
            } else {
                never()
            };
            let errors = if errors_open {
                self.streams.errors.clone()
            } else {
                never()
            };

            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.dispatch(event),
                    Err(_) => events_open = false,
                },
                recv(errors) -> msg => match msg {
                    Ok(err) => tracing::warn!("[router] watcher error: {err}"),
                    Err(_) => errors_open = false,
                },
            }
        }

        crate::debug_event!("router", "stopped");
    }

    /// Close the backend. A running [`observe`](Watcher::observe) returns
    /// once queued events are drained.
    pub fn close(&self) {
        self.registry.lock().close();
    }

    /// Route one low-level event.
    pub(crate) fn dispatch(&self, event: RawEvent) {
        let RawEvent { path, op } = event;
        tracing::trace!("[router] {op:?} {}", path.display());

        let (direct, renamed) = {
            let mut registry = self.registry.lock();
            let direct = registry.direct_targets(&path, op);
            // Children of a renamed directory get no events of their own.
            let renamed = registry.renamed_children(&path, op);
            if op.contains(Op::REMOVE) {
                registry.handle_gone(&path);
            }
            (direct, renamed)
        };
        invoke(direct);
        invoke(renamed);

        if op.contains(Op::REMOVE) {
            self.registry.lock().rearm_parent(&path);
        }

        if op.contains(Op::CREATE) {
            let relay = {
                let mut registry = self.registry.lock();
                registry.reconcile_created(&path);
                registry.relay_targets(&path, op)
            };
            if !relay.is_empty() {
                crate::debug_event!("router", "relay", "{}", path.display());
            }
            invoke(relay);
        }
    }

    /// Whether `path` holds its own low-level handle.
    pub fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        self.registry.lock().is_watched(&normalize(path.as_ref()))
    }

    /// Whether `path` is a directory whose handle covers its children.
    pub fn is_consolidated(&self, path: impl AsRef<Path>) -> bool {
        self.registry.lock().is_consolidated(&normalize(path.as_ref()))
    }

    /// Number of subscribers registered for `path`.
    pub fn subscriber_count(&self, path: impl AsRef<Path>) -> usize {
        self.registry.lock().subscriber_count(&normalize(path.as_ref()))
    }

    /// Number of low-level handles held.
    pub fn handle_count(&self) -> usize {
        self.registry.lock().handle_count()
    }

    /// Entry, handle and consolidated-directory counts.
    pub fn stats(&self) -> RegistryStats {
        self.registry.lock().stats()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Run deliveries with no lock held.
fn invoke(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        deliver(
            delivery.subscriber.as_ref(),
            delivery.capability,
            &delivery.path,
        );
    }
}

/// Builder for constructing a [`Watcher`] over `notify`.
pub struct WatcherBuilder {
    config: WatcherConfig,
    probe: Option<Box<dyn PathProbe>>,
}

impl WatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            config: WatcherConfig::default(),
            probe: None,
        }
    }

    /// Use the given backend settings.
    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the filesystem probe.
    pub fn probe(mut self, probe: impl PathProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Build the Watcher.
    pub fn build(self) -> WatchResult<Watcher> {
        let (backend, streams) = NotifyBackend::new(&self.config)?;
        let probe = self.probe.unwrap_or_else(|| Box::new(FsProbe));

        Ok(Watcher {
            registry: Mutex::new(WatchRegistry::new(Box::new(backend), probe)),
            streams,
        })
    }
}

impl Default for WatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
