//! Watch registry: subscriptions, low-level handles and consolidation.
//!
//! The registry owns three pieces of state:
//! - `entries`: path -> subscribers
//! - `active`: paths holding a real handle on the backend
//! - `consolidated`: directories whose single handle covers their children
//!
//! A file whose parent directory is consolidated never holds its own
//! handle; events for it arrive through the parent's watch and are routed
//! by path. Consolidation is one level deep.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backend::WatchBackend;
use super::error::{WatchError, WatchResult};
use super::op::Op;
use super::probe::{PathKind, PathProbe};
use super::subscriber::{Capabilities, SubscriberRef};

/// One callback invocation computed under the lock and run after it.
#[derive(Clone)]
pub(crate) struct Delivery {
    pub subscriber: SubscriberRef,
    pub capability: Capabilities,
    pub path: PathBuf,
}

/// Snapshot of registry sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Paths with at least one subscriber.
    pub entries: usize,
    /// Low-level handles currently held.
    pub handles: usize,
    /// Directories covering their children.
    pub consolidated: usize,
}

/// Subscription bookkeeping over a [`WatchBackend`].
pub struct WatchRegistry {
    backend: Box<dyn WatchBackend>,
    probe: Box<dyn PathProbe>,
    entries: HashMap<PathBuf, Vec<SubscriberRef>>,
    active: HashSet<PathBuf>,
    consolidated: HashSet<PathBuf>,
}

impl WatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>, probe: Box<dyn PathProbe>) -> Self {
        Self {
            backend,
            probe,
            entries: HashMap::new(),
            active: HashSet::new(),
            consolidated: HashSet::new(),
        }
    }

    /// Register `subscriber` for `path`.
    ///
    /// The path need not exist: its nearest existing ancestor gets a silent
    /// watch and the subscription stays pending until the path appears.
    /// On failure nothing about `path` changes.
    pub fn subscribe(&mut self, path: PathBuf, subscriber: SubscriberRef) -> WatchResult<()> {
        if subscriber.capabilities().is_empty() {
            return Err(WatchError::NoCapability);
        }

        let kind = self.probe.probe(&path);
        if kind == PathKind::Missing {
            crate::debug_event!("registry", "missing, watching parent", "{}", path.display());
            if let Some(parent) = path.parent() {
                self.ensure_silent_watch(parent);
            }
        }

        self.entries.entry(path.clone()).or_default().push(subscriber);

        if let Err(e) = self.arm(&path, kind) {
            if let Some(list) = self.entries.get_mut(&path) {
                list.pop();
                if list.is_empty() {
                    self.entries.remove(&path);
                    self.prune_silent_ancestors(&path);
                }
            }
            return Err(e);
        }

        crate::debug_event!("registry", "subscribed", "{}", path.display());
        Ok(())
    }

    /// Drop one subscriber, or every subscriber when `subscriber` is `None`.
    ///
    /// Releasing the last subscriber releases the path's handle. If that
    /// fails the subscriber stays registered and the error is returned.
    pub fn unsubscribe(
        &mut self,
        path: &Path,
        subscriber: Option<&SubscriberRef>,
    ) -> WatchResult<()> {
        let Some(list) = self.entries.get_mut(path) else {
            return Ok(());
        };

        if let Some(subscriber) = subscriber {
            let Some(idx) = list
                .iter()
                .position(|s| std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(subscriber)))
            else {
                return Ok(());
            };
            if list.len() > 1 {
                list.swap_remove(idx);
                return Ok(());
            }
        }

        self.remove_low_level_watch(path)?;
        self.entries.remove(path);
        self.prune_silent_ancestors(path);
        crate::debug_event!("registry", "unsubscribed", "{}", path.display());
        Ok(())
    }

    /// Release the handle on `path`, if any, splitting it if consolidated.
    ///
    /// A consolidated directory that still covers a registered child which
    /// does not exist yet keeps its handle as a silent watch.
    pub fn remove_low_level_watch(&mut self, path: &Path) -> WatchResult<()> {
        if !self.active.contains(path) {
            return Ok(());
        }
        if self.consolidated.contains(path) && self.has_pending_descendants(path) {
            crate::debug_event!("registry", "kept for pending paths", "{}", path.display());
            return Ok(());
        }

        self.backend.remove_watch(path)?;
        self.active.remove(path);
        crate::debug_event!("registry", "unwatched", "{}", path.display());

        if self.consolidated.contains(path) {
            self.split(path);
        }
        Ok(())
    }

    /// Give every registered child of `dir` its own handle again.
    fn split(&mut self, dir: &Path) {
        self.consolidated.remove(dir);
        for child in self.children_of(dir) {
            let kind = self.probe.probe(&child);
            if let Err(e) = self.arm(&child, kind) {
                tracing::warn!("[registry] could not re-watch {}: {e}", child.display());
            }
        }
        crate::debug_event!("registry", "split", "{}", dir.display());
    }

    /// Let the handle on `dir` cover its children.
    fn consolidate(&mut self, dir: &Path) {
        if !self.consolidated.insert(dir.to_path_buf()) {
            return;
        }

        let absorbed: Vec<PathBuf> = self
            .active
            .iter()
            .filter(|p| p.parent() == Some(dir) && !self.consolidated.contains(*p))
            .cloned()
            .collect();

        for child in absorbed {
            match self.backend.remove_watch(&child) {
                Ok(()) => {
                    self.active.remove(&child);
                }
                Err(e) => {
                    tracing::warn!("[registry] couldn't unwatch {}: {e}", child.display());
                }
            }
        }
        crate::debug_event!("registry", "consolidated", "{}", dir.display());
    }

    /// Make sure `path` is observed, acquiring a handle if nothing covers it.
    fn arm(&mut self, path: &Path, kind: PathKind) -> WatchResult<()> {
        if self.active.contains(path) {
            if kind == PathKind::Directory {
                self.consolidate(path);
            }
            return Ok(());
        }

        if kind == PathKind::Missing && self.observed_ancestor(path).is_some() {
            crate::debug_event!("registry", "pending", "{}", path.display());
            return Ok(());
        }

        if kind != PathKind::Directory && self.parent_consolidated(path) {
            return Ok(());
        }

        self.backend.add_watch(path)?;
        self.active.insert(path.to_path_buf());
        crate::debug_event!("registry", "watching", "{}", path.display());

        if kind == PathKind::Directory {
            self.consolidate(path);
        }
        Ok(())
    }

    /// Watch the nearest existing directory at or above `dir` without a
    /// subscriber. Failures are logged.
    fn ensure_silent_watch(&mut self, dir: &Path) {
        let mut current = dir;
        loop {
            if self.active.contains(current) {
                return;
            }
            match self.probe.probe(current) {
                PathKind::Missing => match current.parent() {
                    Some(parent) => current = parent,
                    None => return,
                },
                PathKind::File => {
                    tracing::warn!("[registry] not a directory: {}", current.display());
                    return;
                }
                PathKind::Directory => {
                    if let Err(e) = self.arm(current, PathKind::Directory) {
                        tracing::warn!("[registry] silent watch failed: {e}");
                    }
                    return;
                }
            }
        }
    }

    /// Release silent ancestor watches that no longer cover anything.
    fn prune_silent_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if self.entries.contains_key(ancestor) || self.covers_registered(ancestor) {
                return;
            }
            if !self.active.contains(ancestor) {
                continue;
            }
            if let Err(e) = self.backend.remove_watch(ancestor) {
                tracing::warn!("[registry] couldn't release {}: {e}", ancestor.display());
                return;
            }
            self.active.remove(ancestor);
            self.consolidated.remove(ancestor);
            crate::debug_event!("registry", "released silent", "{}", ancestor.display());
        }
    }

    // ---- router entry points ----

    /// Deliveries for an event on `path` itself.
    pub(crate) fn direct_targets(&self, path: &Path, op: Op) -> Vec<Delivery> {
        let mut caps = Capabilities::triggered_by(op);
        if self.consolidated.contains(path) {
            caps.remove(Capabilities::CHANGED);
        }
        self.deliveries(path, path, caps)
    }

    /// Synthesized deliveries for children of a renamed consolidated directory.
    pub(crate) fn renamed_children(&self, dir: &Path, op: Op) -> Vec<Delivery> {
        if !op.contains(Op::RENAME) || !self.consolidated.contains(dir) {
            return Vec::new();
        }
        self.children_of(dir)
            .iter()
            .flat_map(|child| self.direct_targets(child, op))
            .collect()
    }

    /// The target of `path` was deleted; its handle died with it.
    ///
    /// Called before any callback sees the removal; `on_removed` may
    /// unsubscribe without touching the dead handle.
    pub(crate) fn handle_gone(&mut self, path: &Path) {
        if self.active.remove(path) {
            crate::debug_event!("registry", "handle gone", "{}", path.display());
        }
        self.consolidated.remove(path);
    }

    /// Watch the parent of a deleted `path` so a re-creation is still seen.
    ///
    /// Skipped once nothing at or below `path` is registered.
    pub(crate) fn rearm_parent(&mut self, path: &Path) {
        if !self.entries.contains_key(path) && !self.covers_registered(path) {
            return;
        }
        if let Some(parent) = path.parent() {
            self.ensure_silent_watch(parent);
        }
    }

    /// Arm registered paths at or below a newly created `path`.
    pub(crate) fn reconcile_created(&mut self, path: &Path) {
        let mut pending: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect();
        pending.sort();

        for key in pending {
            match self.probe.probe(&key) {
                PathKind::Missing => {
                    if let Some(parent) = key.parent() {
                        self.ensure_silent_watch(parent);
                    }
                }
                kind => {
                    if let Err(e) = self.arm(&key, kind) {
                        tracing::warn!("[registry] could not arm {}: {e}", key.display());
                    }
                }
            }
        }
    }

    /// Created-deliveries for subscribers of `child`'s parent directory.
    pub(crate) fn relay_targets(&self, child: &Path, op: Op) -> Vec<Delivery> {
        if !op.contains(Op::CREATE) {
            return Vec::new();
        }
        match child.parent() {
            Some(parent) => self.deliveries(parent, child, Capabilities::CREATED),
            None => Vec::new(),
        }
    }

    /// Close the backend, ending the event streams.
    pub(crate) fn close(&mut self) {
        self.backend.close();
    }

    // ---- introspection ----

    /// Whether `path` holds its own low-level handle.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.active.contains(path)
    }

    /// Whether `path` is a consolidated directory.
    pub fn is_consolidated(&self, path: &Path) -> bool {
        self.consolidated.contains(path)
    }

    /// Number of subscribers registered for `path`.
    pub fn subscriber_count(&self, path: &Path) -> usize {
        self.entries.get(path).map_or(0, Vec::len)
    }

    /// Number of low-level handles held.
    pub fn handle_count(&self) -> usize {
        self.active.len()
    }

    /// Entry, handle and consolidated-directory counts.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.entries.len(),
            handles: self.active.len(),
            consolidated: self.consolidated.len(),
        }
    }

    // ---- helpers ----

    fn deliveries(&self, key: &Path, reported: &Path, caps: Capabilities) -> Vec<Delivery> {
        let Some(subscribers) = self.entries.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for subscriber in subscribers {
            let wanted = subscriber.capabilities() & caps;
            for capability in wanted.iter() {
                out.push(Delivery {
                    subscriber: subscriber.clone(),
                    capability,
                    path: reported.to_path_buf(),
                });
            }
        }
        out
    }

    fn children_of(&self, dir: &Path) -> Vec<PathBuf> {
        let mut children: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        children.sort();
        children
    }

    fn parent_consolidated(&self, path: &Path) -> bool {
        path.parent()
            .is_some_and(|parent| self.consolidated.contains(parent))
    }

    /// Nearest existing ancestor of `path`, if it holds a handle.
    fn observed_ancestor<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        let ancestor = self.nearest_existing_ancestor(path)?;
        self.active.contains(ancestor).then_some(ancestor)
    }

    fn nearest_existing_ancestor<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.ancestors()
            .skip(1)
            .find(|a| self.probe.probe(a) != PathKind::Missing)
    }

    /// Registered paths strictly below `dir`.
    fn covers_registered(&self, dir: &Path) -> bool {
        self.entries.keys().any(|k| k != dir && k.starts_with(dir))
    }

    /// Registered, missing paths whose nearest existing ancestor is `dir`.
    fn has_pending_descendants(&self, dir: &Path) -> bool {
        self.entries.keys().any(|k| {
            k != dir
                && k.starts_with(dir)
                && self.probe.probe(k) == PathKind::Missing
                && self.nearest_existing_ancestor(k) == Some(dir)
        })
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("consolidated", &self.consolidated)
            .finish()
    }
}
