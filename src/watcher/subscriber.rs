//! Subscriber trait and capability flags.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;

use super::op::Op;

bitflags! {
    /// Notifications a subscriber wants to receive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const CREATED = 1 << 0;
        const CHANGED = 1 << 1;
        const REMOVED = 1 << 2;
        const RENAMED = 1 << 3;
    }
}

impl Capabilities {
    /// Capabilities triggered by an operation set.
    pub fn triggered_by(op: Op) -> Capabilities {
        let mut caps = Capabilities::empty();
        if op.contains(Op::CREATE) {
            caps |= Capabilities::CREATED;
        }
        if op.contains(Op::WRITE) {
            caps |= Capabilities::CHANGED;
        }
        if op.contains(Op::REMOVE) {
            caps |= Capabilities::REMOVED;
        }
        if op.contains(Op::RENAME) {
            caps |= Capabilities::RENAMED;
        }
        caps
    }
}

/// A consumer of file change notifications.
///
/// Implementors declare what they handle through [`capabilities`] and
/// override the matching callbacks. Only declared callbacks are ever
/// invoked. Callbacks run on the router thread with the registry
/// unlocked, so they may subscribe or unsubscribe.
///
/// [`capabilities`]: Subscriber::capabilities
pub trait Subscriber: Send + Sync {
    /// Which callbacks this subscriber handles. Must not be empty.
    fn capabilities(&self) -> Capabilities;

    /// A file or directory was created at `path`.
    fn on_created(&self, _path: &Path) {}

    /// File contents at `path` changed. Never sent for directories.
    fn on_changed(&self, _path: &Path) {}

    /// The file or directory at `path` was removed.
    fn on_removed(&self, _path: &Path) {}

    /// The file or directory at `path` was renamed away.
    fn on_renamed(&self, _path: &Path) {}
}

/// Shared handle to a subscriber. Unsubscription matches by pointer.
pub type SubscriberRef = Arc<dyn Subscriber>;

/// Invoke one capability on a subscriber.
pub(crate) fn deliver(subscriber: &dyn Subscriber, capability: Capabilities, path: &Path) {
    if capability == Capabilities::CREATED {
        subscriber.on_created(path);
    } else if capability == Capabilities::CHANGED {
        subscriber.on_changed(path);
    } else if capability == Capabilities::REMOVED {
        subscriber.on_removed(path);
    } else if capability == Capabilities::RENAMED {
        subscriber.on_renamed(path);
    }
}

type Callback = Box<dyn Fn(&Path) + Send + Sync>;

/// Closure-backed subscriber.
///
/// Capabilities are exactly the callbacks that were set.
///
/// ```ignore
/// let sub = Callbacks::new()
///     .on_changed(|path| println!("changed {}", path.display()))
///     .into_subscriber();
/// watcher.subscribe("/etc/hosts", sub.clone())?;
/// ```
#[derive(Default)]
pub struct Callbacks {
    created: Option<Callback>,
    changed: Option<Callback>,
    removed: Option<Callback>,
    renamed: Option<Callback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_created(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.created = Some(Box::new(f));
        self
    }

    pub fn on_changed(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.changed = Some(Box::new(f));
        self
    }

    pub fn on_removed(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.removed = Some(Box::new(f));
        self
    }

    pub fn on_renamed(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.renamed = Some(Box::new(f));
        self
    }

    /// Wrap into a shareable subscriber handle.
    pub fn into_subscriber(self) -> SubscriberRef {
        Arc::new(self)
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl Subscriber for Callbacks {
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::CREATED, self.created.is_some());
        caps.set(Capabilities::CHANGED, self.changed.is_some());
        caps.set(Capabilities::REMOVED, self.removed.is_some());
        caps.set(Capabilities::RENAMED, self.renamed.is_some());
        caps
    }

    fn on_created(&self, path: &Path) {
        if let Some(f) = &self.created {
            f(path);
        }
    }

    fn on_changed(&self, path: &Path) {
        if let Some(f) = &self.changed {
            f(path);
        }
    }

    fn on_removed(&self, path: &Path) {
        if let Some(f) = &self.removed {
            f(path);
        }
    }

    fn on_renamed(&self, path: &Path) {
        if let Some(f) = &self.renamed {
            f(path);
        }
    }
}
