//! In-memory filesystem, backend and subscriber for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{EventSink, EventStreams, RawEvent, WatchBackend};
use super::error::{WatchError, WatchResult};
use super::op::Op;
use super::probe::{PathKind, PathProbe};
use super::registry::WatchRegistry;
use super::router::Watcher;
use super::subscriber::{Capabilities, Subscriber, SubscriberRef};

/// Path tree answering probes. `/` always exists.
#[derive(Clone, Default)]
pub struct FakeFs {
    nodes: Arc<Mutex<HashMap<PathBuf, PathKind>>>,
}

impl FakeFs {
    pub fn dir(&self, path: &str) -> &Self {
        self.insert(Path::new(path), PathKind::Directory);
        self
    }

    pub fn file(&self, path: &str) -> &Self {
        self.insert(Path::new(path), PathKind::File);
        self
    }

    /// Remove `path` and everything below it.
    pub fn remove(&self, path: &str) {
        let path = Path::new(path);
        self.nodes.lock().retain(|p, _| !p.starts_with(path));
    }

    fn insert(&self, path: &Path, kind: PathKind) {
        let mut nodes = self.nodes.lock();
        for ancestor in path.ancestors().skip(1) {
            nodes.insert(ancestor.to_path_buf(), PathKind::Directory);
        }
        nodes.insert(path.to_path_buf(), kind);
    }
}

impl PathProbe for FakeFs {
    fn probe(&self, path: &Path) -> PathKind {
        if path == Path::new("/") {
            return PathKind::Directory;
        }
        self.nodes
            .lock()
            .get(path)
            .copied()
            .unwrap_or(PathKind::Missing)
    }
}

#[derive(Default)]
struct BackendState {
    watched: HashSet<PathBuf>,
    adds: Vec<PathBuf>,
    removes: Vec<PathBuf>,
    duplicate_adds: usize,
    fail_add: HashSet<PathBuf>,
    fail_remove: HashSet<PathBuf>,
}

/// Backend recording every call. Clones share state.
#[derive(Clone)]
pub struct FakeBackend {
    fs: FakeFs,
    state: Arc<Mutex<BackendState>>,
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl FakeBackend {
    pub fn new(fs: FakeFs, sink: EventSink) -> Self {
        Self {
            fs,
            state: Arc::default(),
            sink: Arc::new(Mutex::new(Some(sink))),
        }
    }

    pub fn watched(&self) -> HashSet<PathBuf> {
        self.state.lock().watched.clone()
    }

    pub fn adds(&self) -> Vec<PathBuf> {
        self.state.lock().adds.clone()
    }

    pub fn removes(&self) -> Vec<PathBuf> {
        self.state.lock().removes.clone()
    }

    pub fn duplicate_adds(&self) -> usize {
        self.state.lock().duplicate_adds
    }

    pub fn fail_add(&self, path: &str) {
        self.state.lock().fail_add.insert(PathBuf::from(path));
    }

    pub fn fail_remove(&self, path: &str) {
        self.state.lock().fail_remove.insert(PathBuf::from(path));
    }

    /// Drop handles on `path` and below, as the OS does on deletion.
    pub fn forget(&self, path: &str) {
        let path = Path::new(path);
        self.state.lock().watched.retain(|p| !p.starts_with(path));
    }

    pub fn emit(&self, path: &str, op: Op) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.events.send(RawEvent::new(path, op));
        }
    }

    pub fn emit_error(&self, details: &str) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.errors.send(WatchError::Backend {
                details: details.to_string(),
            });
        }
    }
}

impl WatchBackend for FakeBackend {
    fn add_watch(&mut self, path: &Path) -> WatchResult<()> {
        let mut state = self.state.lock();
        if state.fail_add.contains(path) || self.fs.probe(path) == PathKind::Missing {
            return Err(WatchError::AddWatch {
                path: path.to_path_buf(),
                reason: "no such file or directory".to_string(),
            });
        }
        if !state.watched.insert(path.to_path_buf()) {
            state.duplicate_adds += 1;
        }
        state.adds.push(path.to_path_buf());
        Ok(())
    }

    fn remove_watch(&mut self, path: &Path) -> WatchResult<()> {
        let mut state = self.state.lock();
        if state.fail_remove.contains(path) || !state.watched.remove(path) {
            return Err(WatchError::RemoveWatch {
                path: path.to_path_buf(),
                reason: "not watched".to_string(),
            });
        }
        state.removes.push(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        self.sink.lock().take();
    }
}

/// Subscriber recording every callback it receives, declared or not.
pub struct Recorder {
    caps: Capabilities,
    calls: Mutex<Vec<(Capabilities, PathBuf)>>,
}

impl Recorder {
    pub fn new(caps: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            caps,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn all() -> Arc<Self> {
        Self::new(Capabilities::all())
    }

    pub fn calls(&self) -> Vec<(Capabilities, PathBuf)> {
        self.calls.lock().clone()
    }

    pub fn count(&self, cap: Capabilities) -> usize {
        self.calls.lock().iter().filter(|(c, _)| *c == cap).count()
    }

    fn record(&self, cap: Capabilities, path: &Path) {
        self.calls.lock().push((cap, path.to_path_buf()));
    }
}

impl Subscriber for Recorder {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn on_created(&self, path: &Path) {
        self.record(Capabilities::CREATED, path);
    }

    fn on_changed(&self, path: &Path) {
        self.record(Capabilities::CHANGED, path);
    }

    fn on_removed(&self, path: &Path) {
        self.record(Capabilities::REMOVED, path);
    }

    fn on_renamed(&self, path: &Path) {
        self.record(Capabilities::RENAMED, path);
    }
}

pub fn sub(recorder: &Arc<Recorder>) -> SubscriberRef {
    recorder.clone()
}

/// Registry over fakes, for bookkeeping tests.
pub fn registry() -> (FakeFs, FakeBackend, WatchRegistry) {
    let fs = FakeFs::default();
    let (sink, _streams) = EventStreams::channel();
    let backend = FakeBackend::new(fs.clone(), sink);
    let registry = WatchRegistry::new(Box::new(backend.clone()), Box::new(fs.clone()));
    (fs, backend, registry)
}

/// Watcher over fakes, for routing tests.
pub struct Harness {
    pub fs: FakeFs,
    pub backend: FakeBackend,
    pub watcher: Arc<Watcher>,
}

impl Harness {
    pub fn new() -> Self {
        let fs = FakeFs::default();
        let (sink, streams) = EventStreams::channel();
        let backend = FakeBackend::new(fs.clone(), sink);
        let watcher = Watcher::from_parts(backend.clone(), streams, fs.clone());
        Self {
            fs,
            backend,
            watcher: Arc::new(watcher),
        }
    }

    /// Route one event synchronously.
    pub fn event(&self, path: &str, op: Op) {
        self.watcher.dispatch(RawEvent::new(path, op));
    }

    pub fn create_file(&self, path: &str) {
        self.fs.file(path);
        self.event(path, Op::CREATE);
    }

    pub fn create_dir(&self, path: &str) {
        self.fs.dir(path);
        self.event(path, Op::CREATE);
    }

    pub fn delete(&self, path: &str) {
        self.fs.remove(path);
        self.backend.forget(path);
        self.event(path, Op::REMOVE);
    }
}
