//! Shared file watching with consolidated OS handles.
//!
//! Many subscribers register for paths (existing or not); the registry
//! keeps as few low-level watches as possible and the router fans each
//! low-level event out to typed callbacks.
//!
//! # Architecture
//!
//! ```text
//! Watcher
//!   - WatchRegistry (behind one mutex)
//!       entries / active handles / consolidated dirs
//!       -> WatchBackend (notify)
//!   - observe(): EventStreams -> dispatch
//!         |
//!    +---------+---------+---------+
//!    |         |         |         |
//! created   changed   removed   renamed
//! ```

mod backend;
mod error;
mod op;
mod probe;
mod registry;
mod router;
mod subscriber;

#[cfg(test)]
mod testing;

pub use backend::{EventSink, EventStreams, NotifyBackend, RawEvent, WatchBackend, translate};
pub use error::{WatchError, WatchResult};
pub use op::Op;
pub use probe::{FsProbe, PathKind, PathProbe, normalize};
pub use registry::{RegistryStats, WatchRegistry};
pub use router::{Watcher, WatcherBuilder};
pub use subscriber::{Callbacks, Capabilities, Subscriber, SubscriberRef};
