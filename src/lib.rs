//! Shared, consolidated file-change subscriptions over `notify`.
//!
//! ```no_run
//! use watchmux::{Callbacks, Watcher};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), watchmux::WatchError> {
//! let watcher = Arc::new(Watcher::new()?);
//!
//! let sub = Callbacks::new()
//!     .on_created(|p| println!("created {}", p.display()))
//!     .on_changed(|p| println!("changed {}", p.display()))
//!     .into_subscriber();
//! watcher.subscribe("/tmp/app/settings.toml", sub.clone())?;
//!
//! let router = watcher.clone();
//! let worker = std::thread::spawn(move || router.observe());
//!
//! // ...
//! watcher.unsubscribe("/tmp/app/settings.toml", Some(&sub))?;
//! watcher.close();
//! let _ = worker.join();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{BackendKind, LoggingConfig, Settings, WatcherConfig};
pub use watcher::{
    Callbacks, Capabilities, EventStreams, FsProbe, Op, PathKind, PathProbe, RawEvent,
    Subscriber, SubscriberRef, WatchBackend, WatchError, WatchResult, Watcher, WatcherBuilder,
};
