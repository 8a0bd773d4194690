//! Logging setup for hosts embedding the watcher.
//!
//! The crate logs through `tracing` with a component tag in front of each
//! message: `[registry]` for subscription and handle transitions,
//! `[router]` for dispatch and the observe loop, `[backend]` for the notify
//! watcher's lifecycle. Handle transitions are debug, best-effort failures
//! and asynchronous backend errors are warn.
//!
//! Hosts with their own subscriber need nothing from this module. Others
//! can call [`init_with_config`] with the `[logging]` section of
//! `watchmux.toml`:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! watchmux = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over the config, e.g.
//! `RUST_LOG=watchmux::watcher=trace` to see every routed event.

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from config.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes
/// effect). Does nothing if the host already installed a global subscriber.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Initialize logging with default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level event tagged with a component, e.g. `[backend] started: Native`.
///
/// ```ignore
/// log_event!("backend", "started", "{:?}", config.backend);
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`], used for registry transitions.
///
/// ```ignore
/// debug_event!("router", "relay", "{}", child.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("watchmux::watcher".to_string(), "trace".to_string());
        config
            .modules
            .insert("notify".to_string(), "info".to_string());

        assert_eq!(
            filter_directives(&config),
            "warn,notify=info,watchmux::watcher=trace"
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }
}
