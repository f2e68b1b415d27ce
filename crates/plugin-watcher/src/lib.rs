//!
//! # Plugin Watcher
//!
//! Watches a plugin registry directory (like kubelet's `/var/lib/kubelet/plugins`) where every
//! immediate subdirectory stands for one registered plugin, and calls a [`PluginHandler`] each
//! time one of those subdirectories appears or disappears.
//!
//! Some guarantees worth knowing about:
//! - Subdirectories that already exist when the watcher starts are replayed as creations, so the
//!   handler sees the same kind of event whether a plugin was there before or just showed up;
//! - The reserved name (`kubernetes.io` by default) is never handed to the handler;
//! - Handlers run concurrently and are never awaited by the event loop;
//! - [`PluginWatcher::stop`] waits for every running handler before releasing the OS watcher,
//!   bounded by a timeout;
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_plugin_watcher::{PluginEvent, PluginWatcher, WatcherConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sd_plugin_watcher::Error> {
//!     let mut watcher = PluginWatcher::new(
//!         WatcherConfig::new("/var/lib/kubelet/plugins"),
//!         |event: &PluginEvent| println!("{} {:?}", event.name, event.kind),
//!     );
//!
//!     watcher.start().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     watcher.stop().await
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
mod event;
mod handler;
mod source;
mod watcher;

pub use config::{WatcherConfig, DEFAULT_IGNORED_NAME, DEFAULT_STOP_TIMEOUT};
pub use error::{Error, FileIOError, Result};
pub use event::{classify, PluginEvent, PluginEventKind};
pub use handler::PluginHandler;
pub use source::{EventSink, NotificationSource, NotifySource};
pub use watcher::{PluginWatcher, WatcherState};
