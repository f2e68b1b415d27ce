use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};

/// Directory name kubelet keeps under its plugin registry for its own bookkeeping, it is never a plugin
pub const DEFAULT_IGNORED_NAME: &str = "kubernetes.io";

/// How long [`crate::PluginWatcher::stop`] waits for in-flight handlers before giving up
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(11);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
	/// Directory whose immediate subdirectories are the watched entries
	pub path: PathBuf,
	/// Entry name excluded from both the initial scan and live events
	#[serde(default = "default_ignored_name")]
	pub ignored_name: String,
	#[serde(default = "default_stop_timeout")]
	pub stop_timeout: Duration,
}

fn default_ignored_name() -> String {
	DEFAULT_IGNORED_NAME.to_string()
}

const fn default_stop_timeout() -> Duration {
	DEFAULT_STOP_TIMEOUT
}

impl WatcherConfig {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			ignored_name: default_ignored_name(),
			stop_timeout: DEFAULT_STOP_TIMEOUT,
		}
	}

	#[must_use]
	pub fn with_ignored_name(mut self, ignored_name: impl Into<String>) -> Self {
		self.ignored_name = ignored_name.into();
		self
	}

	#[must_use]
	pub const fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
		self.stop_timeout = stop_timeout;
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;

	#[test]
	fn new_uses_kubelet_defaults() {
		let config = WatcherConfig::new("/var/lib/kubelet/plugins");

		assert_eq!(config.path(), Path::new("/var/lib/kubelet/plugins"));
		assert_eq!(config.ignored_name, "kubernetes.io");
		assert_eq!(config.stop_timeout, Duration::from_secs(11));
	}

	#[test]
	fn builders_override_defaults() {
		let config = WatcherConfig::new("/plugins")
			.with_ignored_name("reserved")
			.with_stop_timeout(Duration::from_millis(250));

		assert_eq!(config.ignored_name, "reserved");
		assert_eq!(config.stop_timeout, Duration::from_millis(250));
	}

	#[test]
	fn deserialize_fills_missing_fields() {
		let config: WatcherConfig = serde_json::from_str(r#"{ "path": "/plugins" }"#).unwrap();

		assert_eq!(config, WatcherConfig::new("/plugins"));
	}

	#[test]
	fn deserialize_keeps_explicit_fields() {
		let config: WatcherConfig = serde_json::from_str(
			r#"{
				"path": "/plugins",
				"ignored_name": "reserved",
				"stop_timeout": { "secs": 2, "nanos": 0 }
			}"#,
		)
		.unwrap();

		assert_eq!(config.ignored_name, "reserved");
		assert_eq!(config.stop_timeout, Duration::from_secs(2));
	}
}
