use std::{path::Path, time::Duration};

use thiserror::Error;

use super::watcher::WatcherState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to create plugin notification source: {0}")]
	CreateSource(#[source] notify::Error),
	#[error("failed to watch plugin directory <path='{}'>: {source}", .path.display())]
	Watch {
		path: Box<Path>,
		#[source]
		source: notify::Error,
	},
	#[error("failed to release plugin notification source: {0}")]
	CloseSource(#[source] notify::Error),
	#[error("timeout on stopping watcher after {0:?}")]
	StopTimeout(Duration),
	#[error("can't {action} a plugin watcher in state {state:?}")]
	InvalidState {
		action: &'static str,
		state: WatcherState,
	},

	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

/// I/O error on a plugin directory path, with what the watcher was doing at the time
#[derive(Debug, Error)]
#[error("file I/O error ({context}): {source}; path: '{}'", .path.display())]
pub struct FileIOError {
	pub path: Box<Path>,
	pub context: &'static str,
	#[source]
	pub source: std::io::Error,
}

impl FileIOError {
	pub fn new(path: impl AsRef<Path>, source: std::io::Error, context: &'static str) -> Self {
		Self {
			path: path.as_ref().into(),
			context,
			source,
		}
	}
}
