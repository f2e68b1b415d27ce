use std::path::{Path, PathBuf};

use async_channel as chan;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::trace;

use super::error::{Error, Result};

/// OS level directory change notifications for a single path.
///
/// Implementations deliver raw events and asynchronous errors through the [`EventSink`] they were
/// created with, starting only once [`NotificationSource::watch`] was called.
pub trait NotificationSource: Send + 'static {
	fn watch(&mut self, path: &Path) -> Result<()>;

	/// Stops delivering notifications and releases the OS handle
	fn close(self) -> Result<()>
	where
		Self: Sized;
}

/// Sending halves of the raw event and error streams consumed by the watcher event loop
#[derive(Debug, Clone)]
pub struct EventSink {
	events_tx: chan::Sender<Event>,
	errors_tx: chan::Sender<notify::Error>,
}

impl EventSink {
	pub(crate) fn new() -> (Self, chan::Receiver<Event>, chan::Receiver<notify::Error>) {
		let (events_tx, events_rx) = chan::unbounded();
		let (errors_tx, errors_rx) = chan::unbounded();

		(
			Self {
				events_tx,
				errors_tx,
			},
			events_rx,
			errors_rx,
		)
	}

	pub async fn send_event(&self, event: Event) {
		if self.events_tx.send(event).await.is_err() {
			trace!("Plugin watcher event loop is gone, dropping event;");
		}
	}

	pub async fn send_error(&self, e: notify::Error) {
		if self.errors_tx.send(e).await.is_err() {
			trace!("Plugin watcher event loop is gone, dropping error;");
		}
	}

	/// Blocking variant of [`EventSink::send_event`] and [`EventSink::send_error`], meant to be
	/// called from the notification backend threads
	pub fn send_blocking(&self, result: notify::Result<Event>) {
		if self.is_closed() {
			// Expected once the event loop stopped while the OS watcher is still attached
			trace!("Plugin watcher event loop is gone, dropping notification;");
			return;
		}

		let res = match result {
			Ok(event) => self.events_tx.send_blocking(event).map_err(|_| ()),
			Err(e) => self.errors_tx.send_blocking(e).map_err(|_| ()),
		};

		if res.is_err() {
			trace!("Plugin watcher event loop closed while sending notification;");
		}
	}

	/// Whether the event loop consuming this sink has exited
	pub fn is_closed(&self) -> bool {
		self.events_tx.is_closed()
	}
}

/// [`NotificationSource`] backed by the platform's recommended `notify` watcher
#[derive(Debug)]
pub struct NotifySource {
	watcher: RecommendedWatcher,
	watched_path: Option<PathBuf>,
}

impl NotifySource {
	pub fn new(sink: EventSink) -> Result<Self> {
		let watcher = RecommendedWatcher::new(
			// SAFETY: we are not blocking the thread as these are unbounded channels
			move |result| sink.send_blocking(result),
			Config::default(),
		)
		.map_err(Error::CreateSource)?;

		Ok(Self {
			watcher,
			watched_path: None,
		})
	}
}

impl NotificationSource for NotifySource {
	fn watch(&mut self, path: &Path) -> Result<()> {
		self.watcher
			.watch(path, RecursiveMode::NonRecursive)
			.map_err(|source| Error::Watch {
				path: path.into(),
				source,
			})?;

		self.watched_path = Some(path.to_path_buf());

		Ok(())
	}

	fn close(mut self) -> Result<()> {
		if let Some(path) = self.watched_path.take() {
			self.watcher.unwatch(&path).map_err(Error::CloseSource)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use notify::EventKind;

	#[test]
	fn sink_closes_with_its_event_loop() {
		let (sink, events_rx, errors_rx) = EventSink::new();
		assert!(!sink.is_closed());

		sink.send_blocking(Ok(Event::new(EventKind::Other)));
		sink.send_blocking(Err(notify::Error::generic("transient")));
		assert_eq!(events_rx.len(), 1);
		assert_eq!(errors_rx.len(), 1);

		drop((events_rx, errors_rx));
		assert!(sink.is_closed());

		// Late notifications from a still attached OS watcher are dropped quietly
		sink.send_blocking(Ok(Event::new(EventKind::Other)));
	}
}
