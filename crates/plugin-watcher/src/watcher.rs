use std::{any::Any, fmt, panic::AssertUnwindSafe, path::PathBuf, pin::pin, sync::Arc};

use async_channel as chan;
use futures::{FutureExt, StreamExt};
use futures_concurrency::stream::Merge;
use notify::{event::CreateKind, Event, EventKind};
use tokio::{fs, time::timeout};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

use super::{
	config::WatcherConfig,
	error::{Error, FileIOError, Result},
	event::{classify, PluginEvent},
	handler::PluginHandler,
	source::{EventSink, NotificationSource, NotifySource},
};

type SourceFactory<S> = Box<dyn FnOnce(EventSink) -> Result<S> + Send>;

/// Lifecycle of a [`PluginWatcher`], it only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
	Created,
	Started,
	Stopping,
	Stopped,
	/// In-flight handlers didn't finish in time, the notification source is still held
	StopTimedOut,
}

pub struct PluginWatcher<S: NotificationSource = NotifySource> {
	config: WatcherConfig,
	handler: Arc<dyn PluginHandler>,
	source_factory: Option<SourceFactory<S>>,
	source: Option<S>,
	stop_tx: Option<chan::Sender<()>>,
	tracker: TaskTracker,
	state: WatcherState,
}

impl PluginWatcher<NotifySource> {
	pub fn new(config: WatcherConfig, handler: impl PluginHandler) -> Self {
		Self::with_source(config, handler, NotifySource::new)
	}
}

impl<S: NotificationSource> PluginWatcher<S> {
	/// Builds a watcher over a custom [`NotificationSource`], created during [`PluginWatcher::start`]
	/// with the sink it must deliver its events to
	pub fn with_source(
		config: WatcherConfig,
		handler: impl PluginHandler,
		source_factory: impl FnOnce(EventSink) -> Result<S> + Send + 'static,
	) -> Self {
		Self {
			config,
			handler: Arc::new(handler),
			source_factory: Some(Box::new(source_factory)),
			source: None,
			stop_tx: None,
			tracker: TaskTracker::new(),
			state: WatcherState::Created,
		}
	}

	pub const fn state(&self) -> WatcherState {
		self.state
	}

	pub const fn config(&self) -> &WatcherConfig {
		&self.config
	}

	/// Tracked tasks not finished yet: handler invocations, initial scan injections and the event
	/// loop itself while it runs
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	#[instrument(skip(self), fields(path = %self.config.path.display()))]
	pub async fn start(&mut self) -> Result<()> {
		let (WatcherState::Created, Some(source_factory)) = (self.state, self.source_factory.take())
		else {
			return Err(Error::InvalidState {
				action: "start",
				state: self.state,
			});
		};

		let (sink, events_rx, errors_rx) = EventSink::new();

		let mut source = source_factory(sink.clone()).inspect_err(|_| {
			self.state = WatcherState::Stopped;
		})?;

		let (stop_tx, stop_rx) = chan::bounded(1);
		self.stop_tx = Some(stop_tx);

		// The loop must be consuming before the path is watched, anything already on disk is
		// covered by the initial scan
		self.tracker.spawn(
			handle_watch_events(
				events_rx,
				errors_rx,
				stop_rx,
				Arc::clone(&self.handler),
				self.config.ignored_name.clone(),
				self.tracker.clone(),
			)
			.in_current_span(),
		);

		let res = match self.replay_existing_entries(&sink).await {
			Ok(()) => source.watch(&self.config.path),
			Err(e) => Err(e),
		};

		if let Err(e) = res {
			self.signal_stop();
			self.tracker.close();
			self.state = WatcherState::Stopped;

			if let Err(close_err) = source.close() {
				error!(?close_err, "Failed to release notification source after failed start;");
			}

			return Err(e);
		}

		self.source = Some(source);
		self.state = WatcherState::Started;

		info!("Now watching plugin directory");

		Ok(())
	}

	/// Injects one synthetic creation per pre-existing entry, each on its own tracked task.
	///
	/// The whole listing is collected before anything is injected, so a failing listing injects
	/// nothing.
	async fn replay_existing_entries(&self, sink: &EventSink) -> Result<()> {
		let path = &self.config.path;

		let mut read_dir = fs::read_dir(path).await.map_err(|e| {
			FileIOError::new(path, e, "failed to list plugin directory")
		})?;

		let mut entries = vec![];

		while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
			FileIOError::new(path, e, "failed to read plugin directory entry")
		})? {
			let entry_path = entry.path();

			let file_type = entry.file_type().await.map_err(|e| {
				FileIOError::new(&entry_path, e, "failed to get plugin entry file type")
			})?;

			if file_type.is_dir() && entry.file_name() != self.config.ignored_name.as_str() {
				entries.push(entry_path);
			}
		}

		debug!(count = entries.len(), "Replaying existing plugin entries;");

		for entry_path in entries {
			let sink = sink.clone();
			self.tracker.spawn(
				async move {
					sink.send_event(synthetic_create(entry_path)).await;
				}
				.in_current_span(),
			);
		}

		Ok(())
	}

	/// Stops dispatching new events, then waits for every tracked task before releasing the
	/// notification source.
	///
	/// If the wait exceeds [`WatcherConfig::stop_timeout`] this returns [`Error::StopTimeout`] and
	/// the source stays held, the watcher must then be considered unusable. Dropping this future
	/// while it waits has the same outcome as a timeout: the state ends in
	/// [`WatcherState::StopTimedOut`].
	#[instrument(skip(self), fields(path = %self.config.path.display()))]
	pub async fn stop(&mut self) -> Result<()> {
		if self.state != WatcherState::Started {
			return Err(Error::InvalidState {
				action: "stop",
				state: self.state,
			});
		}

		self.signal_stop();
		self.tracker.close();

		let drained = {
			let mut stopping = StoppingGuard::new(&mut self.state);
			let drained = timeout(self.config.stop_timeout, self.tracker.wait())
				.await
				.is_ok();
			stopping.finish(if drained {
				WatcherState::Stopped
			} else {
				WatcherState::StopTimedOut
			});
			drained
		};

		if !drained {
			warn!(
				in_flight = self.tracker.len(),
				"Timed out waiting for plugin handlers to finish;"
			);
			return Err(Error::StopTimeout(self.config.stop_timeout));
		}

		if let Some(source) = self.source.take() {
			source.close().inspect_err(|e| error!(?e, "Failed to stop plugin watcher;"))?;
		}

		info!("Plugin watcher stopped");

		Ok(())
	}

	fn signal_stop(&mut self) {
		if let Some(stop_tx) = self.stop_tx.take() {
			if stop_tx.try_send(()).is_err() {
				trace!("Plugin watcher event loop already gone;");
			}
			stop_tx.close();
		}
	}
}

/// Holds [`WatcherState::Stopping`] while `stop` drains, falling to
/// [`WatcherState::StopTimedOut`] if the drain is abandoned
struct StoppingGuard<'state> {
	state: &'state mut WatcherState,
}

impl<'state> StoppingGuard<'state> {
	fn new(state: &'state mut WatcherState) -> Self {
		*state = WatcherState::Stopping;
		Self { state }
	}

	fn finish(&mut self, state: WatcherState) {
		*self.state = state;
	}
}

impl Drop for StoppingGuard<'_> {
	fn drop(&mut self) {
		if *self.state == WatcherState::Stopping {
			warn!("Plugin watcher stop was cancelled while draining handlers;");
			*self.state = WatcherState::StopTimedOut;
		}
	}
}

impl<S: NotificationSource> Drop for PluginWatcher<S> {
	fn drop(&mut self) {
		// Don't leave the event loop running after its owner is gone
		self.signal_stop();
		self.tracker.close();
	}
}

impl<S: NotificationSource> fmt::Debug for PluginWatcher<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PluginWatcher")
			.field("config", &self.config)
			.field("state", &self.state)
			.field("tracker", &self.tracker)
			.finish_non_exhaustive()
	}
}

async fn handle_watch_events(
	events_rx: chan::Receiver<Event>,
	errors_rx: chan::Receiver<notify::Error>,
	stop_rx: chan::Receiver<()>,
	handler: Arc<dyn PluginHandler>,
	ignored_name: String,
	tracker: TaskTracker,
) {
	enum StreamMessage {
		NewEvent(Event),
		Error(notify::Error),
		Stop,
	}

	let mut msg_stream = pin!((
		events_rx.map(StreamMessage::NewEvent),
		errors_rx.map(StreamMessage::Error),
		stop_rx.map(|()| StreamMessage::Stop),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::NewEvent(event) => {
				if let Some(plugin_event) = classify(&event, &ignored_name) {
					info!(?event, name = %plugin_event.name, "Handle event;");
					tracker.spawn(run_handler(Arc::clone(&handler), plugin_event).in_current_span());
				}
			}

			StreamMessage::Error(e) => error!(?e, "Plugin watcher received error;"),

			StreamMessage::Stop => {
				debug!("Stopping plugin watcher event loop");
				break;
			}
		}
	}
}

async fn run_handler(handler: Arc<dyn PluginHandler>, event: PluginEvent) {
	if let Err(panic) = AssertUnwindSafe(handler.handle(&event))
		.catch_unwind()
		.await
	{
		error!(
			name = %event.name,
			kind = ?event.kind,
			panic = panic_message(panic.as_ref()),
			"Plugin handler panicked;"
		);
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	panic
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("<non string panic payload>")
}

fn synthetic_create(path: PathBuf) -> Event {
	Event::new(EventKind::Create(CreateKind::Folder)).add_path(path)
}
