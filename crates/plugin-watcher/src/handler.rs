use async_trait::async_trait;

use super::event::PluginEvent;

/// Reacts to plugin entries appearing or disappearing.
///
/// Invocations run concurrently with each other and may arrive more than once for the same entry
/// (a directory created while the watcher is starting can be seen by both the initial scan and the
/// live watch), so implementations must be idempotent.
#[async_trait]
pub trait PluginHandler: Send + Sync + 'static {
	async fn handle(&self, event: &PluginEvent);
}

#[async_trait]
impl<F> PluginHandler for F
where
	F: Fn(&PluginEvent) + Send + Sync + 'static,
{
	async fn handle(&self, event: &PluginEvent) {
		self(event);
	}
}
