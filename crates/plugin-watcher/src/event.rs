use notify::{
	event::{ModifyKind, RenameMode},
	Event, EventKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginEventKind {
	Create,
	Remove,
}

/// A plugin entry appearing or disappearing, identified by its directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginEvent {
	pub name: String,
	pub kind: PluginEventKind,
}

impl PluginEvent {
	pub fn create(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: PluginEventKind::Create,
		}
	}

	pub fn remove(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: PluginEventKind::Remove,
		}
	}
}

/// Decides whether a raw filesystem event must reach the plugin handler.
///
/// Only creations and removals pass, and only when the leaf name of the affected path is not
/// `ignored_name`. A directory moved into the watched path counts as a creation of its destination,
/// while the source side of a move is ignored.
#[must_use]
pub fn classify(event: &Event, ignored_name: &str) -> Option<PluginEvent> {
	let (kind, path) = match event.kind {
		EventKind::Create(_) => (PluginEventKind::Create, event.paths.first()),
		EventKind::Remove(_) => (PluginEventKind::Remove, event.paths.first()),
		EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
			(PluginEventKind::Create, event.paths.first())
		}
		// Paths are [from, to]
		EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
			(PluginEventKind::Create, event.paths.last())
		}
		_ => {
			info!(?event, "Ignore event;");
			return None;
		}
	};

	let Some(path) = path else {
		debug!(?event, "Ignoring event without paths;");
		return None;
	};

	let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
		debug!(path = %path.display(), "Ignoring event without a UTF-8 leaf name;");
		return None;
	};

	if name == ignored_name {
		debug!(%name, "Ignoring event for reserved directory;");
		return None;
	}

	Some(PluginEvent {
		name: name.to_string(),
		kind,
	})
}
