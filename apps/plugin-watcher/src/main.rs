use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use sd_plugin_watcher::{
	PluginEvent, PluginWatcher, WatcherConfig, DEFAULT_IGNORED_NAME, DEFAULT_STOP_TIMEOUT,
};
use tokio::{signal, time::sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
	name = "sd-plugin-watcher",
	about = "Logs plugin registrations appearing and disappearing in a plugin registry directory"
)]
struct Cli {
	/// Plugin registry directory to watch
	#[arg(long, default_value = "/var/lib/kubelet/plugins")]
	path: PathBuf,

	/// Directory name that is never reported as a plugin
	#[arg(long, default_value = DEFAULT_IGNORED_NAME)]
	ignored_name: String,

	/// Seconds to wait for running handlers when stopping
	#[arg(long, default_value_t = DEFAULT_STOP_TIMEOUT.as_secs())]
	stop_timeout_secs: u64,

	/// Seconds to keep watching before stopping, Ctrl-C stops earlier
	#[arg(long, default_value_t = 60)]
	run_for_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();

	let config = WatcherConfig::new(cli.path)
		.with_ignored_name(cli.ignored_name)
		.with_stop_timeout(Duration::from_secs(cli.stop_timeout_secs));

	let mut watcher = PluginWatcher::new(config, |event: &PluginEvent| {
		info!(driver = %event.name, kind = ?event.kind, "Plugin event;");
	});

	watcher
		.start()
		.await
		.context("failed to start plugin watcher")?;

	tokio::select! {
		() = sleep(Duration::from_secs(cli.run_for_secs)) => {
			info!("Run duration elapsed, stopping plugin watcher");
		}
		res = signal::ctrl_c() => {
			if let Err(e) = res {
				warn!(?e, "Failed to listen for Ctrl-C, stopping plugin watcher;");
			} else {
				info!("Received Ctrl-C, stopping plugin watcher");
			}
		}
	}

	watcher
		.stop()
		.await
		.context("failed to stop plugin watcher")
}
