use std::time::Duration;

use gust_core::types::ForwardTarget;

use super::persistent::PersistentConfig;
use crate::cli::Cli;

/// Effective configuration: persistent layers folded with CLI overrides.
pub struct Config {
	pub target: ForwardTarget,
	pub watch:  WatchConfig,
}

pub struct WatchConfig {
	pub container: Option<String>,
	pub interval:  Duration,
	pub misses:    u32,
}

impl Config {
	pub fn from_persist(config: PersistentConfig, cli: &Cli) -> Self {
		Self {
			target: ForwardTarget {
				listen_addr: cli.listen.unwrap_or(config.forward.listen_addr),
				target_addr: cli.target.clone().unwrap_or(config.forward.target_addr),
				transport:   cli.transport.unwrap_or(config.forward.transport),
			},
			watch: WatchConfig {
				container: cli.container.clone().or(config.watch.container),
				interval:  config.watch.interval,
				misses:    config.watch.misses,
			},
		}
	}
}
