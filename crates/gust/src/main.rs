use std::{path::Path, sync::Arc};

use clap::Parser as _;
use gust_core::{error, info};
use gust_forward::{Server, supervise};
use tokio::task::JoinSet;
use tracing::Level;

use crate::{
	cli::{Cli, Commands, ConfigFormat},
	conf::{persistent::PersistentConfig, runtime::Config},
	docker::ContainerProbe,
};

mod cli;
mod conf;
mod docker;
mod log;

#[tokio::main]
async fn main() -> eyre::Result<()> {
	log::init_log(Level::INFO)?;
	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{:#}", err);
			return Ok(());
		}
	};

	if cli.version {
		const VER: &str = match option_env!("GUST_OVERRIDE_VERSION") {
			Some(v) => v,
			None => env!("CARGO_PKG_VERSION"),
		};
		println!("gust {VER}");
		return Ok(());
	}

	if let Some(Commands::Init { format }) = &cli.command {
		let (file, format) = match format {
			ConfigFormat::Yaml => ("config.yaml", "yaml"),
			ConfigFormat::Toml => ("config.toml", "toml"),
		};
		PersistentConfig::default().export_to_file(Path::new(file), format)?;
		println!("wrote default configuration to {file}");
		return Ok(());
	}

	let persist = match PersistentConfig::load(cli.config.clone(), cli.config_dir.clone()) {
		Ok(v) => v,
		Err(err) => {
			error!(target: "[MAIN]", "failed to load configuration: {err:#}");
			std::process::exit(2);
		}
	};
	let config = Config::from_persist(persist, &cli);

	let probe = match &config.watch.container {
		Some(name) => match ContainerProbe::connect(name.clone()) {
			Ok(probe) => Some(probe),
			Err(err) => {
				error!(target: "[MAIN]", "failed to create docker client: {err:#}");
				std::process::exit(2);
			}
		},
		None => None,
	};

	let server = match Server::bind(&config.target).await {
		Ok(server) => server,
		Err(err) => {
			error!(target: "[MAIN]", "failed to create forward server: {err}");
			std::process::exit(2);
		}
	};
	info!(
		target: "[MAIN]",
		"forwarding {}/{} -> {}",
		server.local_addr()?,
		config.target.transport,
		config.target.target_addr,
	);

	let server = Arc::new(server);
	let mut set: JoinSet<eyre::Result<()>> = JoinSet::new();
	let serving = server.clone();
	set.spawn(async move { serving.serve().await });

	let watch = config.watch;
	let supervisor = async {
		match &probe {
			Some(probe) => supervise(probe, watch.interval, watch.misses).await,
			None => std::future::pending().await,
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(target: "[MAIN]", "interrupt received, shutting down");
			server.close()?;
		}
		_ = supervisor => {
			info!(target: "[MAIN]", "workload is gone, shutting down");
			server.close()?;
		}
		Some(res) = set.join_next() => {
			if let Ok(Err(err)) = res {
				return Err(err);
			}
			return Ok(());
		}
	}

	while let Some(res) = set.join_next().await {
		if let Ok(Err(err)) = res {
			return Err(err);
		}
	}

	Ok(())
}
