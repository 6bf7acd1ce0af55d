use std::{net::SocketAddr, path::PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use gust_core::types::{TargetAddr, Transport};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
	/// Companion container to watch; omit to skip liveness supervision
	#[arg(short = 'n', long, value_name = "NAME")]
	pub container: Option<String>,

	/// Address to listen on, e.g. `0.0.0.0:8080`
	#[arg(short, long, value_name = "ADDR")]
	pub listen: Option<SocketAddr>,

	/// Upstream to forward each session to, e.g. `target:8080`
	#[arg(short, long, value_name = "ADDR")]
	pub target: Option<TargetAddr>,

	/// Transport to forward, tcp or udp
	#[arg(short = 'T', long, value_name = "TRANSPORT")]
	pub transport: Option<Transport>,

	/// Set a custom config
	#[arg(short, visible_short_alias = 'f', long, value_name = "FILE")]
	pub config: Option<String>,

	/// Set configuration directory
	#[arg(short = 'C', visible_short_alias = 'd', long, value_name = "PATH")]
	pub config_dir: Option<PathBuf>,

	/// Show current version
	#[arg(short = 'v', visible_short_alias = 'V', long, action = ArgAction::SetTrue)]
	pub version: bool,

	#[command(subcommand)]
	pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize a new default configuration file
	Init {
		/// Specify the configuration file format (yaml or toml)
		#[arg(short, long, value_enum, default_value = "yaml")]
		format: ConfigFormat,
	},
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum ConfigFormat {
	Yaml,
	Toml,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_forward_flags() {
		let cli = Cli::parse_from([
			"gust",
			"--container",
			"app",
			"--listen",
			"0.0.0.0:9000",
			"--target",
			"target:9001",
			"--transport",
			"udp",
		]);
		assert_eq!(cli.container.as_deref(), Some("app"));
		assert_eq!(cli.listen, Some("0.0.0.0:9000".parse().unwrap()));
		assert_eq!(
			cli.target,
			Some(TargetAddr::Domain("target".to_string(), 9001))
		);
		assert_eq!(cli.transport, Some(Transport::Udp));
	}

	#[test]
	fn rejects_bad_transport() {
		assert!(Cli::try_parse_from(["gust", "--transport", "sctp"]).is_err());
	}
}
