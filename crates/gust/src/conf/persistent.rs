use std::{
	net::SocketAddr,
	path::{Path, PathBuf},
	time::Duration,
};

use educe::Educe;
use figment::{
	Figment,
	providers::{Env, Format, Toml, Yaml},
};
use gust_core::types::{TargetAddr, Transport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
#[serde(default)]
pub struct PersistentConfig {
	pub forward: ForwardOpt,
	pub watch:   WatchOpt,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
#[serde(default)]
pub struct ForwardOpt {
	#[educe(Default(expression = "127.0.0.1:8080".parse().unwrap()))]
	pub listen_addr: SocketAddr,

	#[educe(Default(expression = TargetAddr::Domain("target".to_string(), 8080)))]
	pub target_addr: TargetAddr,

	#[educe(Default(expression = Transport::Tcp))]
	pub transport: Transport,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
#[serde(default)]
pub struct WatchOpt {
	#[educe(Default = None)]
	pub container: Option<String>,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = gust_forward::PROBE_INTERVAL))]
	pub interval: Duration,

	#[educe(Default(expression = gust_forward::PROBE_MISSES))]
	pub misses: u32,
}

impl PersistentConfig {
	pub fn export_to_file(&self, file_path: &Path, format: &str) -> eyre::Result<()> {
		let rendered = match format.to_lowercase().as_str() {
			"yaml" => serde_yaml::to_string(self)?,
			"toml" => toml::to_string_pretty(self)?,
			other => eyre::bail!("unsupported config format {other:?}, expected yaml or toml"),
		};
		std::fs::write(file_path, rendered)?;
		Ok(())
	}

	/// Layered load, lowest precedence first: the well-known files in the
	/// configuration directory (or the working directory), then an explicit
	/// config file, then `GUST_*` environment variables. Anything a layer
	/// leaves unset falls back to the compiled defaults.
	pub fn load(config_path: Option<String>, config_dir: Option<PathBuf>) -> eyre::Result<Self> {
		let dir = config_dir.unwrap_or_else(|| PathBuf::from("."));
		let mut candidates = vec![dir.join("config.toml"), dir.join("config.yaml")];
		candidates.extend(config_path.map(PathBuf::from));

		let mut figment = Figment::new();
		for path in candidates.into_iter().filter(|path| path.exists()) {
			figment = match path.extension().and_then(|ext| ext.to_str()) {
				Some("toml") => figment.merge(Toml::file(path)),
				// Yaml also covers `.yml` and anything exotic the user
				// points us at explicitly.
				_ => figment.merge(Yaml::file(path)),
			};
		}

		Ok(figment.merge(Env::prefixed("GUST_").split("__")).extract()?)
	}
}
