use time::macros::format_description;
use tracing::{Level, level_filters::LevelFilter};
use tracing_subscriber::{
	filter::Targets, fmt::time::LocalTime, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Workspace crates whose events get raised to the requested level; anything
/// from outside the workspace stays at INFO.
const WORKSPACE_CRATES: &[&str] = &["gust", "gust_core", "gust_forward", "gust_test"];

pub fn init_log(level: Level) -> eyre::Result<()> {
	let filter = WORKSPACE_CRATES.iter().fold(
		Targets::new().with_default(LevelFilter::INFO),
		|targets, name| targets.with_target(*name, level),
	);

	let timer = LocalTime::new(format_description!(
		"[year]-[month]-[day] [hour]:[minute]:[second]"
	));
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(true).with_timer(timer))
		.try_init()?;

	Ok(())
}
