//! Log-target helpers.
//!
//! The wrappers prefix the `tracing` target with the name of the crate the
//! event fires from, so a line reads `gust_forward [UDP-LN] ...` without
//! every call site spelling the crate out. `env!("CARGO_CRATE_NAME")` and the
//! concat both expand at the call site, keeping the target a `&'static str`.

pub use const_str;

#[macro_export]
macro_rules! info {
	(target: $target:expr, $($arg:tt)*) => {
		tracing::info!(
			target: $crate::log::const_str::concat!(env!("CARGO_CRATE_NAME"), " ", $target),
			$($arg)*
		)
	};
	($($arg:tt)*) => {
		tracing::info!($($arg)*)
	};
}

#[macro_export]
macro_rules! warn {
	(target: $target:expr, $($arg:tt)*) => {
		tracing::warn!(
			target: $crate::log::const_str::concat!(env!("CARGO_CRATE_NAME"), " ", $target),
			$($arg)*
		)
	};
	($($arg:tt)*) => {
		tracing::warn!($($arg)*)
	};
}

#[macro_export]
macro_rules! error {
	(target: $target:expr, $($arg:tt)*) => {
		tracing::error!(
			target: $crate::log::const_str::concat!(env!("CARGO_CRATE_NAME"), " ", $target),
			$($arg)*
		)
	};
	($($arg:tt)*) => {
		tracing::error!($($arg)*)
	};
}
