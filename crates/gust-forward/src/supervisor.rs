use std::time::Duration;

use gust_core::{AbstractProbe, info};

/// How often the supervisor asks the probe about the workload.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive misses before the workload counts as gone.
pub const PROBE_MISSES: u32 = 3;

/// Polls `probe` every `interval` and returns once `misses` consecutive
/// probes came back negative. A live result resets the count, so a flapping
/// workload does not accumulate toward shutdown.
///
/// The caller reacts by closing its relay server; the supervisor itself
/// holds no reference to it.
pub async fn supervise(probe: &impl AbstractProbe, interval: Duration, misses: u32) {
	let mut missed = 0u32;
	while missed < misses {
		if probe.is_live().await {
			missed = 0;
		} else {
			missed += 1;
		}
		tokio::time::sleep(interval).await;
	}
	info!(target: "[WATCH]", "workload gone after {misses} consecutive misses");
}
