/// Liveness check for the companion workload this forwarder fronts.
///
/// Implementations answer a single question: is the workload still there?
/// Probe failures count as "not live"; the supervisor decides how many
/// misses are fatal.
pub trait AbstractProbe: Send + Sync {
	fn is_live(&self) -> impl Future<Output = bool> + Send;
}
