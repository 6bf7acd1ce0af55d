use crate::session::AbstractByteStream;

/// Dials the upstream side of a relay, once per accepted session.
pub trait AbstractUpstream: Clone + Send + Sync + 'static {
	type Io: AbstractByteStream + 'static;

	fn dial(&self) -> impl Future<Output = std::io::Result<Self::Io>> + Send;
}
