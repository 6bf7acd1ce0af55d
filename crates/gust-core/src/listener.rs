use std::net::SocketAddr;

use crate::session::AbstractSession;

/// Source of sessions for a relay server.
pub trait AbstractListener: Send + Sync {
	type Session: AbstractSession + Send + 'static;

	/// Waits for the next session. Unblocks with an error once the listener
	/// is closed.
	fn accept(&self) -> impl Future<Output = eyre::Result<Self::Session>> + Send;

	/// Stops accepting and tears down whatever sessions the listener still
	/// owns. A second close is an error.
	fn close(&self) -> eyre::Result<()>;

	fn local_addr(&self) -> std::io::Result<SocketAddr>;
}
