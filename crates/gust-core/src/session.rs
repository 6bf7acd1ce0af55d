use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

/// Anything the relay can pump bytes through.
pub trait AbstractByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AbstractByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A bidirectional byte-stream bound to one client peer.
///
/// TCP sessions are kernel connections; UDP sessions are synthesized per peer
/// on top of a shared datagram socket. Either way the relay only ever sees
/// read, write and close.
pub trait AbstractSession: AbstractByteStream {
	fn local_addr(&self) -> std::io::Result<SocketAddr>;

	fn peer_addr(&self) -> std::io::Result<SocketAddr>;

	/// Closes the session. After close, reads return end-of-stream and writes
	/// fail. A second close reports an "already closed" error.
	fn close(&mut self) -> impl Future<Output = eyre::Result<()>> + Send;
}
