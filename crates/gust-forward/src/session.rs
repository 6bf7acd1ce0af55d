//! Synthetic UDP connections.
//!
//! A UDP listener owns one datagram socket for every peer that talks to it.
//! To reuse the byte-stream relay pipeline, each peer is given a synthetic
//! connection: an inbox the listen loop demultiplexes datagrams into, a
//! shared handle on the listen socket for writes, and an idle timer that
//! closes the connection after [`crate::udp::DEFAULT_TTL`] without traffic.
//!
//! The connection is split in two. [`UdpSessionHandle`] is the shared control
//! half, reachable from the registry, the idle timer and the listen loop.
//! [`UdpSession`] is the exclusive session half handed to the relay task; it
//! owns the inbox receiver and implements `AsyncRead`/`AsyncWrite`.

use std::{
	io::Result as IoResult,
	net::SocketAddr,
	pin::Pin,
	sync::{Arc, Mutex, PoisonError},
	task::{Context, Poll, ready},
	time::Duration,
};

use bytes::Bytes;
use gust_core::AbstractSession;
use tokio::{
	io::{AsyncRead, AsyncWrite, ReadBuf},
	net::UdpSocket,
	sync::mpsc,
	time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;

use crate::{AlreadyClosedSnafu, Error, registry::SessionRegistry};

pub(crate) const INBOX_LEN: usize = 16;
pub(crate) const KEEPALIVE_LEN: usize = 16;

/// Shared control half of a synthetic connection.
///
/// The inbox sender slot doubles as the closed flag: taking it is the one
/// irreversible close transition, and dropping it wakes a reader blocked on
/// an empty inbox.
pub struct UdpSessionHandle {
	remote:   SocketAddr,
	inbox:    Mutex<Option<mpsc::Sender<Bytes>>>,
	closed:   CancellationToken,
	registry: Arc<SessionRegistry>,
}

impl UdpSessionHandle {
	pub fn remote(&self) -> SocketAddr {
		self.remote
	}

	pub fn is_closed(&self) -> bool {
		self.closed.is_cancelled()
	}

	pub(crate) fn closed(&self) -> &CancellationToken {
		&self.closed
	}

	/// The live inbox sender, or `None` once the connection has closed.
	pub(crate) fn sender(&self) -> Option<mpsc::Sender<Bytes>> {
		self.inbox
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Closes the connection: flips the closed flag, broadcasts the closed
	/// signal and removes the registry entry. Does not touch the shared
	/// listen socket. Only the first close succeeds.
	pub fn close(&self) -> Result<(), Error> {
		{
			let mut slot = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
			if slot.take().is_none() {
				return AlreadyClosedSnafu.fail();
			}
			self.closed.cancel();
		}
		self.registry.delete(self.remote);
		Ok(())
	}
}

/// Mints a synthetic connection for `remote` and starts its idle timer.
///
/// Returns the shared control half (for the registry) and the session half
/// (for the relay). The caller is responsible for storing the handle.
pub(crate) fn spawn_session(
	socket: Arc<UdpSocket>,
	remote: SocketAddr,
	registry: Arc<SessionRegistry>,
	ttl: Duration,
) -> (Arc<UdpSessionHandle>, UdpSession) {
	let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_LEN);
	let (keepalive_tx, keepalive_rx) = mpsc::channel(KEEPALIVE_LEN);

	let handle = Arc::new(UdpSessionHandle {
		remote,
		inbox: Mutex::new(Some(inbox_tx)),
		closed: CancellationToken::new(),
		registry,
	});

	tokio::spawn(idle_timer(handle.clone(), keepalive_rx, ttl));

	let session = UdpSession {
		handle: handle.clone(),
		socket,
		inbox: inbox_rx,
		keepalive: keepalive_tx,
	};
	(handle, session)
}

/// Closes the connection after `ttl` without a keepalive signal.
///
/// Every signal resets the full TTL; resetting the sleep replaces any pending
/// expiry. Exits as soon as the closed signal broadcasts.
async fn idle_timer(handle: Arc<UdpSessionHandle>, mut keepalive: mpsc::Receiver<()>, ttl: Duration) {
	let expiry = sleep(ttl);
	tokio::pin!(expiry);
	loop {
		tokio::select! {
			_ = handle.closed.cancelled() => return,
			signal = keepalive.recv() => match signal {
				Some(()) => expiry.as_mut().reset(Instant::now() + ttl),
				None => return,
			},
			_ = expiry.as_mut() => {
				let _ = handle.close();
				return;
			}
		}
	}
}

/// Session half of a synthetic connection, owned by one relay task.
///
/// Reads pull whole datagrams out of the inbox, truncating silently when the
/// caller's buffer is smaller than the datagram; there is no reassembly. A
/// write sends one datagram to the peer through the shared listen socket.
/// Writes are not preempted by a concurrent close; cancellation is a
/// read-side affair.
pub struct UdpSession {
	handle:    Arc<UdpSessionHandle>,
	socket:    Arc<UdpSocket>,
	inbox:     mpsc::Receiver<Bytes>,
	keepalive: mpsc::Sender<()>,
}

impl UdpSession {
	pub fn remote(&self) -> SocketAddr {
		self.handle.remote
	}

	pub fn is_closed(&self) -> bool {
		self.handle.is_closed()
	}

	/// Tells the idle timer that traffic happened. Lossy by design: a full
	/// signal queue already guarantees a pending reset.
	fn bump(&self) {
		let _ = self.keepalive.try_send(());
	}
}

impl AsyncRead for UdpSession {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<IoResult<()>> {
		let this = self.get_mut();
		match this.inbox.poll_recv(cx) {
			Poll::Ready(Some(datagram)) => {
				let num = datagram.len().min(buf.remaining());
				buf.put_slice(&datagram[..num]);
				if num > 0 {
					this.bump();
				}
				Poll::Ready(Ok(()))
			}
			// Sender gone: the connection closed. Anything still queued was
			// drained above, so this is end-of-stream.
			Poll::Ready(None) => Poll::Ready(Ok(())),
			Poll::Pending => Poll::Pending,
		}
	}
}

impl AsyncWrite for UdpSession {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<IoResult<usize>> {
		let this = self.get_mut();
		if this.handle.is_closed() {
			return Poll::Ready(Err(std::io::Error::new(
				std::io::ErrorKind::BrokenPipe,
				"connection closed",
			)));
		}
		let num = ready!(this.socket.poll_send_to(cx, buf, this.handle.remote))?;
		if num > 0 {
			this.bump();
		}
		Poll::Ready(Ok(num))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		let _ = self.handle.close();
		Poll::Ready(Ok(()))
	}
}

impl AbstractSession for UdpSession {
	fn local_addr(&self) -> IoResult<SocketAddr> {
		self.socket.local_addr()
	}

	fn peer_addr(&self) -> IoResult<SocketAddr> {
		Ok(self.handle.remote)
	}

	async fn close(&mut self) -> eyre::Result<()> {
		Ok(self.handle.close()?)
	}
}

impl Drop for UdpSession {
	fn drop(&mut self) {
		let _ = self.handle.close();
	}
}
