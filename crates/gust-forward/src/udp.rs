//! UDP listener and upstream.
//!
//! One datagram socket serves every peer, so the listener demultiplexes:
//! the listen loop reads datagrams, mints a synthetic connection per novel
//! peer and routes each payload into that peer's inbox. Minted sessions are
//! published to the accept channel exactly once; repeat datagrams only feed
//! the inbox.
//!
//! Backpressure: a full inbox blocks the listen loop until the consumer
//! drains it, so one stuck peer stalls datagram delivery for every peer of
//! this listener. The blocked enqueue aborts if the connection closes while
//! it waits.

use std::{
	io::Result as IoResult,
	net::{Ipv4Addr, Ipv6Addr, SocketAddr},
	sync::{Arc, Mutex, PoisonError},
	task::{Context, Poll},
	time::Duration,
};

use bytes::Bytes;
use gust_core::{AbstractListener, AbstractUpstream, info, warn};
use snafu::ResultExt as _;
use tokio::{
	io::{AsyncRead, AsyncWrite, ReadBuf},
	net::UdpSocket,
	sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
	AlreadyClosedSnafu, BindSnafu, Error, ListenerClosedSnafu,
	registry::SessionRegistry,
	session::{UdpSession, spawn_session},
};

pub(crate) const MAX_DATAGRAM_SIZE: usize = 8 * 1024;
pub(crate) const SESSION_CHANNEL_LEN: usize = 128;

/// Idle TTL: a synthetic connection without a successful read or write for
/// this long is closed and its registry entry removed.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Accepts synthetic UDP sessions demultiplexed from one datagram socket.
pub struct UdpForwardListener {
	shared:   Arc<ListenerShared>,
	sessions: tokio::sync::Mutex<mpsc::Receiver<UdpSession>>,
	ttl:      Duration,
}

/// State the listen loop needs to tear the listener down from its side.
struct ListenerShared {
	socket:   Arc<UdpSocket>,
	registry: Arc<SessionRegistry>,
	cancel:   CancellationToken,
	closed:   Mutex<bool>,
}

impl ListenerShared {
	fn close(&self) -> Result<(), Error> {
		{
			let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
			if *closed {
				return AlreadyClosedSnafu.fail();
			}
			*closed = true;
		}
		self.cancel.cancel();
		self.registry.clear(|handle| {
			let _ = handle.close();
		});
		Ok(())
	}
}

impl UdpForwardListener {
	pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
		Self::bind_with_ttl(addr, DEFAULT_TTL).await
	}

	pub async fn bind_with_ttl(addr: SocketAddr, ttl: Duration) -> Result<Self, Error> {
		let socket = UdpSocket::bind(addr)
			.await
			.context(BindSnafu { socket_addr: addr })?;
		let shared = Arc::new(ListenerShared {
			socket: Arc::new(socket),
			registry: Arc::new(SessionRegistry::new()),
			cancel: CancellationToken::new(),
			closed: Mutex::new(false),
		});
		let (session_tx, session_rx) = mpsc::channel(SESSION_CHANNEL_LEN);
		tokio::spawn(listen_loop(shared.clone(), session_tx, ttl));

		Ok(Self {
			shared,
			sessions: tokio::sync::Mutex::new(session_rx),
			ttl,
		})
	}

	/// Waits for the next synthetic session. Each session is yielded once,
	/// when its peer first shows up.
	pub async fn accept(&self) -> Result<UdpSession, Error> {
		let mut sessions = self.sessions.lock().await;
		sessions.recv().await.ok_or_else(|| ListenerClosedSnafu.build())
	}

	/// Stops the listen loop and closes every registered connection. A
	/// second close is an error.
	pub fn close(&self) -> Result<(), Error> {
		self.shared.close()
	}

	pub fn local_addr(&self) -> IoResult<SocketAddr> {
		self.shared.socket.local_addr()
	}

	/// Number of live synthetic connections.
	pub fn session_count(&self) -> usize {
		self.shared.registry.size()
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}
}

impl AbstractListener for UdpForwardListener {
	type Session = UdpSession;

	async fn accept(&self) -> eyre::Result<UdpSession> {
		Ok(UdpForwardListener::accept(self).await?)
	}

	fn close(&self) -> eyre::Result<()> {
		Ok(UdpForwardListener::close(self)?)
	}

	fn local_addr(&self) -> IoResult<SocketAddr> {
		UdpForwardListener::local_addr(self)
	}
}

/// Single demux task per listener: read a datagram, mint or look up the
/// peer's connection, enqueue the payload.
async fn listen_loop(shared: Arc<ListenerShared>, sessions: mpsc::Sender<UdpSession>, ttl: Duration) {
	let mut buf = [0u8; MAX_DATAGRAM_SIZE];
	loop {
		let (num, peer) = tokio::select! {
			_ = shared.cancel.cancelled() => return,
			res = shared.socket.recv_from(&mut buf) => match res {
				Ok(v) => v,
				Err(err) => {
					warn!(target: "[UDP-LN]", "error reading listen socket: {err}");
					let _ = shared.close();
					return;
				}
			},
		};
		// A zero-length datagram has no byte-stream representation (a
		// zero-byte read means end-of-stream), so it is dropped here.
		if num == 0 {
			continue;
		}
		let payload = Bytes::copy_from_slice(&buf[..num]);

		let handle = match shared.registry.load(peer) {
			Some(handle) => handle,
			None => {
				let (handle, session) = spawn_session(
					shared.socket.clone(),
					peer,
					shared.registry.clone(),
					ttl,
				);
				shared.registry.store(peer, handle.clone());
				info!(target: "[UDP-LN]", "new session from {peer}");
				tokio::select! {
					_ = shared.cancel.cancelled() => {
						let _ = handle.close();
						return;
					}
					res = sessions.send(session) => {
						if res.is_err() {
							// Accept side is gone; nobody will ever relay this.
							let _ = handle.close();
							return;
						}
					}
				}
				handle
			}
		};

		// Taken between lookup and here means the connection just closed;
		// the datagram is dropped like any other post-close arrival.
		let Some(inbox) = handle.sender() else {
			continue;
		};
		tokio::select! {
			biased;
			_ = handle.closed().cancelled() => {}
			_ = shared.cancel.cancelled() => {}
			_ = inbox.send(payload) => {}
		}
	}
}

/// Dials the upstream with a fresh connected datagram socket per session, so
/// the upstream half reads and writes exactly one peer.
#[derive(Clone, Copy)]
pub struct UdpUpstream {
	target: SocketAddr,
}

impl UdpUpstream {
	pub fn new(target: SocketAddr) -> Self {
		Self { target }
	}
}

impl AbstractUpstream for UdpUpstream {
	type Io = UdpUpstreamIo;

	async fn dial(&self) -> IoResult<UdpUpstreamIo> {
		let bind_addr: SocketAddr = if self.target.is_ipv4() {
			(Ipv4Addr::UNSPECIFIED, 0).into()
		} else {
			(Ipv6Addr::UNSPECIFIED, 0).into()
		};
		let socket = UdpSocket::bind(bind_addr).await?;
		socket.connect(self.target).await?;
		Ok(UdpUpstreamIo { socket })
	}
}

/// A connected datagram socket behind the byte-stream contract: one write is
/// one datagram out, one read is one datagram in (truncated to the buffer).
pub struct UdpUpstreamIo {
	socket: UdpSocket,
}

impl AsyncRead for UdpUpstreamIo {
	fn poll_read(
		self: std::pin::Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<IoResult<()>> {
		self.socket.poll_recv(cx, buf)
	}
}

impl AsyncWrite for UdpUpstreamIo {
	fn poll_write(
		self: std::pin::Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<IoResult<usize>> {
		self.socket.poll_send(cx, buf)
	}

	fn poll_flush(self: std::pin::Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: std::pin::Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		Poll::Ready(Ok(()))
	}
}
