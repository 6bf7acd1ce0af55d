use std::{
	io::Result as IoResult,
	net::SocketAddr,
	pin::Pin,
	sync::{Mutex, PoisonError},
	task::{Context, Poll},
};

use gust_core::{AbstractListener, AbstractSession, AbstractUpstream, types::TargetAddr};
use snafu::ResultExt as _;
use tokio::{
	io::{AsyncRead, AsyncWrite, AsyncWriteExt as _, ReadBuf},
	net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;

use crate::{AlreadyClosedSnafu, BindSnafu, Error, IoSnafu, ListenerClosedSnafu};

/// Accepts kernel TCP sessions on a bound socket.
pub struct TcpForwardListener {
	inner:  TcpListener,
	cancel: CancellationToken,
	closed: Mutex<bool>,
}

impl TcpForwardListener {
	pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
		let socket = socket2::Socket::new(
			socket2::Domain::for_address(addr),
			socket2::Type::STREAM,
			Some(socket2::Protocol::TCP),
		)
		.context(BindSnafu { socket_addr: addr })?;
		socket
			.set_reuse_address(true)
			.context(BindSnafu { socket_addr: addr })?;
		socket
			.bind(&addr.into())
			.context(BindSnafu { socket_addr: addr })?;
		socket.listen(1024).context(BindSnafu { socket_addr: addr })?;
		socket
			.set_nonblocking(true)
			.context(BindSnafu { socket_addr: addr })?;
		let inner =
			TcpListener::from_std(socket.into()).context(BindSnafu { socket_addr: addr })?;

		Ok(Self {
			inner,
			cancel: CancellationToken::new(),
			closed: Mutex::new(false),
		})
	}

	pub async fn accept(&self) -> Result<TcpSession, Error> {
		tokio::select! {
			_ = self.cancel.cancelled() => ListenerClosedSnafu.fail(),
			res = self.inner.accept() => {
				let (stream, _) = res.context(IoSnafu)?;
				Ok(TcpSession::new(stream))
			}
		}
	}

	/// Unblocks pending accepts with a "listener is closed" error. A second
	/// close is itself an error.
	pub fn close(&self) -> Result<(), Error> {
		let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
		if *closed {
			return AlreadyClosedSnafu.fail();
		}
		*closed = true;
		self.cancel.cancel();
		Ok(())
	}

	pub fn local_addr(&self) -> IoResult<SocketAddr> {
		self.inner.local_addr()
	}
}

impl AbstractListener for TcpForwardListener {
	type Session = TcpSession;

	async fn accept(&self) -> eyre::Result<TcpSession> {
		Ok(TcpForwardListener::accept(self).await?)
	}

	fn close(&self) -> eyre::Result<()> {
		Ok(TcpForwardListener::close(self)?)
	}

	fn local_addr(&self) -> IoResult<SocketAddr> {
		TcpForwardListener::local_addr(self)
	}
}

pin_project_lite::pin_project! {
	/// A kernel TCP connection behind the uniform session contract.
	pub struct TcpSession {
		#[pin]
		inner: TcpStream,
		closed: bool,
	}
}

impl std::fmt::Debug for TcpSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TcpSession")
			.field("closed", &self.closed)
			.finish_non_exhaustive()
	}
}

impl TcpSession {
	fn new(inner: TcpStream) -> Self {
		Self {
			inner,
			closed: false,
		}
	}
}

impl AsyncRead for TcpSession {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<IoResult<()>> {
		self.project().inner.poll_read(cx, buf)
	}
}

impl AsyncWrite for TcpSession {
	fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<IoResult<usize>> {
		self.project().inner.poll_write(cx, buf)
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		self.project().inner.poll_flush(cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
		self.project().inner.poll_shutdown(cx)
	}
}

impl AbstractSession for TcpSession {
	fn local_addr(&self) -> IoResult<SocketAddr> {
		self.inner.local_addr()
	}

	fn peer_addr(&self) -> IoResult<SocketAddr> {
		self.inner.peer_addr()
	}

	async fn close(&mut self) -> eyre::Result<()> {
		if self.closed {
			return Err(AlreadyClosedSnafu.build().into());
		}
		self.closed = true;
		self.inner.shutdown().await?;
		Ok(())
	}
}

/// Dials the upstream with a fresh TCP connection per session. Domain targets
/// are resolved at dial time.
#[derive(Clone)]
pub struct TcpUpstream {
	target: TargetAddr,
}

impl TcpUpstream {
	pub fn new(target: TargetAddr) -> Self {
		Self { target }
	}
}

impl AbstractUpstream for TcpUpstream {
	type Io = TcpStream;

	async fn dial(&self) -> IoResult<TcpStream> {
		match &self.target {
			TargetAddr::Domain(host, port) => TcpStream::connect((host.as_str(), *port)).await,
			TargetAddr::IPv4(ip, port) => TcpStream::connect((*ip, *port)).await,
			TargetAddr::IPv6(ip, port) => TcpStream::connect((*ip, *port)).await,
		}
	}
}
