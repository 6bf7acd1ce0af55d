use std::{io::Result as IoResult, net::SocketAddr};

use gust_core::{
	AbstractListener, AbstractSession, AbstractUpstream, error, info,
	io::copy_io,
	types::{ForwardTarget, Transport, TargetAddr},
};
use snafu::ResultExt as _;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
	Error, ResolveSnafu,
	tcp::{TcpForwardListener, TcpUpstream},
	udp::{UdpForwardListener, UdpUpstream},
};

/// Relay server: accepts sessions from one listener and pumps each one
/// against a freshly dialed upstream.
pub struct RelayServer<L, U> {
	listener: L,
	upstream: U,
	cancel:   CancellationToken,
	tasks:    TaskTracker,
}

pub type TcpRelayServer = RelayServer<TcpForwardListener, TcpUpstream>;
pub type UdpRelayServer = RelayServer<UdpForwardListener, UdpUpstream>;

impl<L, U> RelayServer<L, U>
where
	L: AbstractListener,
	U: AbstractUpstream,
{
	pub fn new(listener: L, upstream: U) -> Self {
		Self {
			listener,
			upstream,
			cancel: CancellationToken::new(),
			tasks: TaskTracker::new(),
		}
	}

	pub fn listener(&self) -> &L {
		&self.listener
	}

	pub fn local_addr(&self) -> IoResult<SocketAddr> {
		self.listener.local_addr()
	}

	/// Accepts sessions until the listener fails or [`RelayServer::close`]
	/// is called, then waits for the outstanding relay tasks.
	///
	/// An accept failure after a requested shutdown is the expected way out
	/// and is not an error.
	pub async fn serve(&self) -> eyre::Result<()> {
		loop {
			let session = match self.listener.accept().await {
				Ok(session) => session,
				Err(err) => {
					if self.cancel.is_cancelled() {
						break;
					}
					error!(target: "[SERVE]", "error accepting session: {err:#}");
					self.shutdown_tasks().await;
					return Err(err);
				}
			};
			match session.peer_addr() {
				Ok(peer) => info!(target: "[SERVE]", "accepted session: {peer}"),
				Err(_) => info!(target: "[SERVE]", "accepted session"),
			}
			self.tasks
				.spawn(relay(session, self.upstream.clone(), self.cancel.child_token()));
		}
		self.shutdown_tasks().await;
		Ok(())
	}

	/// Signals shutdown: pending accepts unblock, the listener tears down
	/// its sessions and every relay task drains out.
	pub fn close(&self) -> eyre::Result<()> {
		self.cancel.cancel();
		self.listener.close()
	}

	async fn shutdown_tasks(&self) {
		self.tasks.close();
		self.tasks.wait().await;
	}
}

/// Per-session worker: dial the upstream, pump bytes both ways, close both
/// sides no matter how it ends.
async fn relay<S, U>(mut session: S, upstream: U, cancel: CancellationToken)
where
	S: AbstractSession + Send + 'static,
	U: AbstractUpstream,
{
	let peer = match session.peer_addr() {
		Ok(peer) => peer.to_string(),
		Err(_) => String::from("<unknown>"),
	};

	let mut agent = match upstream.dial().await {
		Ok(io) => io,
		Err(err) => {
			error!(target: "[RELAY]", "failed to dial upstream for {peer}: {err}");
			let _ = session.close().await;
			return;
		}
	};

	let outcome = tokio::select! {
		outcome = copy_io(&mut session, &mut agent) => Some(outcome),
		_ = cancel.cancelled() => None,
	};

	match outcome {
		Some((up, down, err)) => {
			info!(target: "[RELAY]", "{peer}: {up} bytes up, {down} bytes down");
			match err {
				None => info!(target: "[RELAY]", "client {peer} disconnected"),
				Some(err) => error!(target: "[RELAY]", "client {peer}: {err}"),
			}
		}
		None => info!(target: "[RELAY]", "client {peer} shut down"),
	}

	// The upstream closes when `agent` drops.
	let _ = session.close().await;
}

impl RelayServer<TcpForwardListener, TcpUpstream> {
	/// TCP relay: kernel listener on `listen_addr`, one upstream stream per
	/// session. Domain targets are resolved per dial.
	pub async fn tcp(listen_addr: SocketAddr, target_addr: TargetAddr) -> Result<Self, Error> {
		let listener = TcpForwardListener::bind(listen_addr).await?;
		Ok(Self::new(listener, TcpUpstream::new(target_addr)))
	}
}

impl RelayServer<UdpForwardListener, UdpUpstream> {
	/// UDP relay: synthetic sessions demultiplexed from `listen_addr`, one
	/// connected datagram socket per session. The target is resolved here,
	/// once.
	pub async fn udp(listen_addr: SocketAddr, target_addr: TargetAddr) -> Result<Self, Error> {
		Self::udp_with_ttl(listen_addr, target_addr, crate::udp::DEFAULT_TTL).await
	}

	pub async fn udp_with_ttl(
		listen_addr: SocketAddr,
		target_addr: TargetAddr,
		ttl: std::time::Duration,
	) -> Result<Self, Error> {
		let resolved = target_addr.resolve().await.context(ResolveSnafu {
			addr: target_addr.to_string(),
		})?;
		let listener = UdpForwardListener::bind_with_ttl(listen_addr, ttl).await?;
		Ok(Self::new(listener, UdpUpstream::new(resolved)))
	}
}

/// Transport-dispatching wrapper, for callers configured with a
/// [`ForwardTarget`] rather than a concrete transport.
pub enum Server {
	Tcp(TcpRelayServer),
	Udp(UdpRelayServer),
}

impl Server {
	pub async fn bind(target: &ForwardTarget) -> Result<Self, Error> {
		match target.transport {
			Transport::Tcp => Ok(Server::Tcp(
				TcpRelayServer::tcp(target.listen_addr, target.target_addr.clone()).await?,
			)),
			Transport::Udp => Ok(Server::Udp(
				UdpRelayServer::udp(target.listen_addr, target.target_addr.clone()).await?,
			)),
		}
	}

	pub async fn serve(&self) -> eyre::Result<()> {
		match self {
			Server::Tcp(server) => server.serve().await,
			Server::Udp(server) => server.serve().await,
		}
	}

	pub fn close(&self) -> eyre::Result<()> {
		match self {
			Server::Tcp(server) => server.close(),
			Server::Udp(server) => server.close(),
		}
	}

	pub fn local_addr(&self) -> IoResult<SocketAddr> {
		match self {
			Server::Tcp(server) => server.local_addr(),
			Server::Udp(server) => server.local_addr(),
		}
	}
}
