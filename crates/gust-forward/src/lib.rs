use std::{backtrace::Backtrace, net::SocketAddr};

use snafu::Snafu;

pub mod registry;
mod server;
pub mod session;
mod supervisor;
pub mod tcp;
pub mod udp;

pub use server::*;
pub use supervisor::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	#[snafu(display("failed to bind {socket_addr}"))]
	Bind {
		socket_addr: SocketAddr,
		source:      std::io::Error,
		backtrace:   Backtrace,
	},
	#[snafu(display("failed to resolve {addr}"))]
	Resolve {
		addr:      String,
		source:    std::io::Error,
		backtrace: Backtrace,
	},
	Io {
		source:    std::io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display("already closed"))]
	AlreadyClosed { backtrace: Backtrace },
	#[snafu(display("listener is closed"))]
	ListenerClosed { backtrace: Backtrace },
}

impl Error {
	/// Benign double-close, as opposed to a real teardown failure.
	pub fn is_already_closed(&self) -> bool {
		matches!(self, Error::AlreadyClosed { .. })
	}
}
