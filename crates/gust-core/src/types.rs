use std::{
	fmt,
	net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
	str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Transport the forwarder listens and dials with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
	Tcp,
	Udp,
}

impl fmt::Display for Transport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Transport::Tcp => f.write_str("tcp"),
			Transport::Udp => f.write_str("udp"),
		}
	}
}

impl FromStr for Transport {
	type Err = InvalidTransport;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"tcp" => Ok(Transport::Tcp),
			"udp" => Ok(Transport::Udp),
			_ => Err(InvalidTransport {
				input: s.to_string(),
			}),
		}
	}
}

#[derive(Clone, Debug)]
pub struct InvalidTransport {
	input: String,
}

impl fmt::Display for InvalidTransport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unsupported transport protocol {:?}", self.input)
	}
}

impl std::error::Error for InvalidTransport {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetAddr {
	Domain(String, u16),
	IPv4(Ipv4Addr, u16),
	IPv6(Ipv6Addr, u16),
}

impl TargetAddr {
	pub fn port(&self) -> u16 {
		match self {
			TargetAddr::Domain(_, port) => *port,
			TargetAddr::IPv4(_, port) => *port,
			TargetAddr::IPv6(_, port) => *port,
		}
	}

	/// Resolves to a single socket address. Domains go through the system
	/// resolver and the first answer wins.
	pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
		match self {
			TargetAddr::IPv4(ip, port) => Ok(SocketAddr::from((*ip, *port))),
			TargetAddr::IPv6(ip, port) => Ok(SocketAddr::from((*ip, *port))),
			TargetAddr::Domain(domain, port) => {
				let mut addrs = tokio::net::lookup_host((domain.as_str(), *port)).await?;
				addrs.next().ok_or_else(|| {
					std::io::Error::new(
						std::io::ErrorKind::NotFound,
						format!("no address found for {domain}"),
					)
				})
			}
		}
	}
}

impl fmt::Display for TargetAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TargetAddr::Domain(domain, port) => write!(f, "{domain}:{port}"),
			TargetAddr::IPv4(ip, port) => write!(f, "{ip}:{port}"),
			TargetAddr::IPv6(ip, port) => write!(f, "[{ip}]:{port}"),
		}
	}
}

impl From<SocketAddr> for TargetAddr {
	fn from(addr: SocketAddr) -> Self {
		match addr.ip() {
			IpAddr::V4(ip) => TargetAddr::IPv4(ip, addr.port()),
			IpAddr::V6(ip) => TargetAddr::IPv6(ip, addr.port()),
		}
	}
}

impl FromStr for TargetAddr {
	type Err = InvalidAddr;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if let Ok(addr) = s.parse::<SocketAddr>() {
			return Ok(addr.into());
		}
		let invalid = || InvalidAddr {
			input: s.to_string(),
		};
		let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
		let port = port.parse::<u16>().map_err(|_| invalid())?;
		if host.is_empty() || host.contains([':', '[', ']']) {
			return Err(invalid());
		}
		Ok(TargetAddr::Domain(host.to_string(), port))
	}
}

impl TryFrom<String> for TargetAddr {
	type Error = InvalidAddr;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<TargetAddr> for String {
	fn from(addr: TargetAddr) -> Self {
		addr.to_string()
	}
}

#[derive(Clone, Debug)]
pub struct InvalidAddr {
	input: String,
}

impl fmt::Display for InvalidAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "invalid address {:?}, expected host:port", self.input)
	}
}

impl std::error::Error for InvalidAddr {}

/// What the launcher hands the forwarding engine: where to listen, where to
/// dial, and over which transport.
#[derive(Clone, Debug)]
pub struct ForwardTarget {
	pub listen_addr: SocketAddr,
	pub target_addr: TargetAddr,
	pub transport:   Transport,
}
