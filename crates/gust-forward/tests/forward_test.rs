//! End-to-end tests for the TCP and UDP relays.
//!
//! Each test stands up a local echo upstream, points a relay server at it and
//! drives the listen side with plain sockets.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use gust_core::types::TargetAddr;
use gust_forward::{TcpRelayServer, UdpRelayServer, udp::UdpForwardListener};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream, UdpSocket},
	time::{sleep, timeout},
};

const WAIT: Duration = Duration::from_secs(5);

/// Echo server that copies every TCP connection back onto itself.
async fn spawn_tcp_echo() -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		while let Ok((mut stream, _)) = listener.accept().await {
			tokio::spawn(async move {
				let mut buf = vec![0u8; 16 * 1024];
				while let Ok(num) = stream.read(&mut buf).await {
					if num == 0 {
						break;
					}
					if stream.write_all(&buf[..num]).await.is_err() {
						break;
					}
				}
			});
		}
	});
	addr
}

/// Echo server that reflects every datagram to its sender.
async fn spawn_udp_echo() -> SocketAddr {
	let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let addr = socket.local_addr().unwrap();
	tokio::spawn(async move {
		let mut buf = vec![0u8; 16 * 1024];
		while let Ok((num, peer)) = socket.recv_from(&mut buf).await {
			let _ = socket.send_to(&buf[..num], peer).await;
		}
	});
	addr
}

async fn spawn_tcp_relay(upstream: SocketAddr) -> (Arc<TcpRelayServer>, SocketAddr) {
	let server = TcpRelayServer::tcp("127.0.0.1:0".parse().unwrap(), TargetAddr::from(upstream))
		.await
		.unwrap();
	let addr = server.local_addr().unwrap();
	let server = Arc::new(server);
	let serving = server.clone();
	tokio::spawn(async move { serving.serve().await });
	(server, addr)
}

async fn spawn_udp_relay(
	upstream: SocketAddr,
	ttl: Duration,
) -> (Arc<UdpRelayServer>, SocketAddr) {
	let server = UdpRelayServer::udp_with_ttl(
		"127.0.0.1:0".parse().unwrap(),
		TargetAddr::from(upstream),
		ttl,
	)
	.await
	.unwrap();
	let addr = server.local_addr().unwrap();
	let server = Arc::new(server);
	let serving = server.clone();
	tokio::spawn(async move { serving.serve().await });
	(server, addr)
}

#[test_log::test(tokio::test)]
async fn tcp_echo_round_trip() {
	let upstream = spawn_tcp_echo().await;
	let (_server, addr) = spawn_tcp_relay(upstream).await;

	let mut client = TcpStream::connect(addr).await.unwrap();
	client.write_all(b"hello\n").await.unwrap();

	let mut buf = [0u8; 6];
	timeout(WAIT, client.read_exact(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf, b"hello\n");
}

#[test_log::test(tokio::test)]
async fn tcp_relays_arbitrary_bytes_verbatim() {
	let upstream = spawn_tcp_echo().await;
	let (_server, addr) = spawn_tcp_relay(upstream).await;

	let payload: Vec<u8> = (0..64 * 1024).map(|i| (i * 31 % 251) as u8).collect();
	let mut client = TcpStream::connect(addr).await.unwrap();

	let expected = payload.clone();
	let (mut read_half, mut write_half) = client.split();
	let writer = async {
		write_half.write_all(&payload).await.unwrap();
	};
	let reader = async {
		let mut echoed = vec![0u8; expected.len()];
		read_half.read_exact(&mut echoed).await.unwrap();
		echoed
	};
	let (_, echoed) = timeout(WAIT, async { tokio::join!(writer, reader) })
		.await
		.unwrap();
	assert_eq!(echoed, expected);
}

#[test_log::test(tokio::test)]
async fn tcp_early_upstream_close_ends_the_session() {
	// Upstream that accepts and immediately hangs up.
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let upstream = listener.local_addr().unwrap();
	tokio::spawn(async move {
		while let Ok((stream, _)) = listener.accept().await {
			drop(stream);
		}
	});

	let (_server, addr) = spawn_tcp_relay(upstream).await;

	let mut client = TcpStream::connect(addr).await.unwrap();
	let _ = client.write_all(b"x").await;

	let mut buf = [0u8; 16];
	let num = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap();
	assert_eq!(num, 0);
}

#[test_log::test(tokio::test)]
async fn udp_single_round_trip() {
	let upstream = spawn_udp_echo().await;
	let (_server, addr) = spawn_udp_relay(upstream, Duration::from_secs(30)).await;

	let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	client.send_to(b"ping", addr).await.unwrap();

	let mut buf = [0u8; 64];
	let (num, from) = timeout(WAIT, client.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf[..num], b"ping");
	assert_eq!(from, addr);
}

#[test_log::test(tokio::test)]
async fn udp_two_peers_stay_separate() {
	let upstream = spawn_udp_echo().await;
	let (server, addr) = spawn_udp_relay(upstream, Duration::from_secs(30)).await;

	let peer_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let peer_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	peer_a.send_to(b"A1", addr).await.unwrap();
	peer_b.send_to(b"B1", addr).await.unwrap();

	let mut buf = [0u8; 64];
	let (num, _) = timeout(WAIT, peer_a.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf[..num], b"A1");
	let (num, _) = timeout(WAIT, peer_b.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf[..num], b"B1");

	assert_eq!(server.listener().session_count(), 2);
}

#[test_log::test(tokio::test)]
async fn udp_idle_expiry_mints_a_fresh_session() {
	let upstream = spawn_udp_echo().await;
	let ttl = Duration::from_millis(300);
	let (server, addr) = spawn_udp_relay(upstream, ttl).await;

	let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let mut buf = [0u8; 64];

	client.send_to(b"one", addr).await.unwrap();
	timeout(WAIT, client.recv_from(&mut buf)).await.unwrap().unwrap();
	assert_eq!(server.listener().session_count(), 1);

	// Go silent for well past the TTL.
	sleep(ttl + Duration::from_millis(400)).await;
	assert_eq!(server.listener().session_count(), 0);

	// The next datagram starts over with a new session.
	client.send_to(b"two", addr).await.unwrap();
	let (num, _) = timeout(WAIT, client.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf[..num], b"two");
	assert_eq!(server.listener().session_count(), 1);
}

#[test_log::test(tokio::test)]
async fn udp_steady_traffic_keeps_the_session_open() {
	let upstream = spawn_udp_echo().await;
	let ttl = Duration::from_millis(500);
	let (server, addr) = spawn_udp_relay(upstream, ttl).await;

	let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let mut buf = [0u8; 64];

	for _ in 0..6 {
		client.send_to(b"ping", addr).await.unwrap();
		timeout(WAIT, client.recv_from(&mut buf)).await.unwrap().unwrap();
		assert_eq!(server.listener().session_count(), 1);
		sleep(ttl / 2).await;
	}

	sleep(ttl + Duration::from_millis(400)).await;
	assert_eq!(server.listener().session_count(), 0);
}

#[test_log::test(tokio::test)]
async fn udp_datagram_boundary_is_8192() {
	let upstream = spawn_udp_echo().await;
	let (_server, addr) = spawn_udp_relay(upstream, Duration::from_secs(30)).await;

	let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let mut buf = vec![0u8; 16 * 1024];

	// Exactly 8192 bytes round-trips intact.
	let exact: Vec<u8> = (0..8192).map(|i| (i % 256) as u8).collect();
	client.send_to(&exact, addr).await.unwrap();
	let (num, _) = timeout(WAIT, client.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(&buf[..num], &exact[..]);

	// One byte more is truncated on ingress.
	let oversized = vec![0x5au8; 8193];
	client.send_to(&oversized, addr).await.unwrap();
	let (num, _) = timeout(WAIT, client.recv_from(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(num, 8192);
	assert_eq!(&buf[..num], &oversized[..8192]);
}

#[test_log::test(tokio::test)]
async fn udp_full_inbox_stalls_the_listener() {
	// Drive the listener directly: nothing accepts, so peer A's inbox fills.
	let listener = UdpForwardListener::bind("127.0.0.1:0".parse().unwrap())
		.await
		.unwrap();
	let addr = listener.local_addr().unwrap();

	let peer_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	for i in 0u8..17 {
		peer_a.send_to(&[i], addr).await.unwrap();
	}
	sleep(Duration::from_millis(300)).await;

	// The 17th datagram has the listen loop blocked: peer B is not minted.
	let peer_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	peer_b.send_to(b"B", addr).await.unwrap();
	sleep(Duration::from_millis(300)).await;
	assert_eq!(listener.session_count(), 1);

	// Draining peer A unblocks the loop; the stalled datagrams arrive in
	// order and peer B finally shows up.
	let mut session = listener.accept().await.unwrap();
	let mut buf = [0u8; 64];
	for i in 0u8..17 {
		let num = timeout(WAIT, session.read(&mut buf)).await.unwrap().unwrap();
		assert_eq!(&buf[..num], &[i]);
	}
	sleep(Duration::from_millis(300)).await;
	assert_eq!(listener.session_count(), 2);

	listener.close().unwrap();
}

#[test_log::test(tokio::test)]
async fn shutdown_fans_out_to_every_session() {
	let tcp_upstream = spawn_tcp_echo().await;
	let udp_upstream = spawn_udp_echo().await;
	let (tcp_server, tcp_addr) = spawn_tcp_relay(tcp_upstream).await;

	let udp_server = UdpRelayServer::udp(
		"127.0.0.1:0".parse().unwrap(),
		TargetAddr::from(udp_upstream),
	)
	.await
	.unwrap();
	let udp_addr = udp_server.local_addr().unwrap();
	let udp_server = Arc::new(udp_server);
	let serving = udp_server.clone();
	let udp_serve = tokio::spawn(async move { serving.serve().await });

	// One live TCP session and two live UDP sessions.
	let mut tcp_client = TcpStream::connect(tcp_addr).await.unwrap();
	tcp_client.write_all(b"hi").await.unwrap();
	let mut buf = [0u8; 64];
	timeout(WAIT, tcp_client.read_exact(&mut buf[..2]))
		.await
		.unwrap()
		.unwrap();

	let peer_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	let peer_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
	for peer in [&peer_a, &peer_b] {
		peer.send_to(b"up", udp_addr).await.unwrap();
		timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
	}
	assert_eq!(udp_server.listener().session_count(), 2);

	tcp_server.close().unwrap();
	udp_server.close().unwrap();

	// Every peer observes its session end promptly.
	let deadline = Duration::from_secs(1);
	let num = timeout(deadline, tcp_client.read(&mut buf))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(num, 0);
	assert_eq!(udp_server.listener().session_count(), 0);
	timeout(deadline, udp_serve).await.unwrap().unwrap().unwrap();

	// Closing again is an error on both transports.
	assert!(tcp_server.close().is_err());
	assert!(udp_server.close().is_err());
}
