//! Manual test clients for a running forwarder.
//!
//! These helpers poke a gust listen port from the outside, the way a real
//! client would, and report what happened. They are meant for interactive
//! verification against a deployed sidecar; the automated end-to-end tests
//! live in the `gust-forward` crate.

use std::time::Duration;

use eyre::Context as _;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpStream, UdpSocket},
	time::timeout,
};

/// Sends `payload` over TCP through the forwarder and reads back the same
/// number of bytes. Useful against an echoing upstream.
///
/// # Arguments
/// * `forward_addr` - gust listen address, e.g., "127.0.0.1:8080"
/// * `payload` - bytes to send
///
/// # Errors
/// Returns an error when the connection fails, the upstream stays silent for
/// five seconds, or I/O operations fail
pub async fn test_forward_tcp(forward_addr: &str, payload: &[u8]) -> eyre::Result<Vec<u8>> {
	println!("\n========== TCP Forward Test ==========");
	println!("Forwarder address: {}", forward_addr);

	let mut stream = TcpStream::connect(forward_addr)
		.await
		.wrap_err("failed to connect to forwarder")?;
	println!("✓ Connected to forwarder");

	stream.write_all(payload).await?;
	stream.flush().await?;
	println!("✓ Payload sent ({} bytes)", payload.len());

	let mut echoed = vec![0u8; payload.len()];
	timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
		.await
		.wrap_err("timed out waiting for the upstream reply")??;
	println!("✓ Reply received: {} bytes", echoed.len());

	println!("========== TCP Test Successful ==========\n");
	Ok(echoed)
}

/// Sends one datagram through the forwarder and waits for one reply
/// datagram.
///
/// # Arguments
/// * `forward_addr` - gust listen address, e.g., "127.0.0.1:8080"
/// * `payload` - datagram to send
///
/// # Errors
/// Returns an error when binding fails or no reply arrives within five
/// seconds
pub async fn test_forward_udp(forward_addr: &str, payload: &[u8]) -> eyre::Result<Vec<u8>> {
	println!("\n========== UDP Forward Test ==========");
	println!("Forwarder address: {}", forward_addr);

	let socket = UdpSocket::bind("0.0.0.0:0")
		.await
		.wrap_err("failed to bind local socket")?;
	println!("✓ Local socket bound to: {}", socket.local_addr()?);

	socket.send_to(payload, forward_addr).await?;
	println!("✓ Datagram sent ({} bytes)", payload.len());

	let mut buf = vec![0u8; 16 * 1024];
	let (num, from) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
		.await
		.wrap_err("timed out waiting for the reply datagram")??;
	println!("✓ Reply received: {} bytes from {}", num, from);

	buf.truncate(num);
	println!("========== UDP Test Successful ==========\n");
	Ok(buf)
}
