use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUFFER_SIZE: usize = 16 * 1024;

/// How one relay direction ended.
enum PumpEnd {
	/// The reader reached end-of-stream. Not an error: one side hung up.
	Eof,
	Failed(std::io::Error),
}

/// Copies `reader` into `writer` until end-of-stream or a failure, crediting
/// `moved` only for chunks that were fully written out.
async fn pump<R, W>(reader: &mut R, writer: &mut W, moved: &mut usize) -> PumpEnd
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut chunk = [0u8; BUFFER_SIZE];
	loop {
		let num = match reader.read(&mut chunk).await {
			Ok(0) => return PumpEnd::Eof,
			Ok(num) => num,
			Err(err) => return PumpEnd::Failed(err),
		};
		if let Err(err) = writer.write_all(&chunk[..num]).await {
			return PumpEnd::Failed(err);
		}
		*moved += num;
	}
}

/// Shuttles bytes between `client` and `upstream` until either direction
/// reaches end-of-stream or fails; the surviving direction is abandoned
/// rather than awaited, so the caller should close both sides afterwards.
///
/// Returns the byte totals moved client→upstream and upstream→client, plus
/// the terminal error. A clean close on either side yields `None`.
pub async fn copy_io<C, U>(client: &mut C, upstream: &mut U) -> (usize, usize, Option<std::io::Error>)
where
	C: AsyncRead + AsyncWrite + Unpin,
	U: AsyncRead + AsyncWrite + Unpin,
{
	let (mut client_rd, mut client_wr) = tokio::io::split(client);
	let (mut upstream_rd, mut upstream_wr) = tokio::io::split(upstream);

	let mut up_num = 0;
	let mut down_num = 0;

	let end = tokio::select! {
		end = pump(&mut client_rd, &mut upstream_wr, &mut up_num) => end,
		end = pump(&mut upstream_rd, &mut client_wr, &mut down_num) => end,
	};

	let last_err = match end {
		PumpEnd::Eof => None,
		PumpEnd::Failed(err) => Some(err),
	};
	(up_num, down_num, last_err)
}
