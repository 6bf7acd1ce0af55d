pub mod forward;

pub mod benches {
	use bytes::Bytes;
	use criterion::{Criterion, black_box};

	/// Measures the inbox hot path of a synthetic connection: one bounded
	/// channel send plus receive per datagram.
	pub fn bench_inbox_channel(c: &mut Criterion) {
		let rt = tokio::runtime::Builder::new_current_thread()
			.build()
			.expect("build bench runtime");

		let mut group = c.benchmark_group("Inbox");

		group.bench_function("enqueue + drain one datagram", |b| {
			let (tx, mut rx) = tokio::sync::mpsc::channel::<Bytes>(16);
			b.iter(|| {
				rt.block_on(async {
					tx.send(Bytes::from_static(b"ping")).await.unwrap();
					black_box(rx.recv().await);
				})
			})
		});

		group.bench_function("enqueue + drain a full inbox", |b| {
			let (tx, mut rx) = tokio::sync::mpsc::channel::<Bytes>(16);
			b.iter(|| {
				rt.block_on(async {
					for _ in 0..16 {
						tx.send(Bytes::from_static(b"ping")).await.unwrap();
					}
					for _ in 0..16 {
						black_box(rx.recv().await);
					}
				})
			})
		});

		group.finish();
	}
}
