use std::{
	collections::HashMap,
	net::SocketAddr,
	sync::{Arc, Mutex, PoisonError},
};

use crate::session::UdpSessionHandle;

/// Peer-address → synthetic-connection map, one per UDP listener.
///
/// The listen loop uses it to demultiplex inbound datagrams; connections
/// remove themselves on close. A single mutex covers every operation and is
/// held only for the duration of that operation.
#[derive(Default)]
pub struct SessionRegistry {
	entries: Mutex<HashMap<SocketAddr, Arc<UdpSessionHandle>>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn load(&self, peer: SocketAddr) -> Option<Arc<UdpSessionHandle>> {
		self.lock().get(&peer).cloned()
	}

	/// Inserts `handle` under `peer`, replacing any existing entry.
	pub fn store(&self, peer: SocketAddr, handle: Arc<UdpSessionHandle>) {
		self.lock().insert(peer, handle);
	}

	/// Removing a key that is not present is a no-op.
	pub fn delete(&self, peer: SocketAddr) {
		self.lock().remove(&peer);
	}

	/// Empties the registry, invoking `on_remove` with every removed
	/// connection.
	///
	/// Entries are snapshotted under the lock and the callback runs outside
	/// it: closing a connection calls back into [`SessionRegistry::delete`]
	/// for the same key, which must land on an already-removed entry.
	pub fn clear(&self, mut on_remove: impl FnMut(Arc<UdpSessionHandle>)) {
		let removed: Vec<_> = self.lock().drain().map(|(_, handle)| handle).collect();
		for handle in removed {
			on_remove(handle);
		}
	}

	pub fn size(&self) -> usize {
		self.lock().len()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Arc<UdpSessionHandle>>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
