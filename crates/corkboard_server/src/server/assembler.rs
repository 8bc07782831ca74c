#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use corkboard_domain::{AuthorProfile, MediaGroupId, PhotoRef, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for `AlbumAssembler`.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
	/// Quiescence delay after the first fragment of a group; once it
	/// elapses the group is assumed complete.
	pub quiescence: Duration,

	/// How long a completed key keeps rejecting late fragments before its
	/// slot is collected.
	pub tombstone_ttl: Duration,
}

impl Default for AssemblerConfig {
	fn default() -> Self {
		Self {
			quiescence: Duration::from_millis(500),
			tombstone_ttl: Duration::from_secs(30),
		}
	}
}

/// A fully assembled multi-photo submission candidate, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAlbum {
	pub author: AuthorProfile,
	pub photos: Vec<PhotoRef>,
	pub caption: Option<String>,
}

type AlbumKey = (UserId, MediaGroupId);

enum AlbumSlot {
	Open(AlbumBuffer),
	/// Finalize already ran for this key; late fragments are dropped.
	Done,
}

struct AlbumBuffer {
	author: AuthorProfile,
	photos: Vec<PhotoRef>,
	caption: Option<String>,
}

/// Collapses a burst of photo fragments sharing a correlation id into one
/// submission candidate.
///
/// The buffer map never escapes this component; downstream only ever sees
/// fully assembled candidates on the output channel.
#[derive(Clone)]
pub struct AlbumAssembler {
	inner: Arc<Mutex<HashMap<AlbumKey, AlbumSlot>>>,
	cfg: AssemblerConfig,
	out: mpsc::Sender<AssembledAlbum>,
}

impl AlbumAssembler {
	pub fn new(cfg: AssemblerConfig) -> (Self, mpsc::Receiver<AssembledAlbum>) {
		let (tx, rx) = mpsc::channel(64);
		let assembler = Self {
			inner: Arc::new(Mutex::new(HashMap::new())),
			cfg,
			out: tx,
		};
		(assembler, rx)
	}

	/// Record one fragment of a photo group. The first fragment of a key
	/// schedules the single finalize for that key; the rest only append.
	pub fn push_fragment(
		&self,
		author: AuthorProfile,
		group: MediaGroupId,
		photo: PhotoRef,
		caption: Option<String>,
	) {
		let key = (author.id, group);
		let caption = caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());

		let schedule = {
			let mut slots = self.inner.lock();
			match slots.entry(key.clone()) {
				Entry::Occupied(mut entry) => match entry.get_mut() {
					AlbumSlot::Open(buffer) => {
						buffer.photos.push(photo);
						// First non-empty caption wins, wherever in the
						// burst it arrives.
						if buffer.caption.is_none() {
							buffer.caption = caption;
						}
						false
					}
					AlbumSlot::Done => {
						metrics::counter!("corkboard_server_album_late_fragments_total").increment(1);
						debug!(user = %key.0, group = %key.1, "dropping fragment for already-completed album");
						false
					}
				},
				Entry::Vacant(slot) => {
					slot.insert(AlbumSlot::Open(AlbumBuffer {
						author,
						photos: vec![photo],
						caption,
					}));
					true
				}
			}
		};

		if schedule {
			let assembler = self.clone();
			tokio::spawn(async move {
				tokio::time::sleep(assembler.cfg.quiescence).await;
				assembler.finalize(key).await;
			});
		}
	}

	/// Number of albums currently buffering (tombstones excluded).
	#[allow(dead_code)]
	pub fn open_albums(&self) -> usize {
		let slots = self.inner.lock();
		slots.values().filter(|slot| matches!(slot, AlbumSlot::Open(_))).count()
	}

	/// Runs at most once per key: the first fire takes the buffer and
	/// leaves a tombstone, so duplicate or late fires are no-ops.
	async fn finalize(&self, key: AlbumKey) {
		let buffer = {
			let mut slots = self.inner.lock();
			let Some(slot) = slots.get_mut(&key) else {
				return;
			};
			if matches!(slot, AlbumSlot::Done) {
				return;
			}
			let AlbumSlot::Open(buffer) = std::mem::replace(slot, AlbumSlot::Done) else {
				return;
			};
			buffer
		};

		let assembler = self.clone();
		let tombstone_key = key.clone();
		tokio::spawn(async move {
			tokio::time::sleep(assembler.cfg.tombstone_ttl).await;
			let mut slots = assembler.inner.lock();
			if matches!(slots.get(&tombstone_key), Some(AlbumSlot::Done)) {
				slots.remove(&tombstone_key);
			}
		});

		metrics::counter!("corkboard_server_albums_assembled_total").increment(1);
		debug!(
			user = %key.0,
			group = %key.1,
			photos = buffer.photos.len(),
			"album quiesced; emitting candidate"
		);

		let album = AssembledAlbum {
			author: buffer.author,
			photos: buffer.photos,
			caption: buffer.caption,
		};
		if self.out.send(album).await.is_err() {
			warn!(user = %key.0, group = %key.1, "album output channel closed; dropping assembled album");
		}
	}
}
