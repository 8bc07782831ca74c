#![forbid(unsafe_code)]

use chrono::Utc;
use corkboard_domain::{AdId, AuthorProfile, MessageRef, PhotoRef, UserId};
use proptest::prelude::*;

use crate::server::store::{MemoryStore, RecordStore, StoreError};

fn author(id: i64) -> AuthorProfile {
	AuthorProfile::new(UserId(id), format!("User {id}")).with_handle(format!("user{id}"))
}

fn photos(n: usize) -> Vec<PhotoRef> {
	(0..n).map(|i| PhotoRef::new(format!("photo-{i}")).unwrap()).collect()
}

#[tokio::test]
async fn create_assigns_increasing_ids_and_pending_state() {
	let store = MemoryStore::new();

	let a = store
		.create_submission(&author(1), "first listing description", &photos(1))
		.await
		.unwrap();
	let b = store
		.create_submission(&author(1), "second listing description", &photos(2))
		.await
		.unwrap();

	assert!(b.id > a.id);
	assert!(a.is_pending());
	assert!(a.moderated_at.is_none());
	assert_eq!(b.photos.len(), 2);
}

#[tokio::test]
async fn pending_queue_is_fifo_and_author_listing_is_newest_first() {
	let store = MemoryStore::new();

	let first = store.create_submission(&author(7), "oldest description", &photos(1)).await.unwrap();
	let second = store.create_submission(&author(7), "middle description", &photos(1)).await.unwrap();
	let third = store.create_submission(&author(7), "newest description", &photos(1)).await.unwrap();

	let queue = store.pending_submissions().await.unwrap();
	assert_eq!(
		queue.iter().map(|ad| ad.id).collect::<Vec<_>>(),
		vec![first.id, second.id, third.id]
	);

	let own = store.submissions_by_author(UserId(7)).await.unwrap();
	assert_eq!(
		own.iter().map(|ad| ad.id).collect::<Vec<_>>(),
		vec![third.id, second.id, first.id]
	);

	assert!(store.submissions_by_author(UserId(8)).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_transition_fails_and_leaves_state_untouched() {
	let store = MemoryStore::new();
	let ad = store
		.create_submission(&author(3), "a perfectly fine listing", &photos(1))
		.await
		.unwrap();

	let approved = store.approve_submission(ad.id, MessageRef(77)).await.unwrap();
	assert_eq!(approved.state.published(), Some(MessageRef(77)));
	assert!(approved.moderated_at.is_some());

	let snapshot = store.submission(ad.id).await.unwrap().unwrap();

	assert!(matches!(
		store.approve_submission(ad.id, MessageRef(78)).await,
		Err(StoreError::AlreadyModerated)
	));
	assert!(matches!(
		store.reject_submission(ad.id, "too late to reject").await,
		Err(StoreError::AlreadyModerated)
	));

	// Stored state is identical to before the repeat attempts.
	assert_eq!(store.submission(ad.id).await.unwrap().unwrap(), snapshot);
}

#[tokio::test]
async fn reject_carries_reason_and_sets_moderated_at() {
	let store = MemoryStore::new();
	let ad = store
		.create_submission(&author(4), "an average listing text", &photos(1))
		.await
		.unwrap();

	let rejected = store.reject_submission(ad.id, "photos are too blurry").await.unwrap();
	assert_eq!(rejected.state.reject_reason(), Some("photos are too blurry"));
	assert_eq!(rejected.state.published(), None);
	assert!(rejected.moderated_at.is_some());

	assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn transitions_on_missing_ids_yield_not_found() {
	let store = MemoryStore::new();
	assert!(matches!(
		store.approve_submission(AdId(999), MessageRef(1)).await,
		Err(StoreError::NotFound)
	));
	assert!(matches!(
		store.reject_submission(AdId(999), "whatever reason").await,
		Err(StoreError::NotFound)
	));
}

#[tokio::test]
async fn delete_is_owner_gated() {
	let store = MemoryStore::new();
	let ad = store
		.create_submission(&author(10), "owner gated listing", &photos(1))
		.await
		.unwrap();

	assert!(matches!(
		store.delete_submission(ad.id, UserId(11)).await,
		Err(StoreError::NotOwner)
	));
	assert!(matches!(
		store.delete_submission(AdId(404), UserId(10)).await,
		Err(StoreError::NotFound)
	));

	store.delete_submission(ad.id, UserId(10)).await.unwrap();
	assert!(store.submission(ad.id).await.unwrap().is_none());
}

#[tokio::test]
async fn ban_records_replace_and_delete() {
	let store = MemoryStore::new();
	let user = UserId(42);

	assert!(!store.is_banned(user).await.unwrap());

	let first = corkboard_domain::BanRecord {
		user,
		handle: Some("spammer".to_string()),
		reason: "spam".to_string(),
		banned_at: Utc::now(),
		banned_by: UserId(1),
	};
	store.upsert_ban(&first).await.unwrap();
	assert!(store.is_banned(user).await.unwrap());

	// Last write wins: at most one active record per user.
	let second = corkboard_domain::BanRecord {
		reason: "repeat spam".to_string(),
		banned_at: Utc::now() + chrono::Duration::seconds(5),
		..first.clone()
	};
	store.upsert_ban(&second).await.unwrap();

	let stored = store.ban(user).await.unwrap().unwrap();
	assert_eq!(stored.reason, "repeat spam");
	assert_eq!(store.bans().await.unwrap().len(), 1);

	assert!(store.remove_ban(user).await.unwrap());
	assert!(!store.remove_ban(user).await.unwrap());
	assert!(!store.is_banned(user).await.unwrap());
	assert!(store.ban(user).await.unwrap().is_none());
}

#[tokio::test]
async fn bans_are_listed_most_recent_first() {
	let store = MemoryStore::new();
	let base = Utc::now();

	for (user, offset) in [(1i64, 0i64), (2, 60), (3, 30)] {
		store
			.upsert_ban(&corkboard_domain::BanRecord {
				user: UserId(user),
				handle: None,
				reason: format!("reason {user}"),
				banned_at: base + chrono::Duration::seconds(offset),
				banned_by: UserId(99),
			})
			.await
			.unwrap();
	}

	let bans = store.bans().await.unwrap();
	assert_eq!(
		bans.iter().map(|b| b.user).collect::<Vec<_>>(),
		vec![UserId(2), UserId(3), UserId(1)]
	);
}

#[tokio::test]
async fn quota_window_excludes_yesterday() {
	let store = MemoryStore::new();
	let seller = author(5);

	// A submission from a day ago never counts toward today.
	store
		.insert_backdated(&seller, "yesterday's listing text", &photos(1), Utc::now() - chrono::Duration::days(1))
		.await;
	assert_eq!(store.submissions_today(UserId(5)).await.unwrap(), 0);

	store
		.create_submission(&seller, "today's listing text", &photos(1))
		.await
		.unwrap();
	assert_eq!(store.submissions_today(UserId(5)).await.unwrap(), 1);

	// Other authors are unaffected.
	assert_eq!(store.submissions_today(UserId(6)).await.unwrap(), 0);
}

#[derive(Debug, Clone)]
enum Op {
	Create,
	Approve(usize),
	Reject(usize),
	Delete(usize, bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
	prop_oneof![
		Just(Op::Create),
		(0..8usize).prop_map(Op::Approve),
		(0..8usize).prop_map(Op::Reject),
		((0..8usize), any::<bool>()).prop_map(|(i, as_owner)| Op::Delete(i, as_owner)),
	]
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	/// Random transition sequences keep every stored record coherent:
	/// `moderated_at` is set exactly when the record left pending, the
	/// payload matches the status by construction, and repeating a
	/// transition on a moderated record never changes it.
	#[test]
	fn random_transition_sequences_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..24)) {
		let rt = tokio::runtime::Builder::new_current_thread()
			.enable_time()
			.build()
			.expect("build runtime");

		rt.block_on(async move {
			let store = MemoryStore::new();
			let seller = author(1);
			let mut ids: Vec<AdId> = Vec::new();

			for op in ops {
				match op {
					Op::Create => {
						let ad = store
							.create_submission(&seller, "property test listing", &photos(1))
							.await
							.unwrap();
						ids.push(ad.id);
					}
					Op::Approve(i) => {
						if let Some(id) = ids.get(i % ids.len().max(1)).copied() {
							let _ = store.approve_submission(id, MessageRef(1000 + id.0)).await;
						}
					}
					Op::Reject(i) => {
						if let Some(id) = ids.get(i % ids.len().max(1)).copied() {
							let _ = store.reject_submission(id, "rejected by property test").await;
						}
					}
					Op::Delete(i, as_owner) => {
						if let Some(id) = ids.get(i % ids.len().max(1)).copied() {
							let requester = if as_owner { seller.id } else { UserId(777) };
							let _ = store.delete_submission(id, requester).await;
						}
					}
				}
			}

			let mut pending_seen = 0u64;
			for id in &ids {
				let Some(ad) = store.submission(*id).await.unwrap() else {
					continue;
				};

				assert_eq!(ad.moderated_at.is_some(), !ad.is_pending());
				if ad.is_pending() {
					pending_seen += 1;
				} else {
					// Moderated records are frozen.
					let before = ad.clone();
					assert!(matches!(
						store.approve_submission(ad.id, MessageRef(1)).await,
						Err(StoreError::AlreadyModerated)
					));
					assert_eq!(store.submission(ad.id).await.unwrap().unwrap(), before);
				}
			}

			assert_eq!(store.pending_count().await.unwrap(), pending_seen);
		});
	}
}
