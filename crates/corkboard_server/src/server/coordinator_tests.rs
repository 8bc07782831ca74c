#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use corkboard_domain::{AuthorProfile, ContentPolicy, MessageRef, PhotoRef, UserId};
use corkboard_gateway::{ChatTarget, DeliveryError, MessengerGateway};
use tokio::sync::Mutex;

use crate::server::access::AccessControl;
use crate::server::coordinator::{Destinations, ModerationCoordinator};
use crate::server::lifecycle::{ModerationError, SubmissionService};
use crate::server::store::{MemoryStore, RecordStore};

const ADMIN: UserId = UserId(1);
const SECOND_ADMIN: UserId = UserId(2);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
	Text { to: ChatTarget, text: String },
	Photo { to: ChatTarget, caption: Option<String> },
	Album { to: ChatTarget, photos: usize, caption: Option<String> },
}

/// Gateway double that records deliveries and fails on demand.
struct RecordingGateway {
	sent: Mutex<Vec<Sent>>,
	fail_text: AtomicBool,
	fail_posts_to: std::sync::Mutex<HashSet<ChatTarget>>,
	next_ref: AtomicI64,
}

impl RecordingGateway {
	fn new() -> Self {
		Self {
			sent: Mutex::new(Vec::new()),
			fail_text: AtomicBool::new(false),
			fail_posts_to: std::sync::Mutex::new(HashSet::new()),
			next_ref: AtomicI64::new(1),
		}
	}

	fn fail_texts(&self) {
		self.fail_text.store(true, Ordering::Relaxed);
	}

	fn fail_posts_to(&self, target: ChatTarget) {
		self.fail_posts_to.lock().unwrap().insert(target);
	}

	async fn sent(&self) -> Vec<Sent> {
		self.sent.lock().await.clone()
	}

	fn next(&self) -> MessageRef {
		MessageRef(self.next_ref.fetch_add(1, Ordering::Relaxed))
	}

	fn post_should_fail(&self, to: &ChatTarget) -> bool {
		self.fail_posts_to.lock().unwrap().contains(to)
	}
}

#[async_trait]
impl MessengerGateway for RecordingGateway {
	async fn send_text(&self, to: &ChatTarget, text: &str) -> Result<MessageRef, DeliveryError> {
		if self.fail_text.load(Ordering::Relaxed) {
			return Err(DeliveryError::RecipientUnavailable(to.to_string()));
		}
		self.sent.lock().await.push(Sent::Text {
			to: to.clone(),
			text: text.to_string(),
		});
		Ok(self.next())
	}

	async fn send_photo(
		&self,
		to: &ChatTarget,
		_photo: &PhotoRef,
		caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError> {
		if self.post_should_fail(to) {
			return Err(DeliveryError::Transport(format!("injected failure for {to}")));
		}
		self.sent.lock().await.push(Sent::Photo {
			to: to.clone(),
			caption: caption.map(str::to_string),
		});
		Ok(self.next())
	}

	async fn send_album(
		&self,
		to: &ChatTarget,
		photos: &[PhotoRef],
		lead_caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError> {
		if self.post_should_fail(to) {
			return Err(DeliveryError::Transport(format!("injected failure for {to}")));
		}
		self.sent.lock().await.push(Sent::Album {
			to: to.clone(),
			photos: photos.len(),
			caption: lead_caption.map(str::to_string),
		});
		Ok(self.next())
	}
}

struct Fixture {
	store: Arc<MemoryStore>,
	gateway: Arc<RecordingGateway>,
	lifecycle: Arc<SubmissionService>,
	coordinator: ModerationCoordinator,
}

fn channel() -> ChatTarget {
	ChatTarget::Handle("classifieds".to_string())
}

fn moderation_chat() -> ChatTarget {
	ChatTarget::Chat(-500)
}

fn fixture() -> Fixture {
	let store = Arc::new(MemoryStore::new());
	let shared_store: Arc<dyn RecordStore> = store.clone();
	let gateway = Arc::new(RecordingGateway::new());
	let shared_gateway: Arc<dyn MessengerGateway> = gateway.clone();
	let lifecycle = Arc::new(SubmissionService::new(
		shared_store,
		AccessControl::new([ADMIN, SECOND_ADMIN]),
		ContentPolicy::default(),
	));
	let coordinator = ModerationCoordinator::new(
		shared_gateway,
		Arc::clone(&lifecycle),
		Destinations {
			channel: channel(),
			moderation_chat: Some(moderation_chat()),
			admins: vec![ADMIN, SECOND_ADMIN],
		},
	);
	Fixture {
		store,
		gateway,
		lifecycle,
		coordinator,
	}
}

fn seller(id: i64) -> AuthorProfile {
	AuthorProfile::new(UserId(id), format!("Seller {id}")).with_handle(format!("seller{id}"))
}

fn photos(n: usize) -> Vec<PhotoRef> {
	(0..n).map(|i| PhotoRef::new(format!("photo-{i}")).unwrap()).collect()
}

#[tokio::test]
async fn submission_confirms_author_and_fans_out_to_moderation() {
	let f = fixture();
	let author = seller(7);

	f.coordinator
		.handle_submission(author.clone(), photos(1), Some("A fine second-hand bicycle".into()))
		.await;

	assert_eq!(f.store.pending_count().await.unwrap(), 1);

	let sent = f.gateway.sent().await;

	// Author confirmation.
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(author.id) && text.contains("moderation queue")
	)));

	// One review card per admin, plus the moderation chat.
	for target in [ChatTarget::user(ADMIN), ChatTarget::user(SECOND_ADMIN), moderation_chat()] {
		assert!(
			sent.iter().any(|s| matches!(
				s,
				Sent::Photo { to, caption: Some(c) } if *to == target && c.contains("awaiting review")
			)),
			"missing review card for {target}"
		);
	}
}

#[tokio::test]
async fn multi_photo_submissions_announce_as_albums() {
	let f = fixture();

	f.coordinator
		.handle_submission(seller(8), photos(3), Some("Three photos of one wardrobe".into()))
		.await;

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Album { to, photos: 3, .. } if *to == ChatTarget::user(ADMIN)
	)));
}

#[tokio::test]
async fn denied_submission_notifies_the_author_and_persists_nothing() {
	let f = fixture();
	let author = seller(9);

	f.lifecycle.ban(ADMIN, author.id, None, "spam").await.unwrap();
	f.gateway.sent.lock().await.clear();

	f.coordinator
		.handle_submission(author.clone(), photos(1), Some("Will be denied by the ban gate".into()))
		.await;

	assert_eq!(f.store.pending_count().await.unwrap(), 0);

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(author.id) && text.contains("banned") && text.contains("spam")
	)));
	// No review cards for a denied submission.
	assert!(!sent.iter().any(|s| matches!(s, Sent::Photo { .. } | Sent::Album { .. })));
}

#[tokio::test]
async fn oversized_album_is_denied_with_validation_feedback() {
	let f = fixture();
	let author = seller(10);

	f.coordinator
		.handle_submission(author.clone(), photos(6), Some("Six photos is too many here".into()))
		.await;

	assert_eq!(f.store.pending_count().await.unwrap(), 0);

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(author.id) && text.contains("at most 5")
	)));
}

#[tokio::test]
async fn approve_publishes_commits_and_notifies_the_author() {
	let f = fixture();
	let author = seller(11);
	let ad = f
		.lifecycle
		.submit(&author, photos(1), "A lamp in working condition")
		.await
		.unwrap();

	let approved = f.coordinator.approve(ADMIN, ad.id).await.unwrap();
	let published = approved.state.published().expect("approved ads carry their reference");

	let stored = f.store.submission(ad.id).await.unwrap().unwrap();
	assert_eq!(stored.state.published(), Some(published));

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Photo { to, caption: Some(c) } if *to == channel() && c.contains("A lamp in working condition")
	)));
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(author.id) && text.contains("approved and published")
	)));
}

#[tokio::test]
async fn publish_failure_aborts_the_approval() {
	let f = fixture();
	let author = seller(12);
	let ad = f
		.lifecycle
		.submit(&author, photos(2), "Two photos of a coffee table")
		.await
		.unwrap();

	f.gateway.fail_posts_to(channel());
	f.gateway.sent.lock().await.clear();

	let err = f.coordinator.approve(ADMIN, ad.id).await.unwrap_err();
	assert!(matches!(err, ModerationError::Publish(_)));

	// The approval was never recorded and the author was not notified.
	let stored = f.store.submission(ad.id).await.unwrap().unwrap();
	assert!(stored.is_pending());
	assert!(f.gateway.sent().await.is_empty());

	// A later retry with a healthy channel succeeds.
	f.gateway.fail_posts_to.lock().unwrap().clear();
	f.coordinator.approve(ADMIN, ad.id).await.unwrap();
}

#[tokio::test]
async fn notification_failure_after_commit_keeps_the_approval() {
	let f = fixture();
	let author = seller(13);
	let ad = f
		.lifecycle
		.submit(&author, photos(1), "Notification may fail, state must not")
		.await
		.unwrap();

	f.gateway.fail_texts();

	let approved = f.coordinator.approve(ADMIN, ad.id).await.unwrap();
	assert!(approved.state.published().is_some());

	let stored = f.store.submission(ad.id).await.unwrap().unwrap();
	assert!(!stored.is_pending());
}

#[tokio::test]
async fn second_approve_reports_already_moderated() {
	let f = fixture();
	let ad = f
		.lifecycle
		.submit(&seller(14), photos(1), "Approved exactly once, then frozen")
		.await
		.unwrap();

	f.coordinator.approve(ADMIN, ad.id).await.unwrap();
	let snapshot = f.store.submission(ad.id).await.unwrap().unwrap();

	assert!(matches!(
		f.coordinator.approve(SECOND_ADMIN, ad.id).await,
		Err(ModerationError::AlreadyModerated)
	));
	assert!(matches!(
		f.coordinator.reject(ADMIN, ad.id, "far too late now").await,
		Err(ModerationError::AlreadyModerated)
	));

	assert_eq!(f.store.submission(ad.id).await.unwrap().unwrap(), snapshot);
}

#[tokio::test]
async fn reject_notifies_the_author_with_the_reason() {
	let f = fixture();
	let author = seller(15);
	let ad = f
		.lifecycle
		.submit(&author, photos(1), "This one gets turned down")
		.await
		.unwrap();

	let rejected = f.coordinator.reject(ADMIN, ad.id, "pricing is missing").await.unwrap();
	assert_eq!(rejected.state.reject_reason(), Some("pricing is missing"));

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(author.id) && text.contains("pricing is missing")
	)));

	// No channel post for rejections.
	assert!(!sent.iter().any(|s| matches!(s, Sent::Photo { to, .. } if *to == channel())));
}

#[tokio::test]
async fn ban_and_unban_notify_the_user_best_effort() {
	let f = fixture();

	let record = f.coordinator.ban(ADMIN, UserId(42), "spamming the queue").await.unwrap();
	assert_eq!(record.reason, "spamming the queue");

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(UserId(42)) && text.contains("banned")
	)));

	assert!(f.coordinator.unban(ADMIN, UserId(42)).await.unwrap());
	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Text { to, text } if *to == ChatTarget::user(UserId(42)) && text.contains("lifted")
	)));

	// Unbanning a non-banned user notifies nobody.
	f.gateway.sent.lock().await.clear();
	assert!(!f.coordinator.unban(ADMIN, UserId(43)).await.unwrap());
	assert!(f.gateway.sent().await.is_empty());
}

#[tokio::test]
async fn one_failing_admin_does_not_block_the_fan_out() {
	let f = fixture();

	f.gateway.fail_posts_to(ChatTarget::user(ADMIN));

	f.coordinator
		.handle_submission(seller(16), photos(1), Some("Fan-out survives one dead admin".into()))
		.await;

	assert_eq!(f.store.pending_count().await.unwrap(), 1);

	let sent = f.gateway.sent().await;
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Photo { to, .. } if *to == ChatTarget::user(SECOND_ADMIN)
	)));
	assert!(sent.iter().any(|s| matches!(
		s,
		Sent::Photo { to, .. } if *to == moderation_chat()
	)));
}

#[tokio::test]
async fn show_queue_sends_cards_capped_at_the_page_size() {
	let f = fixture();

	for i in 0..7 {
		f.lifecycle
			.submit(&seller(100 + i), photos(1), &format!("pending submission number {i}"))
			.await
			.unwrap();
	}
	f.gateway.sent.lock().await.clear();

	let (sent_cards, total) = f.coordinator.show_queue(ADMIN, 5).await.unwrap();
	assert_eq!((sent_cards, total), (5, 7));

	let sent = f.gateway.sent().await;
	let cards = sent
		.iter()
		.filter(|s| matches!(s, Sent::Photo { to, .. } if *to == ChatTarget::user(ADMIN)))
		.count();
	assert_eq!(cards, 5);
}
