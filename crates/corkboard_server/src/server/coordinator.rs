#![forbid(unsafe_code)]

use std::sync::Arc;

use corkboard_domain::{AdId, Advertisement, AuthorProfile, BanRecord, MessageRef, PhotoRef, UserId};
use corkboard_gateway::{ChatTarget, DeliveryError, MessengerGateway};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::server::format;
use crate::server::lifecycle::{ModerationError, SubmissionService, SubmitError};

/// Where moderation traffic goes.
#[derive(Debug, Clone)]
pub struct Destinations {
	/// Public channel approved submissions are published to.
	pub channel: ChatTarget,
	/// Optional shared moderation chat receiving every new submission.
	pub moderation_chat: Option<ChatTarget>,
	/// Administrators notified of every new submission.
	pub admins: Vec<UserId>,
}

/// Orchestrates the side effects around lifecycle transitions: publishing
/// on approve, notifications on reject/ban/unban, and the moderation
/// fan-out for new submissions.
///
/// Every delivery here is best-effort — logged on failure, never propagated
/// — except the publish during an approve, which gates the transition.
pub struct ModerationCoordinator {
	gateway: Arc<dyn MessengerGateway>,
	lifecycle: Arc<SubmissionService>,
	destinations: Destinations,
}

impl ModerationCoordinator {
	pub fn new(gateway: Arc<dyn MessengerGateway>, lifecycle: Arc<SubmissionService>, destinations: Destinations) -> Self {
		Self {
			gateway,
			lifecycle,
			destinations,
		}
	}

	/// Run a submission through admission control; on success confirm to
	/// the author and fan the review card out to moderation destinations,
	/// on failure report the denial to the author.
	pub async fn handle_submission(&self, author: AuthorProfile, photos: Vec<PhotoRef>, caption: Option<String>) {
		let description = caption.unwrap_or_default();

		match self.lifecycle.submit(&author, photos, &description).await {
			Ok(ad) => {
				let submitted_today = match self.lifecycle.submitted_today(author.id).await {
					Ok(n) => n,
					Err(e) => {
						warn!(user = %author.id, error = %e, "could not count today's submissions for the card");
						1
					}
				};
				let limit = self.lifecycle.policy().max_ads_per_day;

				self.notify_user(author.id, &format::submission_received(ad.id, submitted_today, limit))
					.await;
				self.announce_submission(&ad, submitted_today).await;
			}
			Err(e) => {
				match &e {
					SubmitError::Store(store_err) => {
						warn!(user = %author.id, error = %store_err, "submission failed in storage")
					}
					other => debug!(user = %author.id, reason = %other, "submission denied"),
				}
				self.notify_user(author.id, &format::submission_denied(&e)).await;
			}
		}
	}

	/// Fan the review card out to every admin and the moderation chat.
	/// Per-recipient failures are logged and do not affect the persisted
	/// submission or the other recipients.
	async fn announce_submission(&self, ad: &Advertisement, submitted_today: u64) {
		let card = format::moderation_card(ad, submitted_today, self.lifecycle.policy().max_ads_per_day);
		let card = card.as_str();

		let targets: Vec<ChatTarget> = self
			.destinations
			.admins
			.iter()
			.copied()
			.map(ChatTarget::user)
			.chain(self.destinations.moderation_chat.clone())
			.collect();

		let deliveries = join_all(targets.iter().map(|target| async move {
			self.send_card(target, ad, card).await
		}))
		.await;

		for (target, result) in targets.iter().zip(deliveries) {
			if let Err(e) = result {
				metrics::counter!("corkboard_server_announce_failures_total").increment(1);
				warn!(ad = %ad.id, to = %target, error = %e, "failed to deliver review card");
			}
		}
	}

	/// Publish-then-commit. The publish gates the transition: no approval
	/// is recorded unless the channel post went out, and a race lost after
	/// publishing leaves an orphaned post behind (logged) while the state
	/// transition stays exactly-once.
	pub async fn approve(&self, admin: UserId, id: AdId) -> Result<Advertisement, ModerationError> {
		let ad = self.lifecycle.begin_review(admin, id).await?;

		let post = format::channel_post(&ad);
		let published = match self.send_post(&self.destinations.channel, &ad.photos, &post).await {
			Ok(published) => published,
			Err(e) => {
				metrics::counter!("corkboard_server_publish_failures_total").increment(1);
				warn!(ad = %id, channel = %self.destinations.channel, error = %e, "publish failed; approval not recorded");
				return Err(ModerationError::Publish(e));
			}
		};

		let approved = match self.lifecycle.commit_approve(id, published).await {
			Ok(ad) => ad,
			Err(e) => {
				if matches!(e, ModerationError::AlreadyModerated) {
					warn!(
						ad = %id,
						published = %published,
						"approve race lost after publishing; the channel post is orphaned"
					);
				}
				return Err(e);
			}
		};

		metrics::counter!("corkboard_server_approved_total").increment(1);
		self.notify_user(
			approved.author.id,
			&format::approved_user_text(approved.id, &self.destinations.channel),
		)
		.await;

		Ok(approved)
	}

	/// Reject and notify the author with the reason.
	pub async fn reject(&self, admin: UserId, id: AdId, reason: &str) -> Result<Advertisement, ModerationError> {
		let rejected = self.lifecycle.reject(admin, id, reason).await?;

		let reason = rejected.state.reject_reason().unwrap_or(reason).to_string();
		self.notify_user(rejected.author.id, &format::rejected_user_text(rejected.id, &reason))
			.await;

		Ok(rejected)
	}

	/// Ban and notify the affected user. The notification regularly fails
	/// (the user may never have opened a dialog) and that is tolerated.
	pub async fn ban(&self, admin: UserId, user: UserId, reason: &str) -> Result<BanRecord, ModerationError> {
		let record = self.lifecycle.ban(admin, user, None, reason).await?;
		self.notify_user(user, &format::banned_user_text(&record.reason)).await;
		Ok(record)
	}

	/// Lift a ban and notify the user when one was actually removed.
	pub async fn unban(&self, admin: UserId, user: UserId) -> Result<bool, ModerationError> {
		let removed = self.lifecycle.unban(admin, user).await?;
		if removed {
			self.notify_user(user, &format::unbanned_user_text()).await;
		}
		Ok(removed)
	}

	/// Send the first pending submissions to the requesting admin as review
	/// cards. Returns how many cards went out.
	pub async fn show_queue(&self, admin: UserId, limit: usize) -> Result<(usize, u64), ModerationError> {
		let queue = self.lifecycle.pending_queue(admin).await?;
		let total = queue.len() as u64;
		let target = ChatTarget::user(admin);

		let mut sent = 0usize;
		for ad in queue.iter().take(limit) {
			let submitted_today = self.lifecycle.submitted_today(ad.author.id).await.unwrap_or(0);
			let card = format::moderation_card(ad, submitted_today, self.lifecycle.policy().max_ads_per_day);
			match self.send_card(&target, ad, &card).await {
				Ok(()) => sent += 1,
				Err(e) => {
					warn!(ad = %ad.id, admin = %admin, error = %e, "failed to deliver queue card");
				}
			}
		}

		Ok((sent, total))
	}

	/// One photo, or an album with the caption on the lead item.
	async fn send_post(&self, to: &ChatTarget, photos: &[PhotoRef], caption: &str) -> Result<MessageRef, DeliveryError> {
		match photos {
			[single] => self.gateway.send_photo(to, single, Some(caption)).await,
			many => self.gateway.send_album(to, many, Some(caption)).await,
		}
	}

	async fn send_card(&self, to: &ChatTarget, ad: &Advertisement, card: &str) -> Result<(), DeliveryError> {
		self.send_post(to, &ad.photos, card).await.map(|_| ())
	}

	/// Best-effort direct message; failures are logged, never propagated.
	pub async fn notify_user(&self, user: UserId, text: &str) {
		let target = ChatTarget::user(user);
		if let Err(e) = self.gateway.send_text(&target, text).await {
			metrics::counter!("corkboard_server_notify_failures_total").increment(1);
			debug!(user = %user, error = %e, "user notification failed (tolerated)");
		}
	}
}
