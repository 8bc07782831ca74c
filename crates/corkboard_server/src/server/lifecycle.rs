#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::Utc;
use corkboard_domain::{AdId, Advertisement, AuthorProfile, BanRecord, ContentPolicy, MessageRef, PhotoRef, UserId, ValidationError};
use corkboard_gateway::DeliveryError;
use thiserror::Error;
use tracing::info;

use crate::server::access::AccessControl;
use crate::server::store::{RecordStore, StoreError};

/// Admission failures for `submit`. Reported to the submitting user; no
/// submission is created.
#[derive(Debug, Error)]
pub enum SubmitError {
	#[error("submissions are blocked for this user: {reason}")]
	UserBanned { reason: String },
	#[error("daily submission limit of {limit} reached")]
	QuotaExceeded { limit: u32 },
	#[error(transparent)]
	Invalid(#[from] ValidationError),
	#[error("storage failure: {0}")]
	Store(#[source] StoreError),
}

impl From<StoreError> for SubmitError {
	fn from(e: StoreError) -> Self {
		SubmitError::Store(e)
	}
}

/// Failures of moderation actions, reported to the acting admin.
#[derive(Debug, Error)]
pub enum ModerationError {
	#[error("you are not an administrator")]
	NotAuthorized,
	#[error("submission not found")]
	NotFound,
	#[error("submission already moderated")]
	AlreadyModerated,
	#[error("only the author may delete a submission")]
	NotOwner,
	#[error("reason too short: minimum {min} characters")]
	ReasonTooShort { min: usize },
	/// The one delivery failure that propagates: an approval is never
	/// recorded unless its publish succeeded.
	#[error("publishing failed: {0}")]
	Publish(DeliveryError),
	#[error("storage failure: {0}")]
	Backend(#[source] anyhow::Error),
}

impl From<StoreError> for ModerationError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound => ModerationError::NotFound,
			StoreError::AlreadyModerated => ModerationError::AlreadyModerated,
			StoreError::NotOwner => ModerationError::NotOwner,
			StoreError::Backend(e) => ModerationError::Backend(e),
		}
	}
}

/// The pending → approved/rejected state machine and its admission control.
/// The single source of truth for what a valid transition is; side effects
/// (publish, notify) belong to the coordinator.
pub struct SubmissionService {
	store: Arc<dyn RecordStore>,
	access: AccessControl,
	policy: ContentPolicy,
}

impl SubmissionService {
	pub fn new(store: Arc<dyn RecordStore>, access: AccessControl, policy: ContentPolicy) -> Self {
		Self { store, access, policy }
	}

	pub fn policy(&self) -> &ContentPolicy {
		&self.policy
	}

	/// Admission control and creation: ban gate, quota gate, content
	/// validation, then persist as pending.
	///
	/// The quota check is advisory-consistent: two racing submits under the
	/// same boundary may both pass. Soft anti-spam limit, not an allocation.
	pub async fn submit(
		&self,
		author: &AuthorProfile,
		photos: Vec<PhotoRef>,
		description: &str,
	) -> Result<Advertisement, SubmitError> {
		if let Some(ban) = self.store.ban(author.id).await? {
			metrics::counter!("corkboard_server_submissions_banned_total").increment(1);
			return Err(SubmitError::UserBanned { reason: ban.reason });
		}

		let today = self.store.submissions_today(author.id).await?;
		if today >= u64::from(self.policy.max_ads_per_day) {
			metrics::counter!("corkboard_server_submissions_over_quota_total").increment(1);
			return Err(SubmitError::QuotaExceeded {
				limit: self.policy.max_ads_per_day,
			});
		}

		self.policy.validate(&photos, description)?;

		let ad = self.store.create_submission(author, description.trim(), &photos).await?;
		metrics::counter!("corkboard_server_submissions_total").increment(1);
		info!(ad = %ad.id, user = %author.id, photos = ad.photos.len(), "submission accepted into the pending queue");
		Ok(ad)
	}

	/// How many submissions the author created today (quota window).
	pub async fn submitted_today(&self, user: UserId) -> Result<u64, StoreError> {
		self.store.submissions_today(user).await
	}

	/// Guard an approve: caller is an admin, the submission exists and is
	/// still pending. Publishing happens between this and `commit_approve`.
	pub async fn begin_review(&self, admin: UserId, id: AdId) -> Result<Advertisement, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}

		let ad = self.store.submission(id).await?.ok_or(ModerationError::NotFound)?;
		if !ad.is_pending() {
			return Err(ModerationError::AlreadyModerated);
		}
		Ok(ad)
	}

	/// Commit Pending → Approved. The store serializes racing transitions;
	/// the loser of a race observes `AlreadyModerated`.
	pub async fn commit_approve(&self, id: AdId, published: MessageRef) -> Result<Advertisement, ModerationError> {
		let ad = self.store.approve_submission(id, published).await?;
		info!(ad = %ad.id, published = %published, "submission approved");
		Ok(ad)
	}

	/// Pending → Rejected with a reason of at least the configured length.
	pub async fn reject(&self, admin: UserId, id: AdId, reason: &str) -> Result<Advertisement, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}

		let reason = reason.trim();
		if reason.chars().count() < self.policy.min_reject_reason_chars {
			return Err(ModerationError::ReasonTooShort {
				min: self.policy.min_reject_reason_chars,
			});
		}

		let ad = self.store.reject_submission(id, reason).await?;
		metrics::counter!("corkboard_server_rejected_total").increment(1);
		info!(ad = %ad.id, admin = %admin, "submission rejected");
		Ok(ad)
	}

	/// Create or replace a ban. The handle is best-effort and never part of
	/// enforcement.
	pub async fn ban(
		&self,
		admin: UserId,
		user: UserId,
		handle: Option<String>,
		reason: &str,
	) -> Result<BanRecord, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}

		let reason = reason.trim();
		if reason.chars().count() < self.policy.min_ban_reason_chars {
			return Err(ModerationError::ReasonTooShort {
				min: self.policy.min_ban_reason_chars,
			});
		}

		let record = BanRecord {
			user,
			handle,
			reason: reason.to_string(),
			banned_at: Utc::now(),
			banned_by: admin,
		};
		self.store.upsert_ban(&record).await?;
		metrics::counter!("corkboard_server_bans_total").increment(1);
		info!(user = %user, admin = %admin, "user banned from submitting");
		Ok(record)
	}

	/// Remove a ban; `false` when the user was not banned.
	pub async fn unban(&self, admin: UserId, user: UserId) -> Result<bool, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}

		let removed = self.store.remove_ban(user).await?;
		if removed {
			info!(user = %user, admin = %admin, "user unbanned");
		}
		Ok(removed)
	}

	pub async fn bans(&self, admin: UserId) -> Result<Vec<BanRecord>, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}
		Ok(self.store.bans().await?)
	}

	/// The FIFO moderation queue.
	pub async fn pending_queue(&self, admin: UserId) -> Result<Vec<Advertisement>, ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}
		Ok(self.store.pending_submissions().await?)
	}

	/// Pending and ban counts for the admin overview.
	pub async fn stats(&self, admin: UserId) -> Result<(u64, u64), ModerationError> {
		if !self.access.is_admin(admin) {
			return Err(ModerationError::NotAuthorized);
		}
		let pending = self.store.pending_count().await?;
		let banned = self.store.bans().await?.len() as u64;
		Ok((pending, banned))
	}

	/// Owner-gated delete.
	pub async fn retract(&self, requester: UserId, id: AdId) -> Result<(), ModerationError> {
		self.store.delete_submission(id, requester).await?;
		info!(ad = %id, user = %requester, "submission deleted by its author");
		Ok(())
	}
}
